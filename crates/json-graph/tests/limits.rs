//! Depth, time and cycle guards, and the no-throw guarantee.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use json_graph::{
    as_json, parse_json, AsJsonOptions, Budget, ErrorHook, Function, Graph, GraphError, NodeId,
    ParseOptions, ToJson, Value,
};

fn collecting_hook() -> (ErrorHook, Arc<Mutex<Vec<GraphError>>>) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let hook: ErrorHook = Arc::new(move |e: &GraphError| sink.lock().unwrap().push(e.clone()));
    (hook, errors)
}

/// `{"k0":{"k1":{ ... {"k<n-1>":"leaf"} ... }}}`
fn nested(graph: &mut Graph, levels: usize) -> NodeId {
    let root = graph.object();
    let mut current = root;
    for i in 0..levels {
        let next = graph.object();
        graph.insert_entry(current, format!("k{i}"), next);
        current = next;
    }
    graph.insert_entry(current, "leaf", "done");
    root
}

#[test]
fn deep_nesting_hits_recursion_limit() {
    let mut g = Graph::new();
    let root = nested(&mut g, 40);
    let (hook, errors) = collecting_hook();
    let options = AsJsonOptions::default().with_on_error(hook);
    let text = as_json(&g, &Value::Node(root), None, None, &options);

    let parsed: serde_json::Value = serde_json::from_str(&text).expect("output stays valid JSON");
    let mut cursor = &parsed;
    for i in 0..32 {
        cursor = &cursor[format!("k{i}")];
    }
    let diagnostic = cursor["k32"].as_str().unwrap();
    assert!(diagnostic.starts_with("[recursion limit exceeded: depth 33 > 32"), "{diagnostic}");

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        GraphError::RecursionLimitExceeded { depth: 33, limit: 32, .. }
    ));
}

#[test]
fn nesting_within_limit_is_untouched() {
    let mut g = Graph::new();
    let root = nested(&mut g, 20);
    let (hook, errors) = collecting_hook();
    let options = AsJsonOptions::default().with_on_error(hook);
    let text = as_json(&g, &Value::Node(root), None, None, &options);
    assert!(text.contains("\"leaf\":\"done\""));
    assert!(errors.lock().unwrap().is_empty());
}

#[test]
fn identically_named_levels_are_not_a_cycle() {
    let mut g = Graph::new();
    let root = g.object();
    let mut current = root;
    for _ in 0..30 {
        let next = g.object();
        g.insert_entry(current, "n", next);
        current = next;
    }
    let (hook, errors) = collecting_hook();
    let options = AsJsonOptions::default().with_on_error(hook);
    let text = as_json(&g, &Value::Node(root), None, None, &options);
    assert!(errors.lock().unwrap().is_empty());

    let doc = parse_json(&text, None, &ParseOptions::default(), None);
    assert_eq!(doc.to_json_value().unwrap(), g.export(&Value::Node(root)).unwrap());
}

#[test]
fn timeout_aborts_with_diagnostic() {
    let mut g = Graph::new();
    let root = g.import(&serde_json::json!({"a": {"b": 1}}));
    let slow = |_key: &str, value: Value| {
        std::thread::sleep(Duration::from_millis(5));
        value
    };
    let (hook, errors) = collecting_hook();
    let options = AsJsonOptions::default()
        .with_on_error(hook)
        .with_budget(Budget {
            max_depth: 32,
            time_budget: Duration::from_millis(1),
        });
    let text = as_json(&g, &root, Some(&slow), None, &options);
    assert!(text.starts_with("\"[timeout exceeded"), "{text}");
    assert!(matches!(errors.lock().unwrap()[0], GraphError::TimeoutExceeded { .. }));
}

#[test]
fn parse_timeout_replaces_document_with_diagnostic() {
    let slow = |_key: &str, value: serde_json::Value| {
        std::thread::sleep(Duration::from_millis(5));
        value
    };
    let (hook, errors) = collecting_hook();
    let options = ParseOptions::default()
        .with_on_error(hook)
        .with_budget(Budget {
            max_depth: 32,
            time_budget: Duration::from_millis(1),
        });
    let doc = parse_json(
        r#"{"a":{"k":1},"b":"${(@path;@base:root):a}"}"#,
        Some(&slow),
        &options,
        None,
    );
    let root = doc.root.as_str().unwrap();
    assert!(root.starts_with("[timeout exceeded"), "{root}");
    assert!(matches!(errors.lock().unwrap()[0], GraphError::TimeoutExceeded { .. }));
}

#[test]
fn dangling_entry_is_omitted() {
    let mut g = Graph::new();
    let root = g.object();
    g.insert_entry(root, "ok", 1);
    g.insert_entry(root, "broken", Value::Node(NodeId(999)));
    g.insert_entry(root, "after", 2);
    let (hook, errors) = collecting_hook();
    let options = AsJsonOptions::default().with_on_error(hook);
    assert_eq!(
        as_json(&g, &Value::Node(root), None, None, &options),
        r#"{"ok":1,"after":2}"#
    );
    assert_eq!(
        errors.lock().unwrap().as_slice(),
        &[GraphError::DanglingNode(NodeId(999))]
    );
}

struct Fixed(&'static str);

impl ToJson for Fixed {
    fn to_json(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

#[test]
fn own_serializer_is_trusted_when_valid() {
    let mut g = Graph::new();
    let root = g.object();
    let custom = g.object();
    g.insert_entry(custom, "hidden", 1);
    g.set_serializer(custom, Arc::new(Fixed(r#"{"custom":true}"#)));
    let broken = g.object();
    g.insert_entry(broken, "kept", 2);
    g.set_serializer(broken, Arc::new(Fixed("{not json")));
    g.insert_entry(root, "custom", custom);
    g.insert_entry(root, "broken", broken);

    let text = as_json(&g, &Value::Node(root), None, None, &AsJsonOptions::default());
    assert_eq!(text, r#"{"custom":{"custom":true},"broken":{"kept":2}}"#);

    let options = AsJsonOptions {
        use_own_serializer: false,
        ..AsJsonOptions::default()
    };
    let text = as_json(&g, &Value::Node(root), None, None, &options);
    assert_eq!(text, r#"{"custom":{"hidden":1},"broken":{"kept":2}}"#);
}

#[test]
fn dates() {
    let mut g = Graph::new();
    let when = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let root = g.object();
    g.insert_entry(root, "at", when);
    let millis = when.timestamp_millis();
    assert_eq!(
        as_json(&g, &Value::Node(root), None, None, &AsJsonOptions::default()),
        format!(r#"{{"at":{millis}}}"#)
    );

    let iso = AsJsonOptions {
        format_dates: true,
        ..AsJsonOptions::default()
    };
    assert_eq!(
        as_json(&g, &Value::Node(root), None, None, &iso),
        r#"{"at":"2024-01-02T03:04:05.000Z"}"#
    );

    let custom = AsJsonOptions::default().with_date_formatter(Arc::new(|d: &chrono::DateTime<Utc>| {
        d.format("%Y/%m/%d").to_string()
    }));
    assert_eq!(
        as_json(&g, &Value::Node(root), None, None, &custom),
        r#"{"at":"2024/01/02"}"#
    );
}

#[test]
fn serialize_never_panics_on_any_variant() {
    let mut g = Graph::new();
    let list = g.array(vec![
        Value::Undefined,
        Value::Null,
        Value::Bool(false),
        Value::Number(f64::NAN),
        Value::Number(f64::NEG_INFINITY),
        Value::BigInt(-7),
        Value::from("s"),
        Value::Date(Utc.timestamp_millis_opt(0).unwrap()),
        Value::Function(Function::anonymous()),
        Value::Node(NodeId(12345)),
    ]);
    let set = g.set(vec![Value::Node(list)]);
    let map = g.map(vec![(Value::Node(set), Value::Node(list))]);
    g.push(list, map);
    let text = as_json(&g, &Value::Node(list), None, None, &AsJsonOptions::default());
    serde_json::from_str::<serde_json::Value>(&text).expect("valid JSON");
}

#[test]
fn parse_never_panics_on_odd_input() {
    for text in [
        "",
        "   ",
        "{",
        "[1,",
        "nul",
        "\"unterminated",
        "${(@path;@base:root):a}",
        "{\"a\":\"${(@path;@base:nowhere):x}\"}",
        "{\"a\":\"${(@path;@base:root):a}\"}",
        "{\"a\":\"${(@path;@base:root):b}\",\"b\":\"${(@path;@base:root):a}\"}",
        "[\"${(@path;@base:this):^}\"]",
        "{\"a\":\"${(@path;@base:root):zz.yy}\"}",
    ] {
        let doc = parse_json(text, None, &ParseOptions::default(), None);
        let _ = doc.as_json(&AsJsonOptions::default());
    }
}

#[test]
fn syntax_errors_are_reported() {
    let (hook, errors) = collecting_hook();
    let options = ParseOptions::default().with_on_error(hook);
    let doc = parse_json("[1,", None, &options, None);
    assert_eq!(doc.root, Value::Undefined);
    assert!(matches!(errors.lock().unwrap()[0], GraphError::Syntax(_)));
}

#[test]
fn self_referencing_token_is_a_cycle() {
    let (hook, errors) = collecting_hook();
    let options = ParseOptions::default().with_on_error(hook);
    let doc = parse_json(r#"{"a":"${(@path;@base:root):a}"}"#, None, &options, None);
    let a = doc.get("a").and_then(Value::as_str).unwrap();
    assert!(a.starts_with("[cycle detected"), "{a}");
    assert!(errors
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, GraphError::CycleDetected { .. })));
}

#[test]
fn mutually_referencing_tokens_terminate() {
    let (hook, errors) = collecting_hook();
    let options = ParseOptions::default().with_on_error(hook);
    let doc = parse_json(
        r#"{"a":"${(@path;@base:root):b}","b":"${(@path;@base:root):a}"}"#,
        None,
        &options,
        None,
    );
    assert!(doc.get("a").and_then(Value::as_str).unwrap().starts_with("[cycle detected"));
    assert!(doc.get("b").and_then(Value::as_str).unwrap().starts_with("[cycle detected"));
    assert!(!errors.lock().unwrap().is_empty());
}

#[test]
fn malformed_tokens_stay_literal_and_are_reported() {
    let (hook, errors) = collecting_hook();
    let options = ParseOptions::default().with_on_error(hook).with_interpolate(true);
    let doc = parse_json(r#"{"a":"${(@path;@base:mars):x}"}"#, None, &options, None);
    assert_eq!(doc.get("a"), Some(&Value::from("${(@path;@base:mars):x}")));
    assert!(errors.lock().unwrap().is_empty());

    let doc = parse_json(
        r#"{"n": 1, "a":"${(@path;@base:mars):x} ${(@path;@base:root):n}"}"#,
        None,
        &options,
        None,
    );
    assert_eq!(doc.get("a"), Some(&Value::from("${(@path;@base:mars):x} 1")));
    assert_eq!(
        errors.lock().unwrap().as_slice(),
        &[GraphError::MalformedToken("${(@path;@base:mars):x}".into())]
    );
}

#[test]
fn deep_document_interpolation_is_bounded() {
    let mut text = String::new();
    for i in 0..40 {
        text.push_str(&format!("{{\"k{i}\":"));
    }
    text.push_str("\"${(@path;@base:root):k0}\"");
    text.push_str(&"}".repeat(40));

    let (hook, errors) = collecting_hook();
    let options = ParseOptions::default().with_on_error(hook);
    let doc = parse_json(&text, None, &options, None);
    let path: Vec<String> = (0..33).map(|i| format!("k{i}")).collect();
    let cut = doc.get(&path.join(".")).and_then(Value::as_str).unwrap();
    assert!(cut.starts_with("[recursion limit exceeded"), "{cut}");
    assert!(matches!(
        errors.lock().unwrap()[0],
        GraphError::RecursionLimitExceeded { .. }
    ));
}
