//! `json-graph`: parse a reference-token document and print it back.
//!
//! Usage:
//!   json-graph [--indent N] [--structural]
//!
//! Built with `--features cli`.
//!
//! The document is read from stdin. References are resolved, then the graph
//! is serialized again, so aliases and cycles come out as canonical tokens.
//! Diagnostics are logged to stderr; set `RUST_LOG=json_graph=debug` for more.

use std::io::{self, Read, Write};

use json_graph::{AliasMode, AsJsonOptions, Codec, ParseOptions};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut indent = None;
    let mut alias_mode = AliasMode::Identity;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--indent" => match args.next().and_then(|n| n.parse().ok()) {
                Some(n) => indent = Some(n),
                None => {
                    eprintln!("--indent expects a number.");
                    std::process::exit(1);
                }
            },
            "--structural" => alias_mode = AliasMode::Structural,
            other => {
                eprintln!("Unknown argument: {other}");
                std::process::exit(1);
            }
        }
    }

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let codec = Codec::new();
    let doc = codec.parse_json(&buf, None, &ParseOptions::default(), None);
    let options = AsJsonOptions::default().with_alias_mode(alias_mode);
    let out = codec.as_json(&doc.graph, &doc.root, None, indent, &options);

    let mut stdout = io::stdout();
    if let Err(e) = writeln!(stdout, "{out}") {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
