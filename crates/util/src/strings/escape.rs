/// Escape special characters in a string for JSON serialization.
///
/// Escapes control characters (0x00-0x1F), the double quote and the
/// backslash. Everything else, including non-ASCII text, is passed through.
///
/// # Examples
///
/// ```
/// use json_graph_util::strings::escape;
///
/// assert_eq!(escape("hello"), "hello");
/// assert_eq!(escape("say \"hi\""), "say \\\"hi\\\"");
/// assert_eq!(escape("line1\nline2"), "line1\\nline2");
/// ```
pub fn escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last = 0;

    for (i, ch) in s.char_indices() {
        let short = match ch {
            '"' => Some("\\\""),
            '\\' => Some("\\\\"),
            '\u{0008}' => Some("\\b"),
            '\u{000C}' => Some("\\f"),
            '\n' => Some("\\n"),
            '\r' => Some("\\r"),
            '\t' => Some("\\t"),
            _ => None,
        };

        if let Some(esc) = short {
            result.push_str(&s[last..i]);
            result.push_str(esc);
            last = i + ch.len_utf8();
        } else if (ch as u32) < 0x20 {
            result.push_str(&s[last..i]);
            result.push_str(&format!("\\u{:04x}", ch as u32));
            last = i + ch.len_utf8();
        }
    }

    result.push_str(&s[last..]);
    result
}

/// Serialize text as a JSON string literal, quotes included.
///
/// ```
/// use json_graph_util::strings::quote;
///
/// assert_eq!(quote("a\"b"), "\"a\\\"b\"");
/// ```
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    out.push_str(&escape(s));
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_simple() {
        assert_eq!(escape("hello"), "hello");
        assert_eq!(escape(""), "");
    }

    #[test]
    fn test_escape_quotes_and_backslash() {
        assert_eq!(escape("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_escape_whitespace_controls() {
        assert_eq!(escape("tab\there"), "tab\\there");
        assert_eq!(escape("line1\rline2"), "line1\\rline2");
        assert_eq!(escape("back\x08space"), "back\\bspace");
        assert_eq!(escape("form\x0cfeed"), "form\\ffeed");
    }

    #[test]
    fn test_escape_other_controls() {
        assert_eq!(escape("null\0byte"), "null\\u0000byte");
        assert_eq!(escape("\u{001b}"), "\\u001b");
    }

    #[test]
    fn test_escape_unicode_passthrough() {
        assert_eq!(escape("hello 日本語"), "hello 日本語");
    }

    #[test]
    fn test_quote_token_text() {
        assert_eq!(
            quote("${(@path;@base:root):^}"),
            "\"${(@path;@base:root):^}\""
        );
    }
}
