//! Helpers for emitting Lua source literals.
//!
//! Everything the compiler embeds into the sidecar script goes through
//! [`quote`], so user-provided paths, methods and URIs can never terminate
//! a string literal early.

use std::fmt::Write;

/// Render `value` as a double-quoted Lua string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                // Lua decimal escapes address single bytes.
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    let _ = write!(out, "\\{byte:03}");
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render an iterator of key/value pairs as a Lua table with string keys,
/// e.g. `{["prompt"]="login"}`. Pairs are emitted in iteration order.
pub fn string_table<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let parts: Vec<String> = entries
        .into_iter()
        .map(|(key, value)| format!("[{}]={}", quote(key), quote(value)))
        .collect();
    format!("{{{}}}", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_plain() {
        assert_eq!(quote("/api/v1"), r#""/api/v1""#);
        assert_eq!(quote(""), r#""""#);
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"a"b"#), r#""a\"b""#);
        assert_eq!(quote(r"a\b"), r#""a\\b""#);
        assert_eq!(quote("a\nb"), r#""a\nb""#);
        assert_eq!(quote("a\u{1}b"), r#""a\001b""#);
    }

    #[test]
    fn test_quote_non_ascii_control_is_utf8_bytes() {
        assert_eq!(quote("a\u{85}b"), r#""a\194\133b""#);
        assert_eq!(quote("\u{7f}"), r#""\127""#);
        assert_eq!(quote("caf\u{e9}"), "\"caf\u{e9}\"");
    }

    #[test]
    fn test_string_table() {
        assert_eq!(string_table(Vec::<(&str, &str)>::new()), "{}");
        assert_eq!(
            string_table([("acr_values", "Level4"), ("prompt", "login")]),
            r#"{["acr_values"]="Level4",["prompt"]="login"}"#
        );
    }
}
