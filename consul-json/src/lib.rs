//! # Consul JSON
//!
//! Deterministic JSON rendering for Consul agent configuration files.
//!
//! Consul reloads its configuration when the file changes, so the same
//! configuration must always produce the same bytes. [`render`] sorts map
//! keys and applies Consul's quoting conventions:
//!
//! - Strings that look like integers (`"8500"`, `"-1"`) are written bare.
//! - Everything below a `node_meta`, `meta` or `tags` key is forced to a
//!   string: numbers and booleans are quoted, integer-like strings keep
//!   their quotes. `null` stays `null`.
//!
//! ## Usage
//!
//! ```rust
//! use serde_json::json;
//!
//! let config = json!({
//!     "ports": {"rpc": 8567, "http": -1},
//!     "bind_addr": "192.168.34.56",
//!     "node_meta": {"rack": 12},
//! });
//!
//! assert_eq!(
//!     consul_json::render(&config, false, 4),
//!     r#"{"bind_addr":"192.168.34.56","node_meta":{"rack":"12"},"ports":{"http":-1,"rpc":8567}}"#
//! );
//! ```

use serde_json::{Map, Value};

/// Keys whose children are always rendered as strings.
pub const QUOTED_KEYS: [&str; 3] = ["node_meta", "meta", "tags"];

/// Default indentation width for pretty output.
pub const DEFAULT_INDENT: usize = 4;

/// Render `value` as sorted JSON.
///
/// In pretty mode every entry gets its own line, nested `indent_width`
/// spaces per level, and the output ends with a newline.
pub fn render(value: &Value, pretty: bool, indent_width: usize) -> String {
    let mut out = String::new();
    if pretty {
        let indent = " ".repeat(indent_width);
        write_pretty(&mut out, value, &indent, 0, false);
        out.push('\n');
    } else {
        write_compact(&mut out, value, false);
    }
    out
}

/// Render `value` as compact sorted JSON.
pub fn to_compact(value: &Value) -> String {
    render(value, false, DEFAULT_INDENT)
}

/// Render `value` as pretty sorted JSON with the default indentation.
pub fn to_pretty(value: &Value) -> String {
    render(value, true, DEFAULT_INDENT)
}

/// True for strings of the form `-?(0|[1-9][0-9]*)`.
pub fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    match digits.as_bytes() {
        [] => false,
        [b'0'] => true,
        [first, rest @ ..] => {
            (b'1'..=b'9').contains(first) && rest.iter().all(|b| b.is_ascii_digit())
        }
    }
}

fn quote(s: &str) -> String {
    Value::String(s.to_owned()).to_string()
}

fn quotes_children(key: &str, quoted: bool) -> bool {
    quoted || QUOTED_KEYS.contains(&key)
}

fn sorted_entries(map: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    entries
}

fn write_scalar(out: &mut String, value: &Value, quoted: bool) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) if quoted => out.push_str(&quote(&b.to_string())),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) if quoted => out.push_str(&quote(&n.to_string())),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) if !quoted && is_integer_literal(s) => out.push_str(s),
        Value::String(s) => out.push_str(&quote(s)),
        Value::Array(_) | Value::Object(_) => {}
    }
}

fn write_compact(out: &mut String, value: &Value, quoted: bool) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_compact(out, item, quoted);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, child)) in sorted_entries(map).into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&quote(key));
                out.push(':');
                write_compact(out, child, quotes_children(key, quoted));
            }
            out.push('}');
        }
        scalar => write_scalar(out, scalar, quoted),
    }
}

fn write_pretty(out: &mut String, value: &Value, indent: &str, level: usize, quoted: bool) {
    match value {
        Value::Array(items) => {
            // The element indent is written even for an empty array.
            out.push_str("[\n");
            out.push_str(&indent.repeat(level + 1));
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(",\n");
                    out.push_str(&indent.repeat(level + 1));
                }
                write_pretty(out, item, indent, level + 1, quoted);
            }
            out.push('\n');
            out.push_str(&indent.repeat(level));
            out.push(']');
        }
        Value::Object(map) => {
            out.push_str("{\n");
            for (i, (key, child)) in sorted_entries(map).into_iter().enumerate() {
                if i > 0 {
                    out.push_str(",\n");
                }
                out.push_str(&indent.repeat(level + 1));
                out.push_str(&quote(key));
                out.push_str(": ");
                write_pretty(out, child, indent, level + 1, quotes_children(key, quoted));
            }
            out.push('\n');
            out.push_str(&indent.repeat(level));
            out.push('}');
        }
        scalar => write_scalar(out, scalar, quoted),
    }
}
