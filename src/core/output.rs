use serde_json::{Map, Value};
use std::fmt::Write as _;

const INDENT: &str = "    ";

/// Renders `value` as JSON indented with four spaces, escaping everything
/// outside printable ASCII as `\uXXXX`. No trailing newline.
pub fn render_result(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, 0, &mut out);
    out
}

fn write_value(value: &Value, indent: usize, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(val) => out.push_str(if *val { "true" } else { "false" }),
        Value::Number(num) => out.push_str(&num.to_string()),
        Value::String(text) => write_string(text, out),
        Value::Array(items) => write_array(items, indent, out),
        Value::Object(map) => write_object(map, indent, out),
    }
}

fn write_array(items: &[Value], indent: usize, out: &mut String) {
    if items.is_empty() {
        out.push_str("[]");
        return;
    }
    out.push('[');
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push('\n');
        push_indent(indent + 1, out);
        write_value(item, indent + 1, out);
    }
    out.push('\n');
    push_indent(indent, out);
    out.push(']');
}

fn write_object(map: &Map<String, Value>, indent: usize, out: &mut String) {
    if map.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push('{');
    for (idx, (key, value)) in map.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push('\n');
        push_indent(indent + 1, out);
        write_string(key, out);
        out.push_str(": ");
        write_value(value, indent + 1, out);
    }
    out.push('\n');
    push_indent(indent, out);
    out.push('}');
}

fn write_string(text: &str, out: &mut String) {
    // serde_json 負責 JSON 轉義，這裡再把非 ASCII 與 DEL 轉成 \uXXXX
    let encoded = serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string());
    for ch in encoded.chars() {
        if ch.is_ascii() && ch != '\x7f' {
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{:04x}", unit);
            }
        }
    }
}

fn push_indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}
