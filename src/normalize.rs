use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static BLANK_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\p{Cc}]+").expect("blank-run regex"));

/// Cleans one text field: backslashes removed, CRLF and any run of whitespace
/// or control characters collapsed to a single space, ends trimmed.
pub fn clean_text(text: &str) -> String {
    let text = text.replace('\\', "").replace("\r\n", " ");
    BLANK_RUN_RE.replace_all(&text, " ").trim().to_owned()
}

/// Applies [`clean_text`] to every string leaf of a decoded payload.
///
/// Object keys are left alone; only values are rewritten.
pub fn normalize_strings(value: &mut Value) {
    match value {
        Value::String(text) => *text = clean_text(text),
        Value::Array(items) => items.iter_mut().for_each(normalize_strings),
        Value::Object(map) => map.values_mut().for_each(normalize_strings),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
