use std::path::Path;

use anyhow::Context as _;
use serde_json::Value;

/// Reads a cookies JSON file and renders it as a `Cookie` header value.
///
/// Accepts a plain `{"name": "value"}` object or a browser-export array of
/// `{"name": ..., "value": ...}` objects. Returns `None` when the file holds no
/// usable cookie.
pub fn load_cookie_header(path: &Path) -> anyhow::Result<Option<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read cookies file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse cookies file as json: {}", path.display()))?;

    let pairs = cookie_pairs(&value)
        .with_context(|| format!("unsupported cookies layout: {}", path.display()))?;
    if pairs.is_empty() {
        return Ok(None);
    }

    let header = pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ");
    Ok(Some(header))
}

fn cookie_pairs(value: &Value) -> anyhow::Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    match value {
        Value::Object(map) => {
            for (name, value) in map {
                push_pair(&mut pairs, name, value);
            }
        }
        Value::Array(items) => {
            for item in items {
                let (Some(name), Some(value)) = (
                    item.get("name").and_then(Value::as_str),
                    item.get("value"),
                ) else {
                    anyhow::bail!("cookie array entries need `name` and `value`");
                };
                push_pair(&mut pairs, name, value);
            }
        }
        _ => anyhow::bail!("cookies must be a json object or array"),
    }
    Ok(pairs)
}

fn push_pair(pairs: &mut Vec<(String, String)>, name: &str, value: &Value) {
    let name = name.trim();
    if name.is_empty() || name.contains(';') || name.contains('=') {
        tracing::debug!(name, "skipping cookie with unusable name");
        return;
    }
    let value = match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return,
    };
    pairs.push((name.to_owned(), value));
}
