use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::normalize::normalize_strings;

#[derive(Debug, thiserror::Error)]
#[error("{record}: {message}")]
pub struct SchemaError {
    pub record: &'static str,
    pub message: String,
}

impl SchemaError {
    pub fn new(record: &'static str, message: impl Into<String>) -> Self {
        Self {
            record,
            message: message.into(),
        }
    }
}

/// A logical field that some responses send under other keys.
#[derive(Debug, Clone, Copy)]
pub struct Alias {
    pub field: &'static str,
    pub alternates: &'static [&'static str],
}

/// Fills `field` from the first non-null alternate when it is missing or null.
///
/// A present, non-null primary always wins. When nothing is found the field is
/// left absent so the record's declared default (or required-field error)
/// applies.
pub fn resolve_aliases(object: &mut Map<String, Value>, aliases: &[Alias]) {
    for alias in aliases {
        if object.get(alias.field).is_some_and(|v| !v.is_null()) {
            continue;
        }
        let found = alias
            .alternates
            .iter()
            .find_map(|key| object.get(*key).filter(|v| !v.is_null()))
            .cloned();
        if let Some(value) = found {
            object.insert(alias.field.to_owned(), value);
        }
    }
}

/// Takes the object stored under `key` out of a decoded payload root.
pub fn take_object(
    root: &mut Value,
    record: &'static str,
    key: &str,
) -> Result<Map<String, Value>, SchemaError> {
    match root.get_mut(key).map(Value::take) {
        Some(Value::Object(object)) => Ok(object),
        Some(Value::Null) | None => Err(SchemaError::new(
            record,
            format!("payload has no `{key}` object"),
        )),
        Some(other) => Err(SchemaError::new(
            record,
            format!("`{key}` must be an object, got {}", json_type_name(&other)),
        )),
    }
}

/// Normalizes every string, resolves aliases, then builds the typed record.
pub fn map_record<T: DeserializeOwned>(
    mut object: Map<String, Value>,
    record: &'static str,
    aliases: &[Alias],
) -> Result<T, SchemaError> {
    object.values_mut().for_each(normalize_strings);
    resolve_aliases(&mut object, aliases);
    serde_json::from_value(Value::Object(object))
        .map_err(|err| SchemaError::new(record, err.to_string()))
}

/// Same as [`map_record`], applied to each element of an array field.
pub fn map_records<T: DeserializeOwned>(
    object: &mut Map<String, Value>,
    record: &'static str,
    key: &str,
    aliases: &[Alias],
) -> Result<Vec<T>, SchemaError> {
    let items = match object.remove(key) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(SchemaError::new(
                record,
                format!("`{key}` must be an array, got {}", json_type_name(&other)),
            ));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(item) => map_record(item, record, aliases),
            other => Err(SchemaError::new(
                record,
                format!("`{key}[{idx}]` must be an object, got {}", json_type_name(&other)),
            )),
        })
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Serde helpers for fields that the source sends with inconsistent JSON types.
pub mod lenient {
    use serde::{Deserialize, Deserializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrText {
        Int(i64),
        Text(String),
    }

    /// Accepts `12` as well as `"12"`.
    pub fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match IntOrText::deserialize(deserializer)? {
            IntOrText::Int(v) => Ok(v),
            IntOrText::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| de::Error::custom(format!("expected an integer, got {text:?}"))),
        }
    }

    /// Accepts `"123"` as well as `123` for identifiers.
    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match IntOrText::deserialize(deserializer)? {
            IntOrText::Int(v) => Ok(v.to_string()),
            IntOrText::Text(text) => Ok(text),
        }
    }

    pub fn opt_id<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(Option::<IntOrText>::deserialize(deserializer)?.map(|v| match v {
            IntOrText::Int(v) => v.to_string(),
            IntOrText::Text(text) => text,
        }))
    }

    /// Like [`id`], with `null` read as an empty string.
    pub fn id_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(opt_id(deserializer)?.unwrap_or_default())
    }
}
