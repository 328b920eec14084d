//! Field-reference helpers over generated records.
//!
//! A field reference is either a top-level key or a dotted path into nested
//! objects. The top-level key wins when both resolve.

use serde_json::{Map, Value};

/// A generated record: a JSON object.
pub type Record = Map<String, Value>;

/// Resolve a field reference.
pub fn lookup<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(field) {
        return Some(value);
    }
    let mut segments = field.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// A field is present when the reference resolves, even to `null`.
pub fn is_present(record: &Record, field: &str) -> bool {
    lookup(record, field).is_some()
}

/// Write `value` at a field reference.
///
/// Dotted references write into an existing nested object when the parent
/// path resolves; otherwise the reference is used as a top-level key.
pub fn set_field(record: &mut Record, field: &str, value: Value) {
    if !record.contains_key(field)
        && let Some((parent, leaf)) = nested_parent_mut(record, field)
    {
        parent.insert(leaf.to_string(), value);
        return;
    }
    record.insert(field.to_string(), value);
}

/// Remove a field reference, returning the previous value.
pub fn remove_field(record: &mut Record, field: &str) -> Option<Value> {
    if let Some(value) = record.remove(field) {
        return Some(value);
    }
    let (parent, leaf) = nested_parent_mut(record, field)?;
    parent.remove(leaf)
}

fn nested_parent_mut<'a, 'f>(
    record: &'a mut Record,
    field: &'f str,
) -> Option<(&'a mut Record, &'f str)> {
    let (parent_path, leaf) = field.rsplit_once('.')?;
    let mut current = record;
    for segment in parent_path.split('.') {
        current = current.get_mut(segment)?.as_object_mut()?;
    }
    Some((current, leaf))
}

/// Numeric coercion: numbers as-is, parseable strings parsed, everything
/// else (including missing values) is `0.0`.
pub fn numeric_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Truthiness used by conditional rules.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
