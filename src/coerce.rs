//! Lenient decoding of the persisted `todos` payload.
//!
//! The payload may have been written by an older build or edited by hand, so
//! nothing here fails: an unusable document yields no tasks, and every field of
//! every record falls back to a default on its own.

use crate::ids::{IdGenerator, MAX_ID};
use crate::task::{Priority, Task, TaskId};
use serde_json::{Map, Value};

/// Decodes `raw` into tasks. Records without a usable id get one from `ids`,
/// after every usable id in the document has been observed.
pub fn tasks_from_json(raw: &str, ids: &mut IdGenerator) -> Vec<Task> {
    let items = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            log::warn!("stored tasks are not an array ({}), starting empty", kind(&other));
            return Vec::new();
        }
        Err(e) => {
            log::warn!("stored tasks are not valid JSON ({}), starting empty", e);
            return Vec::new();
        }
    };

    let empty = Map::new();
    let records: Vec<&Map<String, Value>> = items
        .iter()
        .map(|item| item.as_object().unwrap_or(&empty))
        .collect();

    let stored_ids: Vec<Option<TaskId>> =
        records.iter().map(|r| coerce_id(r.get("id"))).collect();
    for id in stored_ids.iter().flatten() {
        ids.observe(*id);
    }

    records
        .into_iter()
        .zip(stored_ids)
        .map(|(record, id)| Task {
            id: id.unwrap_or_else(|| ids.next_id()),
            text: coerce_text(record.get("text")),
            done: truthy(record.get("done")),
            priority: coerce_priority(record.get("priority")),
            due_date: coerce_due_date(record.get("dueDate")),
        })
        .collect()
}

/// Numeric coercion. Zero, non-finite, fractional and out-of-range values are unusable.
fn coerce_id(value: Option<&Value>) -> Option<TaskId> {
    let n = match value? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return (i != 0 && i.unsigned_abs() <= MAX_ID as u64).then_some(i);
            }
            n.as_f64()?
        }
        Value::String(s) => parse_number(s)?,
        Value::Bool(true) => 1.0,
        array @ Value::Array(_) => parse_number(&loose_string(array))?,
        _ => return None,
    };
    if !n.is_finite() || n == 0.0 || n.fract() != 0.0 || n.abs() > MAX_ID as f64 {
        return None;
    }
    Some(n as TaskId)
}

/// Number parsing with the loose rules: blank is zero, `0x`/`0o`/`0b` pick a radix.
fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    let radix = match s.get(..2) {
        Some("0x") | Some("0X") => 16,
        Some("0o") | Some("0O") => 8,
        Some("0b") | Some("0B") => 2,
        _ => return s.parse::<f64>().ok(),
    };
    i64::from_str_radix(&s[2..], radix).ok().map(|i| i as f64)
}

/// String coercion: arrays join their elements with commas, objects are opaque.
fn loose_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(loose_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn coerce_text(value: Option<&Value>) -> String {
    value.map(loose_string).unwrap_or_default()
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn coerce_priority(value: Option<&Value>) -> Priority {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

fn coerce_due_date(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
