//! Shared helpers for comparing remote state against desired facets
//!
//! The Arr-family APIs model provider settings as a `fields` array of
//! `{name, value}` pairs; drift detection works over a map view of that
//! array.

use serde_json::{Value, json};
use std::collections::BTreeMap;

/// View a JSON value as an array, treating anything else as empty
pub(crate) fn as_array(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Map view of an entry's `fields` array
pub(crate) fn field_map(entry: &Value) -> BTreeMap<&str, &Value> {
    let mut map = BTreeMap::new();
    for field in as_array(entry.get("fields").unwrap_or(&Value::Null)) {
        if let Some(name) = field.get("name").and_then(Value::as_str) {
            map.insert(name, field.get("value").unwrap_or(&Value::Null));
        }
    }
    map
}

/// Whether any expected field differs from the current remote value.
/// Fields in `skip` are never compared (the API redacts or omits them).
pub(crate) fn fields_drifted(
    current: &BTreeMap<&str, &Value>,
    expected: &[(&str, Value)],
    skip: &[&str],
) -> bool {
    expected
        .iter()
        .filter(|(name, _)| !skip.contains(name))
        .any(|(name, want)| current.get(name).is_none_or(|have| *have != want))
}

/// Build a `fields` array from expected name/value pairs
pub(crate) fn fields_array(expected: &[(&str, Value)]) -> Value {
    Value::Array(
        expected
            .iter()
            .map(|(name, value)| json!({"name": name, "value": value}))
            .collect(),
    )
}
