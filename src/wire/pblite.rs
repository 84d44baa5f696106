// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! PBLite: protobuf-over-JSON sparse-array encoding (spec §4.3).
//!
//! A PBLite message is a JSON array where element `i` is field number
//! `i + 1` (1-based), or `null` for an absent field. Nested messages are
//! nested arrays. A trailing JSON object, when present, is an "extension
//! map" keyed by stringified field numbers, used for sparse high field
//! numbers. Decoding must accept either shape at every position, so
//! [`field`] checks both.

use serde_json::{Map, Value};

/// Incrementally builds a PBLite array, leaving gaps as `null`.
#[derive(Debug, Default, Clone)]
pub struct PbliteBuilder {
    slots: Vec<Value>,
}

impl PbliteBuilder {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Set field number `n` (1-based) to `value`, padding earlier absent
    /// fields with `null`.
    pub fn set(mut self, field_number: usize, value: Value) -> Self {
        assert!(field_number >= 1, "PBLite field numbers are 1-based");
        let idx = field_number - 1;
        if self.slots.len() <= idx {
            self.slots.resize(idx + 1, Value::Null);
        }
        self.slots[idx] = value;
        self
    }

    pub fn build(self) -> Value {
        Value::Array(self.slots)
    }
}

/// Read field `n` (1-based) out of a PBLite-encoded value, tolerating
/// either the sparse-array shape or the stringified-key object shape.
/// Returns `None` for an absent or explicitly-null field.
pub fn field(value: &Value, field_number: usize) -> Option<&Value> {
    match value {
        Value::Array(arr) => arr
            .get(field_number - 1)
            .filter(|v| !v.is_null()),
        Value::Object(map) => map
            .get(&field_number.to_string())
            .filter(|v| !v.is_null()),
        _ => None,
    }
}

/// Walk a dotted field path (each element 1-based) through nested PBLite
/// messages, e.g. `path(&msg, &[3, 2])` reads field 2 of the nested message
/// at field 3.
pub fn path<'a>(value: &'a Value, field_numbers: &[usize]) -> Option<&'a Value> {
    let mut current = value;
    for &n in field_numbers {
        current = field(current, n)?;
    }
    Some(current)
}

pub fn as_str(value: &Value) -> Option<&str> {
    value.as_str()
}

/// Timestamps on the wire are microsecond integers encoded as JSON strings
/// when >= 2^53 (JS safe-integer limit), otherwise JSON numbers (spec §4.5).
pub fn as_timestamp_micros(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

/// Merge an extension-map object (stringified high field numbers) onto a
/// sparse array PBLite value, producing the combined tail the wire format
/// describes. Unused by the decoder directly (callers use [`field`]), kept
/// for encoders that must emit the trailing-object shape.
pub fn with_extension_map(mut array: Vec<Value>, extensions: Map<String, Value>) -> Value {
    if extensions.is_empty() {
        return Value::Array(array);
    }
    array.push(Value::Object(extensions));
    Value::Array(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_pads_absent_fields_with_null() {
        let msg = PbliteBuilder::new().set(3, json!("x")).build();
        assert_eq!(msg, json!([null, null, "x"]));
    }

    #[test]
    fn field_reads_array_and_object_shapes() {
        let arr = json!(["a", "b", "c"]);
        assert_eq!(field(&arr, 2).unwrap(), &json!("b"));

        let obj = json!({"2": "b"});
        assert_eq!(field(&obj, 2).unwrap(), &json!("b"));
    }

    #[test]
    fn field_treats_null_as_absent() {
        let arr = json!([null, "b"]);
        assert!(field(&arr, 1).is_none());
    }

    #[test]
    fn path_walks_nested_messages() {
        let nested = json!([null, null, [null, "deep"]]);
        assert_eq!(path(&nested, &[3, 2]).unwrap(), &json!("deep"));
    }

    #[test]
    fn timestamp_accepts_number_and_string() {
        assert_eq!(as_timestamp_micros(&json!(1705000000000000i64)), Some(1705000000000000));
        assert_eq!(
            as_timestamp_micros(&json!("1705000000000000")),
            Some(1705000000000000)
        );
    }
}
