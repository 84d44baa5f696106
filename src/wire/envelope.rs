// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Response envelope parsing: XSSI-guard stripping and the two RPC
//! response shapes described in spec §4.3 — a single JSON document for the
//! `alt=protojson` endpoint, and a newline-delimited sequence of JSON
//! arrays for the batchexecute endpoint.

use serde_json::Value;

use crate::error::{DynamiteError, Result};

pub const XSSI_GUARD: &str = ")]}'";

/// One decoded RPC response: its rpc id, PBLite payload, and the full raw
/// entry array (some RPCs carry extra flags after the payload, e.g. the
/// `containsFirstTopic`/`containsLastTopic` pair the cursor engine reads).
#[derive(Debug, Clone)]
pub struct RpcEnvelopeEntry {
    pub rpc_id: String,
    pub payload: Value,
    pub raw: Value,
}

impl RpcEnvelopeEntry {
    /// Read a 1-based field off the raw entry array (not the payload).
    pub fn raw_field(&self, field_number: usize) -> Option<&Value> {
        crate::wire::pblite::field(&self.raw, field_number)
    }
}

/// Strip the four-byte XSSI guard and any following whitespace.
pub fn strip_xssi(body: &str) -> &str {
    body.strip_prefix(XSSI_GUARD).unwrap_or(body).trim_start()
}

fn schema_err(detail: impl Into<String>) -> DynamiteError {
    DynamiteError::SchemaMismatch {
        rpc_id: "<envelope>".to_string(),
        detail: detail.into(),
    }
}

/// Parse a JSON-protobuf endpoint response: after the XSSI strip, a single
/// JSON array of `[rpcId, payload, ...]` entries.
pub fn parse_json_endpoint(body: &str) -> Result<Vec<RpcEnvelopeEntry>> {
    let stripped = strip_xssi(body);
    let doc: Value = serde_json::from_str(stripped)?;
    let entries = doc
        .as_array()
        .ok_or_else(|| schema_err("top-level document is not an array"))?;

    entries.iter().map(parse_entry).collect()
}

fn parse_entry(entry: &Value) -> Result<RpcEnvelopeEntry> {
    let entry_arr = entry
        .as_array()
        .ok_or_else(|| schema_err("envelope entry is not an array"))?;
    let rpc_id = entry_arr
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| schema_err("envelope entry missing rpcId"))?
        .to_string();
    let payload = entry_arr.get(1).cloned().unwrap_or(Value::Null);
    Ok(RpcEnvelopeEntry {
        rpc_id,
        payload,
        raw: entry.clone(),
    })
}

/// Parse a batchexecute response: after the XSSI strip, newline-delimited
/// JSON arrays, each containing `[rpcId, payloadAsJsonString, null,
/// "generic"]` entries. `payloadAsJsonString` is itself a JSON-encoded
/// PBLite document and is parsed a second time.
pub fn parse_batch_endpoint(body: &str) -> Result<Vec<RpcEnvelopeEntry>> {
    let stripped = strip_xssi(body);
    let mut out = Vec::new();

    for line in stripped.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let chunk: Value = serde_json::from_str(line)?;
        let entries = chunk
            .as_array()
            .ok_or_else(|| schema_err("batch chunk is not an array"))?;

        for entry in entries {
            let entry_arr = entry
                .as_array()
                .ok_or_else(|| schema_err("batch entry is not an array"))?;
            let rpc_id = entry_arr
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| schema_err("batch entry missing rpcId"))?
                .to_string();
            let payload_str = entry_arr
                .get(1)
                .and_then(Value::as_str)
                .ok_or_else(|| schema_err("batch entry payload is not a JSON string"))?;
            let payload: Value = serde_json::from_str(payload_str)?;
            out.push(RpcEnvelopeEntry {
                rpc_id,
                payload,
                raw: entry.clone(),
            });
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_xssi_guard_and_whitespace() {
        assert_eq!(strip_xssi(")]}'\n[1,2]"), "[1,2]");
        assert_eq!(strip_xssi("[1,2]"), "[1,2]");
    }

    /// Spec §8 scenario 1.
    #[test]
    fn parses_json_endpoint_scenario_one() {
        let body = r#")]}'
[["dfe.t.lt",[[[null,"topic_A",[["spcX"]]],"1705000000000000",null,null,null,null,[[[null,"msg_1"],[["u1"],"Alice"],"1705000000000000",null,null,null,null,null,null,"hello",[]]]]],null,null,true,true]]"#;
        let entries = parse_json_endpoint(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rpc_id, "dfe.t.lt");
        assert!(entries[0].payload.is_array());
    }

    #[test]
    fn parses_batch_endpoint_double_encoded_payload() {
        let payload_json = json!([null, "topic_A"]).to_string();
        let chunk = json!([[ "dfe.t.lt", payload_json, null, "generic" ]]).to_string();
        let body = format!(")]}}'\n{chunk}");
        let entries = parse_batch_endpoint(&body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rpc_id, "dfe.t.lt");
        assert_eq!(entries[0].payload, json!([null, "topic_A"]));
    }

    #[test]
    fn batch_endpoint_parses_multiple_lines() {
        let chunk1 = json!([["a.1", json!([1]).to_string(), null, "generic"]]).to_string();
        let chunk2 = json!([["a.2", json!([2]).to_string(), null, "generic"]]).to_string();
        let body = format!(")]}}'\n{chunk1}\n{chunk2}\n");
        let entries = parse_batch_endpoint(&body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].rpc_id, "a.2");
    }
}
