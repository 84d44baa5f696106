// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Framing for the WebChannel long-poll stream: chunks of the form
//! `<decimalLength>\n<jsonArray>` (spec §4.8).

use serde_json::Value;

use crate::error::{DynamiteError, Result};

/// Accumulates raw bytes off the long-poll response body and yields
/// complete frames as they become available, tolerating arbitrary chunk
/// boundaries (a frame's length prefix or body may straddle two reads).
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pull one complete frame out of the buffer, if enough bytes have
    /// arrived. Call repeatedly after each `push` until it returns `None`.
    pub fn try_next_frame(&mut self) -> Result<Option<Value>> {
        let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };

        let len_str = std::str::from_utf8(&self.buffer[..newline_pos]).map_err(|e| {
            DynamiteError::Other(format!("webchannel frame length is not utf-8: {e}"))
        })?;
        let frame_len: usize = len_str.trim().parse().map_err(|e| {
            DynamiteError::Other(format!("webchannel frame length {len_str:?} invalid: {e}"))
        })?;

        let frame_start = newline_pos + 1;
        let frame_end = frame_start + frame_len;
        if self.buffer.len() < frame_end {
            return Ok(None);
        }

        let frame_bytes = self.buffer[frame_start..frame_end].to_vec();
        self.buffer.drain(..frame_end);

        let value: Value = serde_json::from_slice(&frame_bytes)?;
        Ok(Some(value))
    }
}

/// One `[ack-id, eventPayload]` element out of a decoded frame array.
#[derive(Debug, Clone)]
pub struct AckedEvent {
    pub ack_id: u64,
    pub payload: Value,
}

/// Split a decoded frame array (each element `[ack-id, eventPayload]`)
/// into typed ack/payload pairs, skipping malformed elements.
pub fn split_acked_events(frame: &Value) -> Vec<AckedEvent> {
    let Some(arr) = frame.as_array() else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|el| {
            let pair = el.as_array()?;
            let ack_id = pair.first()?.as_u64()?;
            let payload = pair.get(1)?.clone();
            Some(AckedEvent { ack_id, payload })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_a_single_whole_frame() {
        let mut reader = FrameReader::new();
        let body = json!([1, "x"]).to_string();
        reader.push(format!("{}\n{}", body.len(), body).as_bytes());
        let frame = reader.try_next_frame().unwrap().unwrap();
        assert_eq!(frame, json!([1, "x"]));
        assert!(reader.try_next_frame().unwrap().is_none());
    }

    #[test]
    fn handles_frame_split_across_pushes() {
        let mut reader = FrameReader::new();
        let body = json!([2, "y"]).to_string();
        let full = format!("{}\n{}", body.len(), body);
        let (first_half, second_half) = full.split_at(3);

        reader.push(first_half.as_bytes());
        assert!(reader.try_next_frame().unwrap().is_none());

        reader.push(second_half.as_bytes());
        let frame = reader.try_next_frame().unwrap().unwrap();
        assert_eq!(frame, json!([2, "y"]));
    }

    #[test]
    fn reads_consecutive_frames_from_one_buffer() {
        let mut reader = FrameReader::new();
        let a = json!(["a"]).to_string();
        let b = json!(["b"]).to_string();
        reader.push(format!("{}\n{}{}\n{}", a.len(), a, b.len(), b).as_bytes());

        assert_eq!(reader.try_next_frame().unwrap().unwrap(), json!(["a"]));
        assert_eq!(reader.try_next_frame().unwrap().unwrap(), json!(["b"]));
        assert!(reader.try_next_frame().unwrap().is_none());
    }

    #[test]
    fn splits_ack_id_payload_pairs() {
        let frame = json!([[1, {"kind": "MESSAGE_POSTED"}], [2, {"kind": "TYPING_STATE_CHANGED"}]]);
        let events = split_acked_events(&frame);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].ack_id, 1);
        assert_eq!(events[1].ack_id, 2);
    }
}
