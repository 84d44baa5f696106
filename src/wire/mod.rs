// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Wire Codec: PBLite encoding, response-envelope parsing, and
//! SAPISIDHASH header derivation (spec §4.3).

pub mod envelope;
pub mod pblite;
pub mod sapisidhash;

use serde_json::json;

use crate::constants;

/// Build the request-header PBLite sub-message every RPC leads with:
/// client-type = 2 (web), client-version = the fixed literal, and a
/// feature-capability sub-message `[null, 1]`.
pub fn request_header() -> serde_json::Value {
    pblite::PbliteBuilder::new()
        .set(1, json!(constants::CLIENT_TYPE_WEB))
        .set(2, json!(constants::CLIENT_VERSION))
        .set(3, json!([null, 1]))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_header_matches_spec_shape() {
        let header = request_header();
        assert_eq!(
            header,
            json!([
                constants::CLIENT_TYPE_WEB,
                constants::CLIENT_VERSION,
                [null, 1]
            ])
        );
    }
}
