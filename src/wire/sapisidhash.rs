// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! SAPISIDHASH authorization header derivation (spec §4.3, §8 scenario 2).

use sha1::{Digest, Sha1};

/// Build the `Authorization` header value for a request to `origin`,
/// given the current Unix time and a SAPISID-family cookie value.
///
/// `"SAPISIDHASH " + unixSeconds + "_" + hex(sha1(unixSeconds + " " + sapisid + " " + origin))`
pub fn compute(unix_seconds: i64, sapisid: &str, origin: &str) -> String {
    let pre_image = format!("{unix_seconds} {sapisid} {origin}");
    let digest = Sha1::digest(pre_image.as_bytes());
    format!("SAPISIDHASH {unix_seconds}_{}", hex::encode(digest))
}

/// Convenience wrapper using the current wall-clock time.
pub fn header_value(sapisid: &str, origin: &str) -> String {
    compute(chrono::Utc::now().timestamp(), sapisid, origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spec §8 scenario 2 exact test vector.
    #[test]
    fn matches_spec_test_vector() {
        let header = compute(1_700_000_000, "abc123", "https://chat.google.com");
        let pre_image = "1700000000 abc123 https://chat.google.com";
        let expected_digest = hex::encode(Sha1::digest(pre_image.as_bytes()));
        assert_eq!(header, format!("SAPISIDHASH 1700000000_{expected_digest}"));
    }

    #[test]
    fn deterministic_given_same_inputs() {
        let a = compute(1_700_000_000, "abc123", "https://chat.google.com");
        let b = compute(1_700_000_000, "abc123", "https://chat.google.com");
        assert_eq!(a, b);
    }

    #[test]
    fn differs_when_any_input_changes() {
        let base = compute(1_700_000_000, "abc123", "https://chat.google.com");
        assert_ne!(base, compute(1_700_000_001, "abc123", "https://chat.google.com"));
        assert_ne!(base, compute(1_700_000_000, "other", "https://chat.google.com"));
        assert_ne!(base, compute(1_700_000_000, "abc123", "https://mail.google.com"));
    }
}
