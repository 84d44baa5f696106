// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Chromium cookie-value decryption: PBKDF2-HMAC-SHA1 key derivation and
//! AES-128-CBC decryption of the `v10`/`v11`-prefixed `encrypted_value`
//! column, per spec §4.1.

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;

use crate::constants;
use crate::error::{DynamiteError, Result};

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Derive the 16-byte AES key Chromium uses to wrap cookie values.
///
/// macOS: `password` comes from the OS keychain entry "Chrome Safe Storage",
/// 1003 PBKDF2 iterations. Linux: the hard-coded password `"peanuts"`, 1
/// iteration. Both use the fixed salt `"saltysalt"`.
pub fn derive_key(password: &[u8], iterations: u32) -> [u8; constants::AES_KEY_LEN] {
    let mut key = [0u8; constants::AES_KEY_LEN];
    pbkdf2_hmac::<Sha1>(password, constants::PBKDF2_SALT, iterations, &mut key);
    key
}

/// Decrypt a Chromium `encrypted_value` blob (the 3-byte `v10`/`v11` prefix
/// must already be stripped) using the derived key and the fixed
/// all-`0x20` IV, removing PKCS#7 padding.
pub fn decrypt_value(ciphertext: &[u8], key: &[u8; constants::AES_KEY_LEN]) -> Result<String> {
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(DynamiteError::Other(
            "ciphertext is not a multiple of the AES block size".to_string(),
        ));
    }
    let mut buf = ciphertext.to_vec();
    let decryptor = Aes128CbcDec::new(key.into(), &constants::AES_IV.into());
    let plaintext = decryptor
        .decrypt_padded_mut::<cbc::cipher::block_padding::Pkcs7>(&mut buf)
        .map_err(|e| DynamiteError::Other(format!("cookie value padding invalid: {e}")))?;
    String::from_utf8(plaintext.to_vec())
        .map_err(|e| DynamiteError::Other(format!("decrypted cookie value not utf-8: {e}")))
}

/// Split a raw `encrypted_value` column into its version tag and ciphertext.
/// Returns `None` if the value doesn't carry a recognized `v10`/`v11` prefix
/// (the caller then treats the row as plaintext).
pub fn split_version_prefix(raw: &[u8]) -> Option<(&[u8; 3], &[u8])> {
    if raw.len() < 3 {
        return None;
    }
    let (prefix, rest) = raw.split_at(3);
    match prefix {
        b"v10" | b"v11" => Some((prefix.try_into().unwrap(), rest)),
        _ => None,
    }
}

/// Read the macOS Chromium "Chrome Safe Storage" keychain password.
#[cfg(target_os = "macos")]
pub fn macos_keychain_password() -> Result<String> {
    let entry = keyring::Entry::new(constants::KEYCHAIN_SERVICE, constants::KEYCHAIN_ACCOUNT)
        .map_err(|e| DynamiteError::KeyUnavailable(e.to_string()))?;
    entry
        .get_password()
        .map_err(|e| DynamiteError::KeyUnavailable(e.to_string()))
}
