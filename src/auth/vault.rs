// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Cookie Vault: reads, decrypts, and selects cookies from an on-disk
//! Chromium-family cookie store (spec §4.1).
//!
//! Supported stores follow the corpus's browser-probing idiom (profile
//! directories are well-known and checked for existence, no registry
//! parsing) but only the three encryption policies spec.md documents are
//! implemented: macOS keychain-derived, Linux hard-coded-password, and
//! plaintext passthrough for rows with no `encrypted_value`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use super::cookie::{sanitize, Cookie};
use super::crypto;
use crate::constants;
use crate::error::{DynamiteError, Result};

/// Browsers whose cookie stores dynamite knows how to read (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserKind {
    Chrome,
    Brave,
    Edge,
    Chromium,
    Arc,
}

impl BrowserKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chrome => "Chrome",
            Self::Brave => "Brave",
            Self::Edge => "Edge",
            Self::Chromium => "Chromium",
            Self::Arc => "Arc",
        }
    }

    pub fn all() -> &'static [BrowserKind] {
        &[
            BrowserKind::Chrome,
            BrowserKind::Brave,
            BrowserKind::Edge,
            BrowserKind::Chromium,
            BrowserKind::Arc,
        ]
    }

    /// Case-insensitive lookup by `name()`, for env-var-driven configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|b| b.name().eq_ignore_ascii_case(name))
    }

    /// Root "User Data"-style directory for this browser, platform-specific.
    fn user_data_dir(&self) -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        #[cfg(target_os = "macos")]
        {
            let base = home.join("Library/Application Support");
            return Some(match self {
                Self::Chrome => base.join("Google/Chrome"),
                Self::Brave => base.join("BraveSoftware/Brave-Browser"),
                Self::Edge => base.join("Microsoft Edge"),
                Self::Chromium => base.join("Chromium"),
                Self::Arc => base.join("Arc/User Data"),
            });
        }
        #[cfg(target_os = "linux")]
        {
            return Some(match self {
                Self::Chrome => home.join(".config/google-chrome"),
                Self::Brave => home.join(".config/BraveSoftware/Brave-Browser"),
                Self::Edge => home.join(".config/microsoft-edge"),
                Self::Chromium => {
                    let snap = home.join("snap/chromium/common/chromium");
                    if snap.exists() {
                        snap
                    } else {
                        home.join(".config/chromium")
                    }
                }
                Self::Arc => return None, // Arc does not ship on Linux.
            });
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }

    pub fn profile_dir(&self, profile: &str) -> Option<PathBuf> {
        self.user_data_dir().map(|d| d.join(profile))
    }

    pub fn cookies_db_path(&self, profile: &str) -> Option<PathBuf> {
        let dir = self.profile_dir(profile)?;
        let modern = dir.join("Network/Cookies");
        if modern.exists() {
            return Some(modern);
        }
        let legacy = dir.join("Cookies");
        if legacy.exists() {
            Some(legacy)
        } else {
            None
        }
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let Some(root) = self.user_data_dir() else {
            return Vec::new();
        };
        let Ok(entries) = fs::read_dir(&root) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name == "Default" || name.starts_with("Profile "))
            .collect()
    }
}

/// A discovered, installed browser (one row per profile found).
#[derive(Debug, Clone)]
pub struct BrowserInfo {
    pub kind: BrowserKind,
    pub profiles: Vec<String>,
}

/// Reads and decrypts cookies from a browser's on-disk store.
pub struct CookieVault;

impl CookieVault {
    pub fn new() -> Self {
        Self
    }

    /// Probe the well-known paths for every supported browser.
    pub fn list_browsers(&self) -> Vec<BrowserInfo> {
        BrowserKind::all()
            .iter()
            .filter_map(|&kind| {
                let profiles = kind.list_profiles();
                if profiles.is_empty() {
                    None
                } else {
                    Some(BrowserInfo { kind, profiles })
                }
            })
            .collect()
    }

    pub fn list_profiles(&self, browser: BrowserKind) -> Vec<String> {
        browser.list_profiles()
    }

    /// Extract the requested cookie names for `(browser, profile)`.
    ///
    /// Opens a snapshot copy of the SQLite database (the browser may hold
    /// an exclusive lock on the live file); fails with `StoreLocked` if even
    /// the snapshot copy cannot be made.
    pub fn extract(
        &self,
        browser: BrowserKind,
        profile: &str,
        required_names: &[&str],
    ) -> Result<HashMap<String, Cookie>> {
        let db_path = browser
            .cookies_db_path(profile)
            .ok_or(DynamiteError::StoreLocked)?;

        let snapshot_dir = tempfile_dir()?;
        let snapshot_path = snapshot_dir.join("Cookies");
        snapshot_copy(&db_path, &snapshot_path)?;

        let rows = read_cookie_rows(&snapshot_path, required_names)?;
        let selected = select_cookies(rows);
        let decryption_password = resolve_decryption_password(browser)?;

        let mut out = HashMap::new();
        for (name, row) in selected {
            let value = decrypt_row(&row, decryption_password.as_deref())?;
            out.insert(
                name.clone(),
                Cookie {
                    name,
                    value: sanitize(&value),
                    domain: row.host_key,
                    path: row.path,
                    secure: row.is_secure,
                    http_only: row.is_httponly,
                    expires_at: if row.expires_utc > 0 {
                        Some(chrome_epoch_to_unix(row.expires_utc))
                    } else {
                        None
                    },
                },
            );
        }

        for name in required_names {
            if !out.contains_key(*name) {
                return Err(DynamiteError::MissingRequiredCookie(name.to_string()));
            }
        }

        Ok(out)
    }
}

impl Default for CookieVault {
    fn default() -> Self {
        Self::new()
    }
}

struct CookieRow {
    name: String,
    host_key: String,
    path: String,
    expires_utc: i64,
    is_secure: bool,
    is_httponly: bool,
    encrypted_value: Vec<u8>,
    plaintext_value: String,
}

fn tempfile_dir() -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("dynamite-cookies-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Copy the cookie DB (and its `-wal`/`-shm` sidecars, if present) to a
/// scratch location so we never read the browser's live, possibly-locked
/// file directly.
fn snapshot_copy(source: &Path, dest: &Path) -> Result<()> {
    fs::copy(source, dest).map_err(|_| DynamiteError::StoreLocked)?;
    for ext in ["-wal", "-shm"] {
        let sidecar = append_ext(source, ext);
        if sidecar.exists() {
            let _ = fs::copy(&sidecar, append_ext(dest, ext));
        }
    }
    Ok(())
}

fn append_ext(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

fn read_cookie_rows(db_path: &Path, names: &[&str]) -> Result<Vec<CookieRow>> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let placeholders = names.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT name, host_key, path, expires_utc, is_secure, is_httponly, \
                encrypted_value, value \
         FROM cookies WHERE name IN ({placeholders})"
    );
    let mut stmt = conn.prepare(&sql)?;
    let params = rusqlite::params_from_iter(names.iter());
    let rows = stmt.query_map(params, |row| {
        Ok(CookieRow {
            name: row.get(0)?,
            host_key: row.get(1)?,
            path: row.get(2)?,
            expires_utc: row.get(3)?,
            is_secure: row.get::<_, i64>(4)? != 0,
            is_httponly: row.get::<_, i64>(5)? != 0,
            encrypted_value: row.get(6)?,
            plaintext_value: row.get(7)?,
        })
    })?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(DynamiteError::from)
}

/// Domain-selection rule (spec §4.1): when multiple rows match a cookie
/// name, prefer `.google.com`, except for `OSID` where `chat.google.com` wins.
fn select_cookies(rows: Vec<CookieRow>) -> HashMap<String, CookieRow> {
    let mut best: HashMap<String, CookieRow> = HashMap::new();
    for row in rows {
        let preferred_domain = if row.name == "OSID" {
            "chat.google.com"
        } else {
            ".google.com"
        };
        match best.get(&row.name) {
            Some(existing) if existing.host_key == preferred_domain => continue,
            _ => {
                if row.host_key == preferred_domain || !best.contains_key(&row.name) {
                    best.insert(row.name.clone(), row);
                }
            }
        }
    }
    best
}

fn resolve_decryption_password(browser: BrowserKind) -> Result<Option<String>> {
    let _ = browser;
    #[cfg(target_os = "macos")]
    {
        return Ok(Some(crypto::macos_keychain_password()?));
    }
    #[cfg(target_os = "linux")]
    {
        return Ok(Some(constants::LINUX_CHROMIUM_PASSWORD.to_string()));
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Ok(None)
    }
}

fn decrypt_row(row: &CookieRow, password: Option<&str>) -> Result<String> {
    if row.encrypted_value.is_empty() {
        return Ok(row.plaintext_value.clone());
    }
    let Some((prefix, ciphertext)) = crypto::split_version_prefix(&row.encrypted_value) else {
        return Ok(row.plaintext_value.clone());
    };
    let password = password.ok_or_else(|| {
        DynamiteError::KeyUnavailable("no decryption password available on this platform".into())
    })?;
    let iterations = if prefix == b"v11" && cfg!(target_os = "macos") {
        constants::PBKDF2_ITERATIONS_MAC
    } else if cfg!(target_os = "macos") {
        constants::PBKDF2_ITERATIONS_MAC
    } else {
        constants::PBKDF2_ITERATIONS_LINUX
    };
    let key = crypto::derive_key(password.as_bytes(), iterations);
    crypto::decrypt_value(ciphertext, &key)
}

/// Chrome stores `expires_utc` as microseconds since 1601-01-01; convert to
/// Unix seconds.
fn chrome_epoch_to_unix(expires_utc: i64) -> i64 {
    const EPOCH_DELTA_SECS: i64 = 11_644_473_600;
    expires_utc / 1_000_000 - EPOCH_DELTA_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_is_case_insensitive() {
        assert_eq!(BrowserKind::from_name("chrome"), Some(BrowserKind::Chrome));
        assert_eq!(BrowserKind::from_name("BRAVE"), Some(BrowserKind::Brave));
        assert_eq!(BrowserKind::from_name("netscape"), None);
    }

    #[test]
    fn domain_selection_prefers_dot_google_except_osid() {
        let rows = vec![
            CookieRow {
                name: "SID".into(),
                host_key: "mail.google.com".into(),
                path: "/".into(),
                expires_utc: 0,
                is_secure: true,
                is_httponly: true,
                encrypted_value: vec![],
                plaintext_value: "wrong".into(),
            },
            CookieRow {
                name: "SID".into(),
                host_key: ".google.com".into(),
                path: "/".into(),
                expires_utc: 0,
                is_secure: true,
                is_httponly: true,
                encrypted_value: vec![],
                plaintext_value: "right".into(),
            },
            CookieRow {
                name: "OSID".into(),
                host_key: ".google.com".into(),
                path: "/".into(),
                expires_utc: 0,
                is_secure: true,
                is_httponly: true,
                encrypted_value: vec![],
                plaintext_value: "wrong-osid".into(),
            },
            CookieRow {
                name: "OSID".into(),
                host_key: "chat.google.com".into(),
                path: "/".into(),
                expires_utc: 0,
                is_secure: true,
                is_httponly: true,
                encrypted_value: vec![],
                plaintext_value: "right-osid".into(),
            },
        ];

        let selected = select_cookies(rows);
        assert_eq!(selected["SID"].plaintext_value, "right");
        assert_eq!(selected["OSID"].plaintext_value, "right-osid");
    }

    #[test]
    fn chrome_epoch_converts_to_unix() {
        // 2024-01-01T00:00:00Z in Chrome's microseconds-since-1601 epoch.
        let chrome_us = 13_349_844_000_000_000i64;
        let unix = chrome_epoch_to_unix(chrome_us);
        assert!((1_704_000_000..1_704_100_000).contains(&unix));
    }
}
