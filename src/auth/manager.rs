// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Auth Manager: holds the persisted `AuthState` and drives the
//! `Empty → CookiesOnly → Authenticated → Stale → Authenticated` state
//! machine described in spec §4.2.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::cookie::Cookie;
use super::vault::CookieVault;
use crate::config::Config;
use crate::constants;
use crate::error::{DynamiteError, Result};

/// Persisted authentication material; every other component reads a
/// read-only snapshot (`AuthState` is `Clone`, never mutated in place by
/// callers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthState {
    pub cookies: HashMap<String, String>,
    pub xsrf_token: String,
    pub cached_at: i64,
}

impl AuthState {
    fn empty() -> Self {
        Self {
            cookies: HashMap::new(),
            xsrf_token: String::new(),
            cached_at: 0,
        }
    }

    pub fn is_stale(&self) -> bool {
        now_unix() - self.cached_at >= constants::XSRF_TOKEN_TTL_SECS
    }

    pub fn sapisid(&self) -> Option<&str> {
        constants::SAPISID_COOKIE_NAMES
            .iter()
            .find_map(|name| self.cookies.get(*name))
            .map(String::as_str)
    }

    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidateScope {
    Xsrf,
    Cookies,
    All,
}

pub struct AuthManager {
    config: Config,
    vault: CookieVault,
    http: reqwest::Client,
    state: Arc<RwLock<AuthState>>,
}

impl AuthManager {
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.bootstrap_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let state = load_cached_state(&config.cached_auth_path()).unwrap_or_else(AuthState::empty);
        Ok(Self {
            config,
            vault: CookieVault::new(),
            http,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Returns the current `AuthState`, refreshing cookies and/or the xsrf
    /// token as needed. `forceRefresh` always re-scrapes.
    #[tracing::instrument(skip(self))]
    pub async fn authenticate(&self, force_refresh: bool) -> Result<AuthState> {
        let needs_refresh = {
            let state = self.state.read().await;
            force_refresh || state.xsrf_token.is_empty() || state.is_stale()
        };

        if !needs_refresh {
            return Ok(self.state.read().await.clone());
        }

        // spec §7: on `NotLoggedIn`, re-extract cookies and retry once
        // before surfacing the error — a stale cookie snapshot looks
        // identical to an actually-signed-out session until we refresh it.
        let mut cookies = self.extract_cookies()?;
        let xsrf_token = match self.refresh_xsrf(&cookies).await {
            Ok(token) => token,
            Err(DynamiteError::NotLoggedIn) => {
                warn!("bootstrap reported signed-out session, retrying once after re-extracting cookies");
                self.invalidate(InvalidateScope::Cookies).await;
                cookies = self.extract_cookies()?;
                self.refresh_xsrf(&cookies).await?
            }
            Err(e) => return Err(e),
        };

        let mut next = AuthState {
            cookies: cookies
                .into_iter()
                .map(|(name, cookie)| (name, cookie.value))
                .collect(),
            xsrf_token,
            cached_at: now_unix(),
        };

        {
            let mut guard = self.state.write().await;
            std::mem::swap(&mut *guard, &mut next);
        }
        let snapshot = self.state.read().await.clone();
        persist_state(&self.config.cached_auth_path(), &snapshot)?;
        Ok(snapshot)
    }

    fn extract_cookies(&self) -> Result<HashMap<String, Cookie>> {
        let profile = self.config.profile.as_deref().unwrap_or("Default");
        self.vault
            .extract(self.config.browser, profile, constants::REQUIRED_COOKIE_NAMES)
    }

    /// Scrape `window.WIZ_global_data = {...};` off the bootstrap page and
    /// pull `SMqcke` (the xsrf token) out of it.
    pub async fn refresh_xsrf(&self, cookies: &HashMap<String, Cookie>) -> Result<String> {
        let cookie_header = cookies
            .values()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        let mut resp = self
            .http
            .get(&self.config.bootstrap_url)
            .header(reqwest::header::COOKIE, &cookie_header)
            .query(&[
                ("origin", constants::BOOTSTRAP_ORIGIN_PARAM),
                ("shell", constants::BOOTSTRAP_SHELL_PARAM),
                ("hl", constants::BOOTSTRAP_HL_PARAM),
                ("hs", constants::BOOTSTRAP_HS_PARAM),
            ])
            .send()
            .await?;

        // Manual single-redirect follow, per spec §4.2.
        if resp.status().is_redirection() {
            if let Some(location) = resp.headers().get(reqwest::header::LOCATION).cloned() {
                let url = location.to_str().unwrap_or_default().to_string();
                resp = self
                    .http
                    .get(&url)
                    .header(reqwest::header::COOKIE, &cookie_header)
                    .send()
                    .await?;
            }
        }

        let body = resp.text().await?;
        let wiz = extract_wiz_global_data(&body).ok_or(DynamiteError::BootstrapUnavailable)?;

        if wiz.get("qwAQke").and_then(|v| v.as_str()) == Some("AccountsSignInUi") {
            return Err(DynamiteError::NotLoggedIn);
        }

        wiz.get("SMqcke")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or(DynamiteError::BootstrapUnavailable)
    }

    pub async fn invalidate(&self, scope: InvalidateScope) {
        let mut state = self.state.write().await;
        match scope {
            InvalidateScope::Xsrf => state.xsrf_token.clear(),
            InvalidateScope::Cookies => state.cookies.clear(),
            InvalidateScope::All => *state = AuthState::empty(),
        }
    }

    /// Background refresh loop: every `interval_min` minutes, invalidate
    /// everything and re-authenticate, swallowing errors (the caller keeps
    /// whatever state was last good).
    pub async fn watch_loop(self: Arc<Self>, interval_min: u64) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_min * 60));
        loop {
            ticker.tick().await;
            self.invalidate(InvalidateScope::All).await;
            match self.authenticate(true).await {
                Ok(_) => info!("auth manager watch loop refreshed auth state"),
                Err(e) => warn!(error = %e, "auth manager watch loop refresh failed"),
            }
        }
    }
}

fn extract_wiz_global_data(body: &str) -> Option<serde_json::Value> {
    const MARKER: &str = "window.WIZ_global_data = ";
    let start = body.find(MARKER)? + MARKER.len();
    let rest = &body[start..];
    let end = rest.find(";</script>").or_else(|| rest.find(";\n"))?;
    let json_text = &rest[..end];
    serde_json::from_str(json_text).ok()
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn load_cached_state(path: &Path) -> Option<AuthState> {
    let data = std::fs::read(path).ok()?;
    serde_json::from_slice(&data).ok()
}

/// Atomic write: serialize to a temp file in the same directory, then
/// rename over the target.
fn persist_state(path: &Path, state: &AuthState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(state)?;
    std::fs::write(&tmp_path, body)?;
    std::fs::rename(&tmp_path, path)?;
    debug!(path = %path.display(), "persisted auth state");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_smqcke_from_wiz_global_data() {
        let body = r#"<html><script>window.WIZ_global_data = {"SMqcke":"tok_abc123","other":1};</script></html>"#;
        let wiz = extract_wiz_global_data(body).unwrap();
        assert_eq!(wiz.get("SMqcke").unwrap().as_str().unwrap(), "tok_abc123");
    }

    #[test]
    fn missing_marker_yields_none() {
        assert!(extract_wiz_global_data("<html>nothing here</html>").is_none());
    }

    #[test]
    fn sign_in_sentinel_is_detected() {
        let body = r#"window.WIZ_global_data = {"qwAQke":"AccountsSignInUi"};</script>"#;
        let wiz = extract_wiz_global_data(body).unwrap();
        assert_eq!(wiz.get("qwAQke").unwrap().as_str().unwrap(), "AccountsSignInUi");
    }

    #[test]
    fn state_is_stale_after_ttl() {
        let mut state = AuthState::empty();
        state.xsrf_token = "tok".into();
        state.cached_at = now_unix() - constants::XSRF_TOKEN_TTL_SECS - 1;
        assert!(state.is_stale());
    }

    #[test]
    fn persist_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached_auth.json");
        let mut state = AuthState::empty();
        state.xsrf_token = "tok".into();
        state.cookies.insert("SID".into(), "abc".into());
        persist_state(&path, &state).unwrap();
        let reloaded = load_cached_state(&path).unwrap();
        assert_eq!(reloaded.xsrf_token, "tok");
        assert_eq!(reloaded.cookies.get("SID").unwrap(), "abc");
    }
}
