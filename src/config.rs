// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Process-wide configuration.
//!
//! Collapses what the upstream browser keeps as scattered global state
//! (browser choice, profile, custom cookie path, debug flag) into a single
//! record built once in `main` and threaded through every component
//! constructor (spec §9, "process-wide mutable configuration").

use std::path::PathBuf;

use crate::auth::vault::BrowserKind;
use crate::constants;

/// Immutable, process-lifetime configuration for every component.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub browser: BrowserKind,
    pub profile: Option<String>,
    pub gateway_bind_addr: String,
    pub bootstrap_url: String,
    pub http_timeout_secs: u64,
    pub webchannel_frame_inactivity_secs: u64,
    pub bootstrap_timeout_secs: u64,
    pub mark_read_spacing_ms: u64,
    pub ws_heartbeat_secs: u64,
    pub thread_expansion_parallelism: usize,
}

impl Config {
    /// Resolve the cache directory: explicit argument, then env var, then default.
    pub fn resolve_cache_dir(explicit: Option<PathBuf>) -> PathBuf {
        if let Some(dir) = explicit {
            return dir;
        }
        if let Ok(dir) = std::env::var(constants::CACHE_DIR_ENV) {
            return PathBuf::from(dir);
        }
        dirs::home_dir()
            .map(|home| home.join(constants::DEFAULT_CACHE_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_CACHE_DIR_NAME))
    }

    pub fn new(explicit_cache_dir: Option<PathBuf>, browser: BrowserKind, profile: Option<String>) -> Self {
        Self {
            cache_dir: Self::resolve_cache_dir(explicit_cache_dir),
            browser,
            profile,
            gateway_bind_addr: "127.0.0.1:8080".to_string(),
            bootstrap_url: constants::BOOTSTRAP_URL.to_string(),
            http_timeout_secs: constants::HTTP_TIMEOUT_SECS,
            webchannel_frame_inactivity_secs: constants::WEBCHANNEL_FRAME_INACTIVITY_SECS,
            bootstrap_timeout_secs: constants::BOOTSTRAP_TIMEOUT_SECS,
            mark_read_spacing_ms: constants::MARK_READ_SPACING_MS,
            ws_heartbeat_secs: constants::WS_HEARTBEAT_SECS,
            thread_expansion_parallelism: constants::DEFAULT_THREAD_EXPANSION_PARALLELISM,
        }
    }

    pub fn cached_auth_path(&self) -> PathBuf {
        self.cache_dir.join(constants::CACHED_AUTH_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_cache_dir_wins() {
        let explicit = PathBuf::from("/tmp/explicit-gchat");
        assert_eq!(Config::resolve_cache_dir(Some(explicit.clone())), explicit);
    }

    #[test]
    fn falls_back_to_home_dotdir_without_env() {
        std::env::remove_var(constants::CACHE_DIR_ENV);
        let dir = Config::resolve_cache_dir(None);
        assert!(dir.ends_with(constants::DEFAULT_CACHE_DIR_NAME));
    }
}
