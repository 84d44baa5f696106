// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for the dynamite core.
//!
//! Every fallible operation in the crate returns this single enum. Callers
//! (the gateway's HTTP handlers, the export workflow) translate it into
//! their own presentation; the core itself never logs to stdout.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DynamiteError {
    #[error("cookie store is locked by a running browser")]
    StoreLocked,

    #[error("OS keychain access denied or unavailable: {0}")]
    KeyUnavailable(String),

    #[error("required cookie missing: {0}")]
    MissingRequiredCookie(String),

    #[error("not logged in (bootstrap page shows the sign-in UI)")]
    NotLoggedIn,

    #[error("xsrf token not found on bootstrap page")]
    BootstrapUnavailable,

    #[error("unauthorized after retry")]
    Unauthorized,

    #[error("rate limited{}", .retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("upstream server error: {0}")]
    ServerError(String),

    #[error("schema mismatch decoding {rpc_id}: {detail}")]
    SchemaMismatch { rpc_id: String, detail: String },

    #[error("webchannel disconnected")]
    Disconnected,

    #[error("operation cancelled")]
    Cancelled,

    #[error("resume cursor belongs to a different group: expected {expected}, got {found}")]
    CursorGroupMismatch { expected: String, found: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DynamiteError>;
