// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Authentication pipeline: cookie extraction, xsrf-token scraping, and the
//! cached `AuthState` that every other component reads a snapshot of.

pub mod cookie;
pub mod crypto;
pub mod manager;
pub mod vault;

pub use cookie::Cookie;
pub use manager::{AuthManager, AuthState, InvalidateScope};
pub use vault::{BrowserInfo, BrowserKind, CookieVault};
