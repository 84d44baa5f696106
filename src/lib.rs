// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! dynamite: an unofficial client and local gateway for a consumer chat
//! service's reverse-engineered wire protocol — PBLite over an
//! XSSI-guarded envelope, cookie + CSRF authentication, and a
//! long-polling streaming channel ("WebChannel").
//!
//! The crate is organized as the pipeline a request actually travels:
//! [`auth`] produces a session, [`wire`] encodes/decodes its bytes,
//! [`rpc`] sends them, [`domain`] gives the response a type, [`cursor`]
//! and [`expander`] turn single calls into complete histories,
//! [`webchannel`] and [`eventbus`] carry live updates, and [`gateway`]
//! exposes all of it over HTTP and WebSocket.

pub mod auth;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod domain;
pub mod error;
pub mod eventbus;
pub mod expander;
pub mod export;
pub mod gateway;
pub mod rpc;
pub mod webchannel;
pub mod wire;

pub use config::Config;
pub use error::{DynamiteError, Result};
