// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Process entrypoint: initializes logging, builds the process-wide
//! `Config` from environment variables, and starts the Gateway.
//!
//! Argument parsing is an explicit Non-goal — external collaborators
//! (scripts, wrapper CLIs) drive this process through environment
//! variables and the Gateway's HTTP surface, not through flags.

use dynamite::auth::BrowserKind;
use dynamite::config::Config;
use dynamite::error::Result;
use dynamite::gateway;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = build_config();
    gateway::serve(config).await
}

fn build_config() -> Config {
    let browser = std::env::var("GCHAT_BROWSER")
        .ok()
        .and_then(|v| BrowserKind::from_name(&v))
        .unwrap_or(BrowserKind::Chrome);
    let profile = std::env::var("GCHAT_PROFILE").ok();

    let mut config = Config::new(None, browser, profile);
    if let Ok(addr) = std::env::var("GCHAT_GATEWAY_BIND_ADDR") {
        config.gateway_bind_addr = addr;
    }
    config
}
