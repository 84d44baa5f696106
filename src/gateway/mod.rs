// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Gateway: the local HTTP/WebSocket server that fronts the core for a
//! UI or script (spec §4.10).

pub mod markread;
pub mod proxy;
pub mod routes;
pub mod state;
pub mod ws;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::webchannel::WebChannelClient;
use state::AppState;

/// Build the shared state, start the WebChannel in the background, and
/// serve the HTTP surface until the process is signalled to stop.
#[tracing::instrument(skip(config), fields(addr = %config.gateway_bind_addr))]
pub async fn serve(config: Config) -> crate::error::Result<()> {
    let state = AppState::new(config.clone())?;

    let webchannel = WebChannelClient::new(config.clone(), state.auth.clone(), state.events.clone())?;
    let cancel = CancellationToken::new();
    let wc_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = webchannel.run(wc_cancel).await {
            error!(error = %e, "webchannel task exited");
        }
    });

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(&config.gateway_bind_addr).await?;
    info!(addr = %config.gateway_bind_addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            cancel.cancel();
        })
        .await?;

    Ok(())
}
