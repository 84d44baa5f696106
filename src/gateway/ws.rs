// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! WebSocket fan-out: every Event Bus event is serialized and written,
//! non-blocking, to every connected client (spec §4.10).

use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::constants;
use crate::gateway::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<WsMessage>(64);
    let client_id = Uuid::new_v4();

    state.ws_clients.lock().await.insert(client_id, tx.clone());

    let subscription = state.events.subscribe(move |event| {
        if let Ok(text) = serde_json::to_string(event) {
            // Non-blocking: a full channel means this client is slow and
            // only slows itself, never the publishing WebChannel task.
            let _ = tx.try_send(WsMessage::Text(text));
        }
    });

    let mut missed_pongs: u32 = 0;
    let mut heartbeat = tokio::time::interval(Duration::from_secs(state.config.ws_heartbeat_secs));
    heartbeat.tick().await; // first tick fires immediately; consume it

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if missed_pongs >= constants::WS_MAX_MISSED_PONGS {
                    debug!(%client_id, "dropping ws client after missed heartbeats");
                    break;
                }
                if sink.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break;
                }
                missed_pongs += 1;
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Some(msg) => {
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(WsMessage::Pong(_))) => missed_pongs = 0,
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    subscription.unsubscribe();
    state.ws_clients.lock().await.remove(&client_id);
}
