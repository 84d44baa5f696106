// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Shared state threaded through every Gateway handler (spec §4.10).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message as WsMessage;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::auth::manager::AuthManager;
use crate::config::Config;
use crate::cursor::CursorEngine;
use crate::eventbus::EventBus;
use crate::expander::ThreadExpander;
use crate::gateway::markread::MarkReadQueue;
use crate::rpc::RpcTransport;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub auth: Arc<AuthManager>,
    pub transport: Arc<RpcTransport>,
    pub cursor_engine: Arc<CursorEngine>,
    pub expander: Arc<ThreadExpander>,
    pub events: EventBus,
    pub mark_read: Arc<MarkReadQueue>,
    pub ws_clients: Arc<Mutex<HashMap<Uuid, mpsc::Sender<WsMessage>>>>,
}

impl AppState {
    pub fn new(config: Config) -> crate::error::Result<Self> {
        let auth = Arc::new(AuthManager::new(config.clone())?);
        let transport = Arc::new(RpcTransport::new(config.clone(), auth.clone())?);
        let cursor_engine = Arc::new(CursorEngine::new(transport.clone()));
        let expander = Arc::new(ThreadExpander::new(
            transport.clone(),
            config.thread_expansion_parallelism,
        ));
        let events = EventBus::new();
        let mark_read = MarkReadQueue::spawn(
            transport.clone(),
            std::time::Duration::from_millis(config.mark_read_spacing_ms),
        );

        Ok(Self {
            config,
            auth,
            transport,
            cursor_engine,
            expander,
            events,
            mark_read,
            ws_clients: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}
