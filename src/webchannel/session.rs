// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! WebChannel session: the long-poll state machine, event demultiplexer,
//! and the receive-loop/send-serializer split spec §9 calls for in place
//! of the source's coroutine-heavy long-poll loop (spec §4.8).

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::frame::{split_acked_events, FrameReader};
use crate::auth::manager::AuthManager;
use crate::config::Config;
use crate::constants;
use crate::domain::entities::GroupId;
use crate::domain::mapper;
use crate::error::{DynamiteError, Result};
use crate::eventbus::{Event, EventBus};
use crate::wire::pblite;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Connecting,
    Connected,
    BackoffReconnect,
}

/// Owned exclusively by the WebChannel component; created on handshake,
/// destroyed on disconnect or explicit close.
#[derive(Debug, Clone, Default)]
pub struct ChannelSession {
    pub sid: Option<String>,
    pub gsession_id: Option<String>,
    pub aid: u64,
    pub subscribed_groups: HashSet<GroupId>,
}

enum SendCommand {
    SubscribeToAll(Vec<GroupId>),
    Ping,
}

pub struct WebChannelClient {
    config: Config,
    auth: Arc<AuthManager>,
    http: reqwest::Client,
    events: EventBus,
    session: Mutex<ChannelSession>,
    send_tx: mpsc::Sender<SendCommand>,
    send_rx: Mutex<Option<mpsc::Receiver<SendCommand>>>,
}

impl WebChannelClient {
    pub fn new(config: Config, auth: Arc<AuthManager>, events: EventBus) -> Result<Arc<Self>> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.webchannel_frame_inactivity_secs,
            ))
            .build()?;
        let (send_tx, send_rx) = mpsc::channel(64);
        Ok(Arc::new(Self {
            config,
            auth,
            http,
            events,
            session: Mutex::new(ChannelSession::default()),
            send_tx,
            send_rx: Mutex::new(Some(send_rx)),
        }))
    }

    /// Idempotent: repeated calls with the same set leave
    /// `subscribedGroups` unchanged.
    pub async fn subscribe_to_all(&self, groups: Vec<GroupId>) -> Result<()> {
        self.send_tx
            .send(SendCommand::SubscribeToAll(groups))
            .await
            .map_err(|_| DynamiteError::Disconnected)
    }

    pub async fn send_ping(&self) -> Result<()> {
        self.send_tx
            .send(SendCommand::Ping)
            .await
            .map_err(|_| DynamiteError::Disconnected)
    }

    /// Drive the session until `cancel` fires: handshake, long-poll,
    /// reconnect-with-backoff on any disconnect. The receive loop and the
    /// send serializer run as two cooperating tasks sharing only the
    /// `ChannelSession` (guarded by `self.session`) and the send queue.
    #[tracing::instrument(skip_all)]
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let mut send_rx = self
            .send_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| DynamiteError::Other("webchannel session already running".into()))?;

        let send_serializer = tokio::spawn({
            let this = self.clone();
            let cancel = cancel.clone();
            async move { this.run_send_serializer(&mut send_rx, cancel).await }
        });

        let mut backoff = Backoff::new();
        let mut state = SessionState::Init;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            state = SessionState::Connecting;
            match self.handshake_and_stream(&cancel).await {
                Ok(()) => {
                    backoff.reset();
                    if cancel.is_cancelled() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "webchannel disconnected");
                    self.events.publish(Event::Disconnect);
                    state = SessionState::BackoffReconnect;
                    let delay = backoff.next_delay();
                    debug!(?delay, "webchannel reconnecting after backoff");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
            }
        }

        let _ = state;
        send_serializer.abort();
        Ok(())
    }

    async fn handshake_and_stream(&self, cancel: &CancellationToken) -> Result<()> {
        let auth_state = self.auth.authenticate(false).await?;
        let handshake_body = self.http.post(self.bind_url()).body("count=0").send().await?;
        let handshake_text = handshake_body.text().await?;

        let mut reader = FrameReader::new();
        reader.push(handshake_text.as_bytes());
        let handshake_frame = reader
            .try_next_frame()?
            .ok_or(DynamiteError::BootstrapUnavailable)?;

        {
            let mut session = self.session.lock().await;
            session.sid = pblite::field(&handshake_frame, 1)
                .and_then(Value::as_str)
                .map(str::to_string);
            session.gsession_id = pblite::field(&handshake_frame, 2)
                .and_then(Value::as_str)
                .map(str::to_string);
        }

        let resp = self
            .http
            .get(self.bind_url())
            .header(reqwest::header::COOKIE, auth_state.cookie_header())
            .send()
            .await?;
        let mut byte_stream = resp.bytes_stream();
        let mut frame_reader = FrameReader::new();
        let mut marked_connected = false;

        loop {
            let next_chunk = tokio::time::timeout(
                std::time::Duration::from_secs(constants::WEBCHANNEL_FRAME_INACTIVITY_SECS),
                byte_stream.next(),
            )
            .await
            .map_err(|_| DynamiteError::Disconnected)?;

            let Some(chunk) = next_chunk else {
                return Err(DynamiteError::Disconnected);
            };
            let chunk = chunk?;
            frame_reader.push(&chunk);

            while let Some(frame) = frame_reader.try_next_frame()? {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                if !marked_connected {
                    marked_connected = true;
                    self.events.publish(Event::Connect);
                }
                self.process_frame(&frame).await;
            }
        }
    }

    async fn process_frame(&self, frame: &Value) {
        for acked in split_acked_events(frame) {
            {
                let mut session = self.session.lock().await;
                session.aid = session.aid.max(acked.ack_id);
            }
            if let Some(event) = demux_event(&acked.payload) {
                self.events.publish(event);
            }
        }
    }

    async fn run_send_serializer(
        &self,
        send_rx: &mut mpsc::Receiver<SendCommand>,
        cancel: CancellationToken,
    ) {
        loop {
            let command = tokio::select! {
                cmd = send_rx.recv() => cmd,
                _ = cancel.cancelled() => None,
            };
            let Some(command) = command else {
                return;
            };

            let aid = self.session.lock().await.aid;
            let result = match command {
                SendCommand::SubscribeToAll(groups) => self.do_subscribe(groups, aid).await,
                SendCommand::Ping => self.do_ping(aid).await,
            };
            if let Err(e) = result {
                warn!(error = %e, "webchannel send command failed");
                self.events.publish(Event::Error(e.to_string()));
            }
        }
    }

    async fn do_subscribe(&self, groups: Vec<GroupId>, aid: u64) -> Result<()> {
        let auth_state = self.auth.authenticate(false).await?;
        let body = json!({"aid": aid, "subscribe": groups.iter().map(GroupId::as_str).collect::<Vec<_>>()});
        self.http
            .post(self.bind_url())
            .header(reqwest::header::COOKIE, auth_state.cookie_header())
            .json(&body)
            .send()
            .await?;

        let mut session = self.session.lock().await;
        session.subscribed_groups.extend(groups);
        Ok(())
    }

    async fn do_ping(&self, aid: u64) -> Result<()> {
        let auth_state = self.auth.authenticate(false).await?;
        self.http
            .post(self.bind_url())
            .header(reqwest::header::COOKIE, auth_state.cookie_header())
            .json(&json!({"aid": aid, "ping": true}))
            .send()
            .await?;
        Ok(())
    }

    fn bind_url(&self) -> String {
        format!("{}/u/0/webchannel/bind", constants::SERVICE_ORIGIN)
    }

    pub async fn subscribed_groups(&self) -> HashSet<GroupId> {
        self.session.lock().await.subscribed_groups.clone()
    }
}

/// Map one demultiplexed event payload (leading tag at field 1, body at
/// field 2) to a typed [`Event`]. Unrecognized tags are dropped, matching
/// the Domain Mapper's "unknown fields are never fatal" stance.
pub fn demux_event(payload: &Value) -> Option<Event> {
    let tag = pblite::field(payload, 1).and_then(Value::as_str)?;
    let body = pblite::field(payload, 2)?;

    match tag {
        "TYPING_STATE_CHANGED" => Some(Event::Typing {
            group_id: group_id_of(body)?,
            user_id: pblite::field(body, 2).and_then(Value::as_str)?.to_string(),
            is_typing: pblite::field(body, 3).and_then(Value::as_bool).unwrap_or(false),
        }),
        "READ_RECEIPT_CHANGED" => Some(Event::ReadReceipt {
            group_id: group_id_of(body)?,
            user_id: pblite::field(body, 2).and_then(Value::as_str)?.to_string(),
            read_timestamp: pblite::field(body, 3)
                .and_then(pblite::as_timestamp_micros)
                .unwrap_or(0),
        }),
        "GROUP_CHANGED" => Some(Event::GroupChanged {
            group_id: group_id_of(body)?,
        }),
        // No captured fixture exists for either push tag; both bodies are
        // routed through the Domain Mapper's message/presence decoders,
        // which is the only place this shape is known. Field 1 = groupId,
        // field 2 = the embedded message sub-message (same table
        // `decode_message` already uses), field 3 = topicId — mirroring
        // the identity-then-payload convention the mapped RPCs use.
        "MESSAGE_POSTED" => {
            let group_id = group_id_of(body)?;
            let topic_id = pblite::field(body, 3).and_then(Value::as_str).unwrap_or("");
            let message_value = pblite::field(body, 2)?;
            let message = mapper::decode_message(message_value, topic_id, group_id.as_str()).ok()?;
            Some(Event::Message(message))
        }
        // The presence push body is the same shape `decode_presence`
        // already decodes for the `get_presence` RPC response.
        "USER_STATUS_UPDATED" => {
            let presence = mapper::decode_presence(body).ok()?;
            Some(Event::UserStatus(presence))
        }
        _ => None,
    }
}

fn group_id_of(body: &Value) -> Option<GroupId> {
    pblite::field(body, 1)
        .and_then(Value::as_str)
        .map(GroupId::from_raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn demux_maps_typing_state_changed() {
        let payload = json!(["TYPING_STATE_CHANGED", ["spcX", "u1", true]]);
        let event = demux_event(&payload).unwrap();
        match event {
            Event::Typing { group_id, user_id, is_typing } => {
                assert_eq!(group_id, GroupId::Space("spcX".to_string()));
                assert_eq!(user_id, "u1");
                assert!(is_typing);
            }
            _ => panic!("expected Typing event"),
        }
    }

    #[test]
    fn demux_maps_read_receipt_changed() {
        let payload = json!(["READ_RECEIPT_CHANGED", ["dm1", "u2", 1705000000000000i64]]);
        let event = demux_event(&payload).unwrap();
        match event {
            Event::ReadReceipt { group_id, user_id, read_timestamp } => {
                assert_eq!(group_id, GroupId::Dm("dm1".to_string()));
                assert_eq!(user_id, "u2");
                assert_eq!(read_timestamp, 1705000000000000);
            }
            _ => panic!("expected ReadReceipt event"),
        }
    }

    #[test]
    fn demux_ignores_unknown_tags() {
        let payload = json!(["SOMETHING_NEW", []]);
        assert!(demux_event(&payload).is_none());
    }

    #[test]
    fn demux_maps_message_posted() {
        let message_value = json!([
            [null, "msg_1"],
            [["u1"], "Alice"],
            1705000000000000i64,
            null, null, null, null, null, null,
            "hello"
        ]);
        let payload = json!(["MESSAGE_POSTED", ["spcX", message_value, "topic_A"]]);

        let event = demux_event(&payload).unwrap();
        match event {
            Event::Message(message) => {
                assert_eq!(message.id, "msg_1");
                assert_eq!(message.group_id, "spcX");
                assert_eq!(message.topic_id, "topic_A");
                assert_eq!(message.text, "hello");
                assert_eq!(message.sender.display_name.as_deref(), Some("Alice"));
            }
            _ => panic!("expected Message event"),
        }
    }

    #[test]
    fn demux_maps_user_status_updated() {
        let payload = json!(["USER_STATUS_UPDATED", [[null, "u1"], 1, 2, null, "in a meeting"]]);

        let event = demux_event(&payload).unwrap();
        match event {
            Event::UserStatus(presence) => {
                assert_eq!(presence.user_id, "u1");
                assert!(matches!(presence.state, crate::domain::entities::PresenceState::Active));
                assert!(matches!(presence.dnd, crate::domain::entities::DndState::Dnd));
                assert_eq!(presence.custom_status.as_deref(), Some("in a meeting"));
            }
            _ => panic!("expected UserStatus event"),
        }
    }

    #[test]
    fn subscribe_to_all_twice_is_idempotent_over_the_set() {
        let mut groups: HashSet<GroupId> = HashSet::new();
        groups.extend(vec![GroupId::Space("a".into()), GroupId::Space("b".into())]);
        let before = groups.clone();
        groups.extend(vec![GroupId::Space("a".into()), GroupId::Space("b".into())]);
        assert_eq!(groups, before);
    }
}
