// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Domain Mapper: translates PBLite documents from known RPCs into the
//! typed entities of spec §3, and back. An append-only table of
//! `(rpcId, fieldPath) → entity field`, per spec §4.5 / §9. Unknown fields
//! are never fatal — they're dropped into a raw sidecar.

use serde_json::Value;

use super::entities::{
    Cursor, DndState, GroupId, Message, NotificationCategory, Presence, PresenceState, Topic,
    UserRef, WorldItem, WorldItemType,
};
use crate::error::{DynamiteError, Result};
use crate::wire::envelope::RpcEnvelopeEntry;
use crate::wire::pblite::{self, path};

/// The `list_topics` rpc id. Kept as a named constant rather than a string
/// literal scattered across call sites.
pub const RPC_LIST_TOPICS: &str = "dfe.t.lt";
/// Lists the world roster (spaces + dms) the bootstrap page itself is named
/// after (`/mole/world`) — used for both `/api/spaces`/`/api/dms` and
/// `/api/notifications`.
pub const RPC_LIST_WORLD: &str = "dfe.w.lw";
pub const RPC_GET_PRESENCE: &str = "dfe.p.gp";
pub const RPC_WHOAMI: &str = "dfe.u.gw";
pub const RPC_CREATE_TOPIC: &str = "dfe.t.ct";
pub const RPC_APPEND_REPLY: &str = "dfe.t.ar";

/// One page decoded from a `list_topics` response.
#[derive(Debug, Clone)]
pub struct TopicsPage {
    pub topics: Vec<Topic>,
    pub contains_first_topic: bool,
    pub contains_last_topic: bool,
}

fn schema_err(rpc_id: &str, detail: impl Into<String>) -> DynamiteError {
    DynamiteError::SchemaMismatch {
        rpc_id: rpc_id.to_string(),
        detail: detail.into(),
    }
}

/// Decode a `dfe.t.lt` (list_topics) response entry into typed topics.
///
/// Field table (1-based, relative to each topic sub-message):
/// 1 = identity `[_, topicId, [[groupId]]]`, 2 = sortTime, 7 = replies,
/// 8 = replyCount (server's total, may exceed `replies.len()` on a
/// truncated page), 9 = hasMoreReplies (explicit bool). When 9 is absent,
/// truncation is inferred from 8: `replies.len() < replyCount`.
/// Unknown/unmapped fields are simply never read — they round-trip only if
/// the caller keeps the original `Value` alongside (`raw sidecar`).
pub fn decode_topics_page(entry: &RpcEnvelopeEntry) -> Result<TopicsPage> {
    let payload_topics = entry
        .payload
        .as_array()
        .ok_or_else(|| schema_err(&entry.rpc_id, "list_topics payload is not an array"))?;

    let mut topics = Vec::with_capacity(payload_topics.len());
    for topic_value in payload_topics {
        match decode_topic(topic_value) {
            Ok(topic) => topics.push(topic),
            Err(e) => {
                tracing::warn!(rpc_id = %entry.rpc_id, error = %e, "skipping unmappable topic");
            }
        }
    }

    let contains_first_topic = entry
        .raw_field(5)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let contains_last_topic = entry
        .raw_field(6)
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(TopicsPage {
        topics,
        contains_first_topic,
        contains_last_topic,
    })
}

fn decode_topic(value: &Value) -> Result<Topic> {
    let topic_id = path(value, &[1, 2])
        .and_then(Value::as_str)
        .ok_or_else(|| schema_err(RPC_LIST_TOPICS, "missing topicId"))?
        .to_string();
    let group_id = path(value, &[1, 3, 1, 1])
        .and_then(Value::as_str)
        .map(|raw| GroupId::from_raw(raw).as_str().to_string())
        .ok_or_else(|| schema_err(RPC_LIST_TOPICS, "missing groupId"))?;
    let sort_time = pblite::field(value, 2)
        .and_then(pblite::as_timestamp_micros)
        .ok_or_else(|| schema_err(RPC_LIST_TOPICS, "missing sortTime"))?;

    let replies: Vec<Message> = pblite::field(value, 7)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|m| decode_message(m, &topic_id, &group_id).ok())
                .collect()
        })
        .unwrap_or_default();

    let wire_reply_count = pblite::field(value, 8).and_then(Value::as_u64).map(|n| n as u32);
    let has_more_replies = pblite::field(value, 9)
        .and_then(Value::as_bool)
        .unwrap_or_else(|| {
            wire_reply_count
                .map(|total| (replies.len() as u32) < total)
                .unwrap_or(false)
        });
    let reply_count = wire_reply_count.unwrap_or(replies.len() as u32);

    Ok(Topic {
        topic_id,
        group_id,
        sort_time,
        reply_count,
        has_more_replies,
        replies,
    })
}

/// Decode a single message sub-message. Field table: 1 = identity
/// `[_, id]`, 2 = sender `[[userId], displayName]`, 3 = timestamp,
/// 10 = text. Field 10 carrying a short string is also the heuristic
/// discriminator spec §4.5/§9 describes for unmapped RPCs that embed
/// messages; mapped RPCs (this one) use the table directly instead.
pub fn decode_message(value: &Value, topic_id: &str, group_id: &str) -> Result<Message> {
    let id = path(value, &[1, 2])
        .and_then(Value::as_str)
        .ok_or_else(|| schema_err(RPC_LIST_TOPICS, "missing message id"))?
        .to_string();

    let sender_id = path(value, &[2, 1, 1]).and_then(Value::as_str).unwrap_or("");
    let sender_name = path(value, &[2, 2]).and_then(Value::as_str);
    let sender = UserRef {
        id: sender_id.to_string(),
        display_name: sender_name.map(str::to_string),
        email: None,
        avatar_url: None,
    };

    let timestamp = pblite::field(value, 3)
        .and_then(pblite::as_timestamp_micros)
        .ok_or_else(|| schema_err(RPC_LIST_TOPICS, "missing message timestamp"))?;

    let text = pblite::field(value, 10)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    Ok(Message {
        id,
        topic_id: topic_id.to_string(),
        group_id: group_id.to_string(),
        text,
        timestamp,
        sender,
        is_thread_reply: false,
        mentions: Vec::new(),
        urls: Vec::new(),
        images: Vec::new(),
        attachments: Vec::new(),
    })
}

/// Decode the resumable cursor triple off a `list_topics` response's raw
/// entry (fields beyond the payload). The anchor is fixed across a whole
/// pagination; the other two advance per page.
pub fn decode_cursors(entry: &RpcEnvelopeEntry) -> Cursor {
    Cursor {
        sort_time_cursor: entry.raw_field(7).and_then(Value::as_str).map(str::to_string),
        timestamp_cursor: entry.raw_field(8).and_then(Value::as_str).map(str::to_string),
        anchor_timestamp: entry.raw_field(9).and_then(Value::as_str).map(str::to_string),
    }
}

/// Decode a `dfe.w.lw` (world roster) response entry into [`WorldItem`]s.
/// Field table: 1 = identity `[_, id]`, 2 = name, 3 = type (0=space,
/// 1=dm), 4 = notificationCategory, 5 = unreadCount, 6 = subscribed
/// thread id. No captured fixture exists for this rpc; the layout follows
/// the same identity-then-flat-fields convention `list_topics` uses.
pub fn decode_world_item(value: &Value) -> Result<WorldItem> {
    let id = path(value, &[1, 2])
        .and_then(Value::as_str)
        .ok_or_else(|| schema_err(RPC_LIST_WORLD, "missing id"))?
        .to_string();
    let name = pblite::field(value, 2).and_then(Value::as_str).map(str::to_string);
    let item_type = match pblite::field(value, 3).and_then(Value::as_i64) {
        Some(1) => WorldItemType::Dm,
        _ => WorldItemType::Space,
    };
    let notification_category = match pblite::field(value, 4).and_then(Value::as_i64) {
        Some(1) => NotificationCategory::DirectMention,
        Some(2) => NotificationCategory::SubscribedThread,
        Some(3) => NotificationCategory::SubscribedSpace,
        Some(4) => NotificationCategory::DirectMessage,
        _ => NotificationCategory::None,
    };
    let unread_count = pblite::field(value, 5).and_then(Value::as_u64).unwrap_or(0) as u32;
    let subscribed_thread_id = pblite::field(value, 6).and_then(Value::as_str).map(str::to_string);

    Ok(WorldItem {
        id,
        item_type,
        name,
        notification_category,
        unread_count,
        subscribed_thread_id,
    })
}

pub fn decode_world_page(entry: &RpcEnvelopeEntry) -> Result<Vec<WorldItem>> {
    let items = entry
        .payload
        .as_array()
        .ok_or_else(|| schema_err(&entry.rpc_id, "world roster payload is not an array"))?;
    Ok(items
        .iter()
        .filter_map(|v| decode_world_item(v).ok())
        .collect())
}

/// Decode a `dfe.p.gp` (presence batch) response entry. Field table:
/// 1 = identity `[_, userId]`, 2 = state, 3 = dnd, 4 = activeUntil,
/// 5 = customStatus.
pub fn decode_presence(value: &Value) -> Result<Presence> {
    let user_id = path(value, &[1, 2])
        .and_then(Value::as_str)
        .ok_or_else(|| schema_err(RPC_GET_PRESENCE, "missing userId"))?
        .to_string();
    let state = match pblite::field(value, 2).and_then(Value::as_i64) {
        Some(1) => PresenceState::Active,
        Some(2) => PresenceState::Inactive,
        Some(3) => PresenceState::SharingDisabled,
        _ => PresenceState::Unknown,
    };
    let dnd = match pblite::field(value, 3).and_then(Value::as_i64) {
        Some(1) => DndState::Available,
        Some(2) => DndState::Dnd,
        _ => DndState::Unknown,
    };
    let active_until = pblite::field(value, 4).and_then(pblite::as_timestamp_micros);
    let custom_status = pblite::field(value, 5).and_then(Value::as_str).map(str::to_string);

    Ok(Presence {
        user_id,
        state,
        dnd,
        active_until,
        custom_status,
    })
}

pub fn decode_presence_page(entry: &RpcEnvelopeEntry) -> Result<Vec<Presence>> {
    let items = entry
        .payload
        .as_array()
        .ok_or_else(|| schema_err(&entry.rpc_id, "presence payload is not an array"))?;
    Ok(items
        .iter()
        .filter_map(|v| decode_presence(v).ok())
        .collect())
}

/// Decode a `dfe.u.gw` (whoami) response entry into a [`UserRef`]. Same
/// identity-plus-name shape as a message's `sender` sub-message.
pub fn decode_whoami(entry: &RpcEnvelopeEntry) -> Result<UserRef> {
    let value = &entry.payload;
    let id = path(value, &[1, 2])
        .and_then(Value::as_str)
        .ok_or_else(|| schema_err(RPC_WHOAMI, "missing user id"))?
        .to_string();
    let display_name = pblite::field(value, 2).and_then(Value::as_str).map(str::to_string);
    let email = pblite::field(value, 3).and_then(Value::as_str).map(str::to_string);

    Ok(UserRef {
        id,
        display_name,
        email,
        avatar_url: None,
    })
}

/// Fallback discriminator for RPCs with no table entry: an array longer
/// than 15 whose field-10 position is a short string is heuristically a
/// message (spec §4.5, §9 — explicitly a last resort, fragile by design).
pub fn looks_like_message_heuristic(value: &Value) -> bool {
    let Some(arr) = value.as_array() else {
        return false;
    };
    if arr.len() <= 15 {
        return false;
    }
    matches!(arr.get(9), Some(Value::String(s)) if s.len() < 4096)
}
