// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Typed entities of spec §3, serialized to stable JSON by the Gateway
//! (never PBLite — that's an upstream wire detail the client hides).

use serde::{Deserialize, Serialize};

/// `Space(id)` | `Dm(id)`. Space ids carry a distinguishing prefix (`space/`)
/// documented in spec §6; dm ids are otherwise opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum GroupId {
    Space(String),
    Dm(String),
}

impl GroupId {
    pub const SPACE_PREFIX: &'static str = "space/";

    /// Classify a raw wire id by its prefix.
    pub fn from_raw(raw: &str) -> Self {
        if raw.starts_with(Self::SPACE_PREFIX) || raw.starts_with("spc") {
            GroupId::Space(raw.to_string())
        } else {
            GroupId::Dm(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GroupId::Space(id) | GroupId::Dm(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserRef {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
            avatar_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlMeta {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub topic_id: String,
    pub group_id: String,
    pub text: String,
    /// Microsecond Unix timestamp.
    pub timestamp: i64,
    pub sender: UserRef,
    pub is_thread_reply: bool,
    #[serde(default)]
    pub mentions: Vec<UserRef>,
    #[serde(default)]
    pub urls: Vec<UrlMeta>,
    #[serde(default)]
    pub images: Vec<ImageMeta>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

/// Invariant: `replies` is ordered by timestamp ascending; `replies[0]` is
/// the topic root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub topic_id: String,
    pub group_id: String,
    /// Microsecond Unix timestamp; monotonically non-decreasing across
    /// server pages delivered newest-first.
    pub sort_time: i64,
    pub replies: Vec<Message>,
    pub reply_count: u32,
    pub has_more_replies: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Active,
    Inactive,
    Unknown,
    SharingDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DndState {
    Unknown,
    Available,
    Dnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub user_id: String,
    pub state: PresenceState,
    pub dnd: DndState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_until: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldItemType {
    Space,
    Dm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    DirectMention,
    SubscribedThread,
    SubscribedSpace,
    DirectMessage,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: WorldItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub notification_category: NotificationCategory,
    pub unread_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribed_thread_id: Option<String>,
}

/// Exactly the triple the server requires to resume a pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_time_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_cursor: Option<String>,
    /// Fixed across an entire pagination; echoed unchanged on every page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_timestamp: Option<String>,
}
