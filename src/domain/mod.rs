// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Domain Mapper: typed entities plus the PBLite ↔ entity translation
//! table (spec §4.5).

pub mod entities;
pub mod mapper;

pub use entities::{
    AttachmentRef, Cursor, DndState, GroupId, ImageMeta, Message, NotificationCategory, Presence,
    PresenceState, Topic, UrlMeta, UserRef, WorldItem, WorldItemType,
};
pub use mapper::{
    decode_cursors, decode_message, decode_presence, decode_presence_page, decode_topics_page,
    decode_whoami, decode_world_item, decode_world_page, looks_like_message_heuristic,
    RPC_APPEND_REPLY, RPC_CREATE_TOPIC, RPC_GET_PRESENCE, RPC_LIST_WORLD, RPC_WHOAMI, TopicsPage,
};
