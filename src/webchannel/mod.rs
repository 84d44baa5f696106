// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! WebChannel streaming subsystem: long-poll session, reconnect backoff,
//! and frame demultiplexing (spec §4.8).

pub mod backoff;
pub mod frame;
pub mod session;

pub use backoff::Backoff;
pub use frame::{AckedEvent, FrameReader};
pub use session::{demux_event, ChannelSession, SessionState, WebChannelClient};
