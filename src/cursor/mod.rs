// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Cursor Engine: paginated topic listing with resumable cursors (spec §4.6).

pub mod engine;

pub use engine::{is_terminal, CursorEngine, ListTopicsParams, Page, PaginationAccumulator, PersistedCursor};
