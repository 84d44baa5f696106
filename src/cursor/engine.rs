// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Cursor Engine: drives paginated `list_topics` across a group, enforcing
//! time bounds and supporting resume (spec §4.6).
//!
//! The accumulation rules (de-dup, since-boundary detection) are a pure
//! [`PaginationAccumulator`] so they're testable without a live transport;
//! [`CursorEngine`] wraps it in the actual network-driving stream.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::constants;
use crate::domain::entities::{Cursor, Topic};
use crate::domain::mapper::{self, RPC_LIST_TOPICS};
use crate::error::{DynamiteError, Result};
use crate::rpc::RpcTransport;
use crate::wire;

#[derive(Debug, Clone)]
pub struct ListTopicsParams {
    pub group_id: String,
    pub page_size: u32,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub cursors: Option<Cursor>,
    pub max_pages: Option<u32>,
}

impl ListTopicsParams {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            page_size: constants::DEFAULT_PAGE_SIZE,
            since: None,
            until: None,
            cursors: None,
            max_pages: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub topics: Vec<Topic>,
    pub next_cursors: Cursor,
    pub reached_since_boundary: bool,
    pub contains_first_topic: bool,
    pub contains_last_topic: bool,
}

/// A persisted resume point: the cursor triple plus the group it belongs
/// to. Resuming with a cursor from a different group is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCursor {
    pub group_id: String,
    pub cursor: Cursor,
}

impl PersistedCursor {
    pub fn validate_group(&self, expected_group_id: &str) -> Result<()> {
        if self.group_id != expected_group_id {
            return Err(DynamiteError::CursorGroupMismatch {
                expected: expected_group_id.to_string(),
                found: self.group_id.clone(),
            });
        }
        Ok(())
    }
}

/// Pure fold step: applies topicId de-dup and the since-boundary check to
/// one freshly-decoded page.
pub struct PaginationAccumulator {
    seen_topic_ids: HashSet<String>,
}

impl PaginationAccumulator {
    pub fn new() -> Self {
        Self {
            seen_topic_ids: HashSet::new(),
        }
    }

    pub fn accumulate(
        &mut self,
        topics: Vec<Topic>,
        next_cursors: Cursor,
        contains_first_topic: bool,
        contains_last_topic: bool,
        since: Option<i64>,
    ) -> Page {
        let deduped: Vec<Topic> = topics
            .into_iter()
            .filter(|t| self.seen_topic_ids.insert(t.topic_id.clone()))
            .collect();

        let newest_sort_time = deduped.iter().map(|t| t.sort_time).max();
        let reached_since_boundary = match (since, newest_sort_time) {
            (Some(since), Some(newest)) => newest < since,
            _ => false,
        };

        Page {
            topics: deduped,
            next_cursors,
            reached_since_boundary,
            contains_first_topic,
            contains_last_topic,
        }
    }
}

impl Default for PaginationAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Any of these, once true on a page, ends the pagination (spec §4.6).
pub fn is_terminal(page: &Page) -> bool {
    page.contains_first_topic || page.reached_since_boundary
}

pub struct CursorEngine {
    transport: Arc<RpcTransport>,
}

impl CursorEngine {
    pub fn new(transport: Arc<RpcTransport>) -> Self {
        Self { transport }
    }

    /// Drive the pagination as a lazy stream of pages; dropping the stream
    /// mid-iteration is a clean cancellation — pages already yielded stand
    /// as the partial result (spec §5).
    pub fn list_topics(
        &self,
        params: ListTopicsParams,
    ) -> impl Stream<Item = Result<Page>> + '_ {
        let page_size = params.page_size.min(constants::MAX_PAGE_SIZE);
        let state = StreamState {
            accumulator: PaginationAccumulator::new(),
            cursors: params.cursors,
            group_id: params.group_id,
            since: params.since,
            until: params.until,
            page_size,
            max_pages: params.max_pages,
            pages_emitted: 0,
            done: false,
        };

        stream::unfold(state, move |mut state| async move {
            if state.done {
                return None;
            }
            if let Some(max) = state.max_pages {
                if state.pages_emitted >= max {
                    return None;
                }
            }

            let body = self.build_request(&state);
            let result = self.transport.call_json("list_topics", body).await;

            let entry = match result {
                Ok(entries) => match entries.into_iter().next() {
                    Some(e) => e,
                    None => {
                        return Some((
                            Err(DynamiteError::SchemaMismatch {
                                rpc_id: RPC_LIST_TOPICS.to_string(),
                                detail: "empty list_topics response".to_string(),
                            }),
                            state,
                        ))
                    }
                },
                Err(e) => return Some((Err(e), state)),
            };

            let decoded = match mapper::decode_topics_page(&entry) {
                Ok(d) => d,
                Err(e) => return Some((Err(e), state)),
            };
            let next_cursors = mapper::decode_cursors(&entry);

            let page = state.accumulator.accumulate(
                decoded.topics,
                next_cursors.clone(),
                decoded.contains_first_topic,
                decoded.contains_last_topic,
                state.since,
            );

            state.pages_emitted += 1;
            state.cursors = Some(next_cursors);
            state.done = is_terminal(&page);

            Some((Ok(page), state))
        })
    }

    fn build_request(&self, state: &StreamState) -> serde_json::Value {
        let cursors = state.cursors.clone().unwrap_or_default();
        json!([
            wire::request_header(),
            state.group_id,
            state.page_size,
            state.since,
            state.until,
            cursors.sort_time_cursor,
            cursors.timestamp_cursor,
            cursors.anchor_timestamp,
        ])
    }
}

struct StreamState {
    accumulator: PaginationAccumulator,
    cursors: Option<Cursor>,
    group_id: String,
    since: Option<i64>,
    until: Option<i64>,
    page_size: u32,
    max_pages: Option<u32>,
    pages_emitted: u32,
    done: bool,
}
