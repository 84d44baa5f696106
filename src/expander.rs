// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Thread Expander: bounded-parallelism full-reply fetching for topics
//! whose page came back with `hasMoreReplies` (spec §4.7).
//!
//! Bounded parallelism is a `Semaphore` sized to `P` guarding a
//! `FuturesUnordered` of per-topic fetches — I/O-bound network calls, not
//! CPU work, so a `rayon` pool would be the wrong tool here.

use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::domain::entities::Topic;
use crate::domain::mapper;
use crate::rpc::RpcTransport;
use crate::wire;

/// `list_messages`, the per-topic full-reply-fetch RPC. Not in the
/// captured scenario fixtures but dispatched through the same JSON-protobuf
/// endpoint and decoded with the same message table entry as `list_topics`.
pub const RPC_LIST_MESSAGES: &str = "dfe.t.lm";

pub struct ThreadExpander {
    transport: Arc<RpcTransport>,
    parallelism: usize,
}

impl ThreadExpander {
    pub fn new(transport: Arc<RpcTransport>, parallelism: usize) -> Self {
        Self {
            transport,
            parallelism: parallelism.max(1),
        }
    }

    /// Expand every topic with `has_more_replies` in place, preserving the
    /// input order. A single topic's expansion failure is logged and its
    /// truncated replies are kept — never fatal to the batch.
    pub async fn expand(&self, topics: Vec<Topic>) -> Vec<Topic> {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut pending = FuturesUnordered::new();

        for (index, topic) in topics.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let transport = self.transport.clone();
            pending.push(async move {
                if !topic.has_more_replies {
                    return (index, topic);
                }
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("semaphore is never closed while expand() is running");
                match fetch_full_replies(&transport, &topic).await {
                    Ok(replies) => {
                        let reply_count = replies.len() as u32;
                        (
                            index,
                            Topic {
                                replies,
                                reply_count,
                                has_more_replies: false,
                                ..topic
                            },
                        )
                    }
                    Err(e) => {
                        warn!(
                            topic_id = %topic.topic_id,
                            error = %e,
                            "thread expansion failed, keeping truncated replies"
                        );
                        (index, topic)
                    }
                }
            });
        }

        let mut results: Vec<Option<Topic>> = Vec::new();
        while let Some((index, topic)) = pending.next().await {
            if results.len() <= index {
                results.resize_with(index + 1, || None);
            }
            results[index] = Some(topic);
        }

        results.into_iter().flatten().collect()
    }
}

async fn fetch_full_replies(
    transport: &RpcTransport,
    topic: &Topic,
) -> crate::error::Result<Vec<crate::domain::entities::Message>> {
    fetch_thread_replies(transport, &topic.topic_id, &topic.group_id).await
}

/// Fetch every reply of a single thread directly, without going through a
/// `Topic`'s `has_more_replies` flag. Used by the Gateway's single-thread
/// route, which always wants the full reply set.
pub async fn fetch_thread_replies(
    transport: &RpcTransport,
    topic_id: &str,
    group_id: &str,
) -> crate::error::Result<Vec<crate::domain::entities::Message>> {
    let body = json!([wire::request_header(), topic_id, group_id]);
    let entries = transport.call_json("list_messages", body).await?;
    let entry = entries.first().ok_or_else(|| crate::error::DynamiteError::SchemaMismatch {
        rpc_id: RPC_LIST_MESSAGES.to_string(),
        detail: "empty list_messages response".to_string(),
    })?;

    let message_values = entry.payload.as_array().ok_or_else(|| crate::error::DynamiteError::SchemaMismatch {
        rpc_id: RPC_LIST_MESSAGES.to_string(),
        detail: "list_messages payload is not an array".to_string(),
    })?;

    Ok(message_values
        .iter()
        .filter_map(|m| mapper::decode_message(m, topic_id, group_id).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(id: &str, has_more: bool) -> Topic {
        Topic {
            topic_id: id.to_string(),
            group_id: "spcX".to_string(),
            sort_time: 0,
            replies: vec![],
            reply_count: 0,
            has_more_replies: has_more,
        }
    }

    #[test]
    fn topics_without_more_replies_need_no_fetch() {
        let t = topic("T1", false);
        assert!(!t.has_more_replies);
    }

    /// Regression guard for the mapper→expander wiring (spec §4.7): the
    /// expander's only eligibility gate is `Topic::has_more_replies`, so a
    /// mapper that hardcodes this to `false` silently turns expansion into
    /// dead code for every real topic. This decodes a realistic truncated
    /// `list_topics` page through the actual mapper and asserts the result
    /// is the kind of topic `expand()`'s guard is supposed to act on —
    /// not a hand-built `Topic` that could mask the regression.
    #[test]
    fn topic_decoded_from_a_truncated_page_is_not_short_circuited_by_the_expand_guard() {
        const TRUNCATED_PAGE_BODY: &str = r#")]}'
[["dfe.t.lt",[[[null,"topic_A",[["spcX"]]],"1705000000000000",null,null,null,null,[[[null,"msg_1"],[["u1"],"Alice"],"1705000000000000",null,null,null,null,null,null,"hello",[]]],3,true]],null,null,true,false]]"#;

        let entries = crate::wire::envelope::parse_json_endpoint(TRUNCATED_PAGE_BODY).unwrap();
        let page = mapper::decode_topics_page(&entries[0]).unwrap();
        let topic = page.topics.into_iter().next().unwrap();

        assert_eq!(topic.replies.len(), 1);
        assert_eq!(topic.reply_count, 3);
        // This is exactly `expand()`'s early-return condition (line 52);
        // it must be false for a truncated topic or expansion never runs.
        assert!(!(!topic.has_more_replies));
    }

    #[tokio::test]
    async fn result_ordering_matches_input_regardless_of_completion_order() {
        // With no topics needing expansion, expand() is a pure passthrough
        // that must still preserve input order.
        let transport_config = crate::config::Config::new(
            Some(std::env::temp_dir()),
            crate::auth::vault::BrowserKind::Chrome,
            None,
        );
        let auth = Arc::new(
            crate::auth::manager::AuthManager::new(transport_config.clone()).unwrap(),
        );
        let transport = Arc::new(RpcTransport::new(transport_config, auth).unwrap());
        let expander = ThreadExpander::new(transport, 5);

        let topics = vec![topic("T3", false), topic("T1", false), topic("T2", false)];
        let expanded = expander.expand(topics).await;
        let ids: Vec<&str> = expanded.iter().map(|t| t.topic_id.as_str()).collect();
        assert_eq!(ids, vec!["T3", "T1", "T2"]);
    }
}
