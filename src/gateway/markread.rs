// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Mark-as-read queue: dedupe-by-groupId, single-consumer, 100ms-spaced
//! dispatch (spec §4.10, §8 scenario 5).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Mutex, Notify};
use tracing::warn;

use crate::domain::entities::GroupId;
use crate::rpc::RpcTransport;
use crate::wire;

const MARK_READ_RPC_ID: &str = "dfe.m.mr";

struct Pending {
    order: VecDeque<GroupId>,
    unread_counts: HashMap<GroupId, u32>,
}

/// Enqueue deduplicates by `groupId`, keeping the latest `unreadCount` and
/// moving that entry to the back of the dispatch order — the RPCs actually
/// sent are the unique-by-groupId suffix of the enqueue sequence.
pub struct MarkReadQueue {
    pending: Mutex<Pending>,
    notify: Notify,
}

impl MarkReadQueue {
    pub fn spawn(transport: Arc<RpcTransport>, spacing: Duration) -> Arc<Self> {
        let queue = Arc::new(Self {
            pending: Mutex::new(Pending {
                order: VecDeque::new(),
                unread_counts: HashMap::new(),
            }),
            notify: Notify::new(),
        });

        let consumer = queue.clone();
        tokio::spawn(async move { consumer.run_consumer(transport, spacing).await });
        queue
    }

    pub async fn enqueue(&self, group_id: GroupId, unread_count: u32) {
        let mut pending = self.pending.lock().await;
        if pending.unread_counts.contains_key(&group_id) {
            pending.order.retain(|g| g != &group_id);
        }
        pending.order.push_back(group_id.clone());
        pending.unread_counts.insert(group_id, unread_count);
        drop(pending);
        self.notify.notify_one();
    }

    async fn run_consumer(&self, transport: Arc<RpcTransport>, spacing: Duration) {
        loop {
            let next = {
                let mut pending = self.pending.lock().await;
                pending.order.pop_front()
            };

            let Some(group_id) = next else {
                self.notify.notified().await;
                continue;
            };

            let unread_count = {
                let mut pending = self.pending.lock().await;
                pending.unread_counts.remove(&group_id)
            };

            if let Some(unread_count) = unread_count {
                if let Err(e) = dispatch(&transport, &group_id, unread_count).await {
                    warn!(group_id = %group_id.as_str(), error = %e, "mark-as-read dispatch failed, dropping");
                }
            }

            tokio::time::sleep(spacing).await;
        }
    }
}

async fn dispatch(transport: &RpcTransport, group_id: &GroupId, unread_count: u32) -> crate::error::Result<()> {
    let body = json!([wire::request_header(), group_id.as_str(), unread_count]);
    transport.call_batch(MARK_READ_RPC_ID, body).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spec §8 scenario 5, checking the pure dedupe-and-reorder logic
    /// without a live transport: enqueue (g1,3),(g2,1),(g1,5),(g3,2),(g1,7)
    /// must leave the pending order as [g2, g3, g1] with g1's unreadCount
    /// overwritten to 7.
    #[tokio::test]
    async fn dedupe_keeps_latest_value_and_moves_to_back() {
        let pending = Mutex::new(Pending {
            order: VecDeque::new(),
            unread_counts: HashMap::new(),
        });

        async fn enqueue(pending: &Mutex<Pending>, group_id: GroupId, unread_count: u32) {
            let mut p = pending.lock().await;
            if p.unread_counts.contains_key(&group_id) {
                p.order.retain(|g| g != &group_id);
            }
            p.order.push_back(group_id.clone());
            p.unread_counts.insert(group_id, unread_count);
        }

        let g1 = GroupId::Space("g1".into());
        let g2 = GroupId::Space("g2".into());
        let g3 = GroupId::Space("g3".into());

        enqueue(&pending, g1.clone(), 3).await;
        enqueue(&pending, g2.clone(), 1).await;
        enqueue(&pending, g1.clone(), 5).await;
        enqueue(&pending, g3.clone(), 2).await;
        enqueue(&pending, g1.clone(), 7).await;

        let p = pending.lock().await;
        let order: Vec<&GroupId> = p.order.iter().collect();
        assert_eq!(order, vec![&g2, &g3, &g1]);
        assert_eq!(p.unread_counts.len(), 3);
        assert_eq!(*p.unread_counts.get(&g1).unwrap(), 7);
        assert_eq!(*p.unread_counts.get(&g2).unwrap(), 1);
        assert_eq!(*p.unread_counts.get(&g3).unwrap(), 2);
    }
}
