// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Event Bus: an in-process typed pub/sub for WebChannel events (spec §4.9).
//!
//! Delivery is synchronous in the publishing task. Listeners must not
//! block — the Gateway wraps its WebSocket writes in non-blocking sends so
//! a slow client only slows itself, never the WebChannel receive loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::domain::entities::{GroupId, Message, Presence};

/// One demultiplexed WebChannel occurrence, mapped from the wire's
/// `MESSAGE_POSTED` / `TYPING_STATE_CHANGED` / `READ_RECEIPT_CHANGED` /
/// `USER_STATUS_UPDATED` / `GROUP_CHANGED` tags.
///
/// Serializes adjacently-tagged as `{"type": ..., "event": ...}`, which is
/// exactly the shape the Gateway's WebSocket fan-out writes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "event", rename_all = "camelCase")]
pub enum Event {
    Connect,
    Disconnect,
    Message(Message),
    Typing { group_id: GroupId, user_id: String, is_typing: bool },
    ReadReceipt { group_id: GroupId, user_id: String, read_timestamp: i64 },
    UserStatus(Presence),
    GroupChanged { group_id: GroupId },
    Error(String),
}

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

struct Inner {
    listeners: Mutex<HashMap<u64, Listener>>,
    next_id: AtomicU64,
}

#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a listener; call `unsubscribe()` on the returned handle to
    /// stop receiving events (no implicit drop-based deregistration, to
    /// avoid surprising a caller that only meant to hold the handle).
    pub fn subscribe(&self, listener: impl Fn(&Event) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .expect("event bus listener lock poisoned")
            .insert(id, Arc::new(listener));
        Subscription {
            id,
            inner: self.inner.clone(),
        }
    }

    pub fn publish(&self, event: Event) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .expect("event bus listener lock poisoned")
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().expect("poisoned").len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Subscription {
    id: u64,
    inner: Arc<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.inner
            .listeners
            .lock()
            .expect("event bus listener lock poisoned")
            .remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn publish_delivers_to_all_subscribers_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        let _a = bus.subscribe(move |_| o1.lock().unwrap().push(1));
        let o2 = order.clone();
        let _b = bus.subscribe(move |_| o2.lock().unwrap().push(2));

        bus.publish(Event::Connect);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Event::Connect);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sub.unsubscribe();
        bus.publish(Event::Connect);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_count_reflects_subscriptions() {
        let bus = EventBus::new();
        assert_eq!(bus.listener_count(), 0);
        let sub = bus.subscribe(|_| {});
        assert_eq!(bus.listener_count(), 1);
        sub.unsubscribe();
        assert_eq!(bus.listener_count(), 0);
    }
}
