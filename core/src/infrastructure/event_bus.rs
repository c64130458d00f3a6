// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Per-task Pub/Sub for Task Events
//
// Diverges from a single shared broadcast channel: each subscriber owns a
// bounded mpsc queue so one slow subscriber only ever drops its own
// messages, never another subscriber's. `Publish` never awaits — it
// `try_send`s and evicts subscribers whose queue is full.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::event::TaskEvent;
use crate::domain::ids::TaskId;

const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum SubscriberMessage {
    Event(TaskEvent),
    /// Sent once, immediately before the subscription is dropped, when the
    /// subscriber's queue could not keep up.
    Overflow,
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<SubscriberMessage>,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: DashMap<TaskId, Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a subscriber for `task_id`. Delivery order to this
    /// subscriber matches publish order; the subscription unsubscribes
    /// itself when dropped.
    pub fn subscribe(self: &Arc<Self>, task_id: TaskId) -> EventSubscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.entry(task_id).or_default().push(Subscriber { id, tx });
        EventSubscription {
            id,
            task_id,
            rx,
            bus: Arc::downgrade(self),
        }
    }

    /// Publishes `event` to every current subscriber of `task_id`. Never
    /// suspends. Callers must append to the durable log (§4.1) before
    /// calling this, so replay-then-subscribe never misses an event.
    pub fn publish(&self, task_id: TaskId, event: TaskEvent) {
        let Some(mut subs) = self.subscribers.get_mut(&task_id) else {
            return;
        };
        subs.retain(|sub| match sub.tx.try_send(SubscriberMessage::Event(event.clone())) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(task_id = %task_id, subscriber = sub.id, "event subscriber overflowed, dropping");
                let _ = sub.tx.try_send(SubscriberMessage::Overflow);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    fn unsubscribe(&self, task_id: TaskId, id: u64) {
        if let Some(mut subs) = self.subscribers.get_mut(&task_id) {
            subs.retain(|sub| sub.id != id);
        }
    }

    pub fn subscriber_count(&self, task_id: TaskId) -> usize {
        self.subscribers.get(&task_id).map(|subs| subs.len()).unwrap_or(0)
    }
}

pub struct EventSubscription {
    id: u64,
    task_id: TaskId,
    rx: mpsc::Receiver<SubscriberMessage>,
    bus: Weak<EventBus>,
}

impl EventSubscription {
    pub async fn recv(&mut self) -> Option<SubscriberMessage> {
        self.rx.recv().await
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.task_id, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::EventName;
    use chrono::Utc;

    fn event(task_id: TaskId, id: i64) -> TaskEvent {
        TaskEvent {
            id,
            task_id,
            event_name: EventName::Task,
            r#type: "task.queued".into(),
            payload: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let bus = EventBus::new();
        let task_id = TaskId::new();
        let mut sub = bus.subscribe(task_id);

        bus.publish(task_id, event(task_id, 1));
        bus.publish(task_id, event(task_id, 2));

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        let (SubscriberMessage::Event(a), SubscriberMessage::Event(b)) = (first, second) else {
            panic!("expected both messages to be events");
        };
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn publish_to_unknown_task_is_a_noop() {
        let bus = EventBus::new();
        bus.publish(TaskId::new(), event(TaskId::new(), 1));
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let bus = EventBus::new();
        let task_id = TaskId::new();
        let sub = bus.subscribe(task_id);
        assert_eq!(bus.subscriber_count(task_id), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(task_id), 0);
    }

    #[tokio::test]
    async fn overflow_signals_then_drops_subscriber() {
        let bus = EventBus::new();
        let task_id = TaskId::new();
        let mut sub = bus.subscribe(task_id);

        for i in 0..(SUBSCRIBER_QUEUE_CAPACITY as i64 + 2) {
            bus.publish(task_id, event(task_id, i));
        }

        let mut saw_overflow = false;
        while let Some(msg) = sub.recv().await {
            if matches!(msg, SubscriberMessage::Overflow) {
                saw_overflow = true;
                break;
            }
        }
        assert!(saw_overflow);
    }
}
