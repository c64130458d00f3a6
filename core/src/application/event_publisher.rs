// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Append-then-publish pairing (Design Notes §9: "event durability before
//! live delivery"). No producer in this crate is allowed to call
//! `EventBus::publish` directly; every durable event goes through here so
//! the store-assigned `id` is always attached before subscribers see it.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::event::{EventName, NewTaskEvent, TaskEvent};
use crate::domain::ids::TaskId;
use crate::domain::repository::{RepositoryError, TaskEventRepository};
use crate::infrastructure::event_bus::EventBus;

pub struct EventPublisher {
    events: Arc<dyn TaskEventRepository>,
    bus: Arc<EventBus>,
}

impl EventPublisher {
    pub fn new(events: Arc<dyn TaskEventRepository>, bus: Arc<EventBus>) -> Self {
        Self { events, bus }
    }

    pub async fn publish_task(
        &self,
        task_id: TaskId,
        r#type: &str,
        payload: Value,
    ) -> Result<TaskEvent, RepositoryError> {
        self.publish(task_id, EventName::Task, r#type, payload).await
    }

    pub async fn publish_approval(
        &self,
        task_id: TaskId,
        r#type: &str,
        payload: Value,
    ) -> Result<TaskEvent, RepositoryError> {
        self.publish(task_id, EventName::Approval, r#type, payload).await
    }

    async fn publish(
        &self,
        task_id: TaskId,
        event_name: EventName,
        r#type: &str,
        payload: Value,
    ) -> Result<TaskEvent, RepositoryError> {
        let stored = self
            .events
            .append(NewTaskEvent {
                task_id,
                event_name,
                r#type: r#type.to_string(),
                payload,
            })
            .await?;
        self.bus.publish(task_id, stored.clone());
        Ok(stored)
    }
}
