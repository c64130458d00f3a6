// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `taskId -> RuntimeAdapter` map, shared between the Scheduler (which
//! registers/removes entries around a dispatch) and the internal HTTP
//! callback surface (which looks an entry up per incoming request). An
//! unknown `runId` here is exactly the 404 case in §6.

use std::sync::Arc;

use dashmap::DashMap;

use crate::domain::ids::TaskId;
use crate::domain::runtime::RuntimeAdapter;

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: DashMap<TaskId, Arc<dyn RuntimeAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, task_id: TaskId, adapter: Arc<dyn RuntimeAdapter>) {
        self.adapters.insert(task_id, adapter);
    }

    pub fn get(&self, task_id: TaskId) -> Option<Arc<dyn RuntimeAdapter>> {
        self.adapters.get(&task_id).map(|entry| entry.clone())
    }

    pub fn remove(&self, task_id: TaskId) {
        self.adapters.remove(&task_id);
    }
}
