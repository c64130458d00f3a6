// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `runtimeId -> Runtime` map. Read-mostly, like `ToolRegistry` (§5).
//! The kernel itself only ever registers `docker`; test doubles (`inline`,
//! `slow`, ...) are registered externally by whoever boots the kernel for
//! a test run.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::runtime::Runtime;

#[derive(Default)]
pub struct RuntimeRegistry {
    runtimes: RwLock<HashMap<String, Arc<dyn Runtime>>>,
}

impl RuntimeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, runtime_id: impl Into<String>, runtime: Arc<dyn Runtime>) {
        self.runtimes
            .write()
            .expect("runtime registry lock poisoned")
            .insert(runtime_id.into(), runtime);
    }

    pub fn get(&self, runtime_id: &str) -> Option<Arc<dyn Runtime>> {
        self.runtimes
            .read()
            .expect("runtime registry lock poisoned")
            .get(runtime_id)
            .cloned()
    }
}
