// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The internal HTTP callback surface (§6): two endpoints a remote sandbox
//! uses to reach back into the kernel, bearer-authenticated with the
//! shared internal token. Everything here is a thin translation layer;
//! the actual logic lives on whichever `TaskRuntimeAdapter` the scheduler
//! registered for the run.

mod auth;
mod callbacks;

use std::sync::Arc;

use axum::routing::post;
use axum::Router;

pub use auth::AuthError;

use crate::infrastructure::runtime::AdapterRegistry;

pub struct CallbackState {
    pub adapters: Arc<AdapterRegistry>,
    pub internal_token: String,
}

pub fn router(adapters: Arc<AdapterRegistry>, internal_token: String) -> Router {
    let state = Arc::new(CallbackState { adapters, internal_token });

    Router::new()
        .route(
            "/internal/runs/{run_id}/tool-call",
            post(callbacks::tool_call),
        )
        .route("/internal/runs/{run_id}/output", post(callbacks::output))
        .with_state(state)
}
