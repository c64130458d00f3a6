// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use crate::domain::ids::TaskId;
use crate::domain::runtime::{RuntimeOutputEvent, ToolCallRequest};

use super::auth::check_bearer;
use super::CallbackState;

/// `POST /internal/runs/{runId}/tool-call`. `404` for an unknown `runId`;
/// a `runId` mismatch inside the request body itself is caught by the
/// adapter and surfaces as `{ok:false, error:"Run mismatch ..."}`, not a
/// transport-level error.
pub async fn tool_call(
    State(state): State<Arc<CallbackState>>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ToolCallRequest>,
) -> impl IntoResponse {
    if check_bearer(&headers, &state.internal_token).is_err() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Ok(run_id) = Uuid::parse_str(&run_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let run_id = TaskId::from(run_id);

    let Some(adapter) = state.adapters.get(run_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let result = adapter.invoke_tool(request).await;
    Json(result).into_response()
}

/// `POST /internal/runs/{runId}/output`. Always `204`; an unknown `runId`
/// is a silent drop, not an error, since the sandbox that emitted it has
/// no use for a failure response on a fire-and-forget log line.
pub async fn output(
    State(state): State<Arc<CallbackState>>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
    Json(event): Json<RuntimeOutputEvent>,
) -> impl IntoResponse {
    if check_bearer(&headers, &state.internal_token).is_err() {
        return StatusCode::UNAUTHORIZED;
    }

    if let Ok(run_id) = Uuid::parse_str(&run_id) {
        let run_id = TaskId::from(run_id);
        if let Some(adapter) = state.adapters.get(run_id) {
            adapter.emit_output(event).await;
        }
    }

    StatusCode::NO_CONTENT
}
