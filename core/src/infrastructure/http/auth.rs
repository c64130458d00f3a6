// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

pub struct AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

/// Checks the `Authorization: Bearer <token>` header against the kernel's
/// internal token. No event is recorded for a rejected callback.
pub fn check_bearer(headers: &HeaderMap, expected: &str) -> Result<(), AuthError> {
    let header = headers.get(axum::http::header::AUTHORIZATION).ok_or(AuthError)?;
    let value = header.to_str().map_err(|_| AuthError)?;
    let token = value.strip_prefix("Bearer ").ok_or(AuthError)?;
    if token == expected {
        Ok(())
    } else {
        Err(AuthError)
    }
}
