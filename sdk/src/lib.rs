// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Client library for code running inside a dispatched task's sandbox.
//!
//! A task only ever needs two things from the kernel while it runs: a way
//! to invoke a tool and a way to stream output lines back. [`KernelClient`]
//! wraps the internal HTTP callback surface (`/internal/runs/{runId}/...`)
//! so a task's own code doesn't have to hand-roll bearer-authenticated
//! HTTP requests against it.

pub mod client;

pub use client::{KernelClient, KernelClientError};
pub use agentkernel_core::domain::runtime::{OutputStream, ToolCallRequest, ToolCallResult};
