// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # agentkernel-core
//!
//! The kernel that schedules agent-submitted code, mediates every tool call
//! it makes against policy and credentials, and gates sensitive calls behind
//! human approval. There is no presentation layer here: [`application::ControlPlane`]
//! is the entire public surface, and the binaries in `cli`/`sdks` are thin
//! clients over it.
//!
//! ```text
//! application/    ← ControlPlane, TaskScheduler, ToolMediator, PolicyEngine, ...
//!     ↓
//! domain/         ← Task, Approval, AccessPolicy, RuntimeAdapter, repository traits
//!     ↑
//! infrastructure/ ← Postgres repos, the in-process event bus, Docker runtime, HTTP callbacks
//! ```
//!
//! `infrastructure` implements the traits `domain` declares and is wired
//! together by `application`; neither `domain` nor `application` depends on
//! `infrastructure` directly.

pub mod application;
pub mod domain;
pub mod infrastructure;
