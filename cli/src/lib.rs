// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Operator CLI library — exposes testable components of the `agentkernel`
//! binary.

pub mod commands;
pub mod config;
