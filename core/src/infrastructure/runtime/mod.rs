// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod adapter;
pub mod adapter_registry;
pub mod docker_runtime;
pub mod registry;
pub mod script_runtime;

pub use adapter::TaskRuntimeAdapter;
pub use adapter_registry::AdapterRegistry;
pub use docker_runtime::DockerRuntime;
pub use registry::RuntimeRegistry;
pub use script_runtime::ScriptRuntime;
