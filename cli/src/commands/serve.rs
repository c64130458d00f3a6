// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `agentkernel serve`: boots the kernel — runs migrations, wires every
//! repository/application component, reconciles rows orphaned by an
//! unclean restart, and serves the internal runtime callback surface
//! until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use agentkernel_core::application::{
    ApprovalCoordinator, ControlPlane, CredentialResolver, EventPublisher, PolicyEngine,
    TaskScheduler, ToolMediator, ToolRegistry,
};
use agentkernel_core::domain::repository::{
    create_anonymous_session_repository, create_approval_repository, create_credential_repository,
    create_policy_repository, create_task_event_repository, create_task_repository,
    create_tool_source_repository, StorageBackend,
};
use agentkernel_core::infrastructure::event_bus::EventBus;
use agentkernel_core::infrastructure::http;
use agentkernel_core::infrastructure::runtime::{AdapterRegistry, DockerRuntime, RuntimeRegistry};
use agentkernel_core::infrastructure::Database;

use crate::config::KernelConfig;

pub async fn run(config_path: PathBuf) -> Result<()> {
    let config = KernelConfig::load(&config_path)?;

    let database = Database::new(&config.database_url)
        .await
        .context("failed to connect to database")?;
    database.migrate().await.context("failed to run migrations")?;
    let pool = database.get_pool().clone();
    let backend = StorageBackend::PostgreSQL(agentkernel_core::domain::repository::PostgresConfig {
        connection_string: config.database_url.clone(),
    });

    let tasks = create_task_repository(&backend, pool.clone());
    let approvals_repo = create_approval_repository(&backend, pool.clone());
    let policies = create_policy_repository(&backend, pool.clone());
    let credentials = create_credential_repository(&backend, pool.clone());
    let _tool_sources = create_tool_source_repository(&backend, pool.clone());
    let task_events = create_task_event_repository(&backend, pool.clone());
    let anonymous_sessions = create_anonymous_session_repository(&backend, pool.clone());

    let reconciled = tasks
        .fail_all_running("kernel restarted while task was running")
        .await
        .context("boot-time reconciliation sweep failed")?;
    if reconciled > 0 {
        info!(count = reconciled, "marked running tasks failed after restart");
    }

    let event_bus = EventBus::new();
    let events = Arc::new(EventPublisher::new(task_events.clone(), event_bus.clone()));

    let tool_registry = ToolRegistry::new();
    let policy_engine = Arc::new(PolicyEngine::new(policies));
    let credential_resolver = Arc::new(CredentialResolver::new(credentials));
    let approval_coordinator = Arc::new(ApprovalCoordinator::new(approvals_repo.clone(), events.clone()));
    let tool_mediator = Arc::new(ToolMediator::new(
        tool_registry,
        policy_engine,
        credential_resolver,
        approval_coordinator.clone(),
        events.clone(),
    ));

    let runtime_registry = RuntimeRegistry::new();
    let docker_runtime = DockerRuntime::connect(
        config.docker_image.clone(),
        config.callback_public_url.clone(),
        config.internal_token.clone(),
        config.docker_network_mode.clone(),
        config.docker_autopull,
    )
    .context("failed to connect to Docker")?;
    runtime_registry.register("docker", Arc::new(docker_runtime));

    let adapter_registry = AdapterRegistry::new();
    let scheduler = TaskScheduler::new(
        tasks.clone(),
        events.clone(),
        runtime_registry,
        adapter_registry.clone(),
        tool_mediator,
        approval_coordinator.clone(),
    );

    let scheduler_for_shutdown = scheduler.clone();
    let _control_plane = Arc::new(ControlPlane::new(
        tasks,
        approvals_repo,
        task_events,
        anonymous_sessions,
        event_bus,
        scheduler,
        approval_coordinator,
    ));

    if let Some(metrics_addr) = &config.metrics_addr {
        let addr: SocketAddr = metrics_addr.parse().context("invalid metrics_addr")?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "metrics listener started");
    }

    let callback_addr: SocketAddr = config.callback_addr.parse().context("invalid callback_addr")?;
    let listener = TcpListener::bind(callback_addr)
        .await
        .with_context(|| format!("failed to bind callback listener on {callback_addr}"))?;
    info!(addr = %callback_addr, "internal runtime callback listener started");

    let app = http::router(adapter_registry, config.internal_token.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("callback listener failed")?;

    info!("kernel shutting down");
    scheduler_for_shutdown
        .shutdown()
        .await
        .context("scheduler shutdown sweep failed")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
