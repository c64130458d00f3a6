// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # agentkernel
//!
//! The operator CLI for the agent code executor kernel. `agentkernel serve`
//! boots the kernel itself; the remaining subcommands are read-only
//! inspection over the Store, since mutating a pending approval or a live
//! task requires coordinating with whichever process has the kernel's
//! in-memory state, not something a short-lived CLI invocation can do.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "agentkernel")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AGENTKERNEL_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the kernel: migrations, dispatch loop, internal callback listener.
    Serve {
        #[arg(short, long, env = "AGENTKERNEL_CONFIG_PATH", default_value = "agentkernel.yaml")]
        config: PathBuf,
    },
    /// List tasks in a workspace.
    Tasks {
        #[arg(long, env = "AGENTKERNEL_DATABASE_URL")]
        database_url: String,
        #[arg(long)]
        workspace_id: Uuid,
        #[arg(long, default_value_t = 500)]
        limit: i64,
    },
    /// Show a single task's status and output.
    Task {
        #[arg(long, env = "AGENTKERNEL_DATABASE_URL")]
        database_url: String,
        #[arg(long)]
        workspace_id: Uuid,
        task_id: Uuid,
    },
    /// List pending approvals in a workspace.
    Approvals {
        #[arg(long, env = "AGENTKERNEL_DATABASE_URL")]
        database_url: String,
        #[arg(long)]
        workspace_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Serve { config } => commands::serve::run(config).await,
        Commands::Tasks { database_url, workspace_id, limit } => {
            commands::task::list(&database_url, workspace_id, limit).await
        }
        Commands::Task { database_url, workspace_id, task_id } => {
            commands::task::get(&database_url, task_id, workspace_id).await
        }
        Commands::Approvals { database_url, workspace_id } => {
            commands::approval::list_pending(&database_url, workspace_id).await
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
