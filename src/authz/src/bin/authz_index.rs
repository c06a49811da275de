//! # Policy Index CLI
//!
//! Builds the policy indexes from a JSON edge fixture and answers access
//! checks against them.
//!
//! ## Commands
//!
//! - `check --namespace <ns> --permission <p> <group>...` - exit 0 on allow,
//!   1 on deny, 2 when the namespace is unknown
//! - `stats` - per-namespace generation and counts
//!
//! ## Configuration
//!
//! - `--config` - TOML file with `IndexConfig` values
//! - `AUTHZ_BUILD_TIMEOUT_MS`, `AUTHZ_MAX_PARALLEL_BUILDS` - overrides
//! - `RUST_LOG` - log filter (default: info)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use iam_authz::{AccessDecider, AuthzError, IndexConfig, InMemoryEdgeSource, PolicyIndexManager};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Authorization policy index CLI
#[derive(Parser)]
#[command(name = "authz-index")]
#[command(about = "Build per-namespace policy indexes and answer access checks")]
#[command(version)]
struct Cli {
    /// JSON edge fixture
    #[arg(short, long, env = "AUTHZ_EDGES")]
    edges: PathBuf,

    /// TOML configuration file
    #[arg(short, long, env = "AUTHZ_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether any of the groups holds a permission
    Check {
        /// Namespace to check in
        #[arg(short, long)]
        namespace: String,

        /// Permission to check
        #[arg(short, long)]
        permission: String,

        /// Candidate groups, checked in order
        #[arg(required = true)]
        groups: Vec<String>,
    },

    /// Show per-namespace index statistics
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},iam_authz={}", log_level, log_level).into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(3)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => IndexConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => IndexConfig::default(),
    }
    .apply_env_overrides()
    .context("invalid configuration override")?;

    let source = InMemoryEdgeSource::from_json_file(&cli.edges)
        .with_context(|| format!("failed to load edges from {}", cli.edges.display()))?;

    let manager = Arc::new(PolicyIndexManager::new(Arc::new(source), config));
    manager
        .initialize()
        .await
        .context("policy store failed to initialize")?;

    info!(namespaces = manager.namespaces().len(), "Policy indexes ready");

    match cli.command {
        Command::Check { namespace, permission, groups } => {
            let decider = AccessDecider::new(Arc::clone(&manager));
            match decider.decide(&namespace, &groups, &permission) {
                Ok(decision) if decision.allowed => {
                    println!(
                        "ALLOW {} via group {}",
                        permission,
                        decision.matched_group.unwrap_or_default()
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Ok(_) => {
                    println!("DENY {}", permission);
                    Ok(ExitCode::from(1))
                }
                Err(AuthzError::NamespaceNotFound(ns)) => {
                    println!("DENY {} (unknown namespace '{}')", permission, ns);
                    Ok(ExitCode::from(2))
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::Stats => {
            for namespace in manager.namespaces() {
                let index = manager.get(&namespace)?;
                let stats = index.stats();
                println!(
                    "{}\tgeneration={}\tgroups={}\troles={}\tpermissions={}\tedges={}",
                    namespace,
                    index.generation(),
                    stats.groups,
                    stats.roles,
                    stats.permissions,
                    stats.group_role_edges + stats.role_permission_edges,
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
