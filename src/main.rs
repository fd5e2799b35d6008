// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use machine_e2e::{
    constants::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS},
    context::Context,
    crd::MachineDeployment,
    manifest::{load_machine_deployment, parse_parameters},
    poll::PollSettings,
    scenarios::{verify_create_and_delete, verify_create_update_and_delete},
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};

/// Scenario to run against the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Create, roll to a new template, scale to zero, delete
    CreateUpdateDelete,
    /// Create and delete without updates
    CreateDelete,
}

/// Verify MachineDeployment lifecycles against a Kubernetes control plane
#[derive(Debug, Parser)]
#[command(name = "machine-e2e", version, about)]
struct Cli {
    /// Kubeconfig of the cluster under test; falls back to in-cluster config
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// MachineDeployment manifest template
    #[arg(long)]
    manifest: PathBuf,

    /// Placeholder substitution, `<placeholder>=<value>` (repeatable)
    #[arg(long = "param", value_name = "PLACEHOLDER=VALUE")]
    params: Vec<String>,

    /// Deadline for each wait, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Interval between polls, in seconds
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval: u64,

    /// Scenario to run
    #[arg(long, value_enum, default_value_t = Scenario::CreateUpdateDelete)]
    scenario: Scenario,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("machine-e2e")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Format: timestamp file:line LEVEL message
    // Respects RUST_LOG (default info) and RUST_LOG_FORMAT=json|text
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    debug!(?cli, "Parsed command line");

    let poll = PollSettings {
        interval: Duration::from_secs(cli.poll_interval),
        timeout: Duration::from_secs(cli.timeout),
    };
    let md = load_manifest(&cli).await?;
    let ctx = Context::from_kubeconfig(cli.kubeconfig.as_deref(), poll)
        .await
        .context("failed to build Kubernetes client")?;

    info!(scenario = ?cli.scenario, timeout = ?poll.timeout, "Starting scenario");
    let result = match cli.scenario {
        Scenario::CreateUpdateDelete => verify_create_update_and_delete(&ctx, md).await,
        Scenario::CreateDelete => verify_create_and_delete(&ctx, md).await,
    };

    match result {
        Ok(()) => {
            info!(scenario = ?cli.scenario, "Scenario passed");
            Ok(())
        }
        Err(e) => {
            error!(scenario = ?cli.scenario, error = %e, "Scenario failed");
            Err(anyhow::Error::from(e).context(format!("scenario {:?} failed", cli.scenario)))
        }
    }
}

/// Render and decode the manifest named on the command line.
async fn load_manifest(cli: &Cli) -> Result<MachineDeployment> {
    let params = parse_parameters(&cli.params).context("invalid --param")?;
    load_machine_deployment(&cli.manifest, &params)
        .await
        .with_context(|| format!("failed to load manifest {}", cli.manifest.display()))
}
