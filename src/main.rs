// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use k6_environment::config::Config;
use k6_environment::kubernetes::workload::TestOutcome;
use k6_environment::wait::{WaitCondition, WaitOptions};
use k6_environment::Environment;

/// k6-env - throwaway virtual clusters for k6 load tests
#[derive(Parser, Debug)]
#[command(name = "k6-env")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// The environment a command operates on
#[derive(Args, Debug)]
struct Target {
    /// Environment name, also the name of its cluster context
    name: String,

    /// Folder holding the environment's manifests and test
    init_folder: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision the environment and apply its manifests
    Create {
        #[command(flatten)]
        target: Target,
    },
    /// Apply a manifest file
    Apply {
        #[command(flatten)]
        target: Target,
        file: PathBuf,
    },
    /// Wait for a JSON condition, e.g. '{"kind":"Job","name":"t1","namespace":"default","reason":"Completed"}'
    Wait {
        #[command(flatten)]
        target: Target,
        condition: String,
        /// Polling overrides, e.g. '{"interval":"5s","timeout":"10m"}'
        options: Option<String>,
    },
    /// Start the test and wait for it to end
    Run {
        #[command(flatten)]
        target: Target,
        #[arg(default_value_t = TestOutcome::Finished)]
        criteria: TestOutcome,
    },
    /// Tear the environment down
    Delete {
        #[command(flatten)]
        target: Target,
    },
}

impl Command {
    fn target(&self) -> &Target {
        match self {
            Command::Create { target }
            | Command::Apply { target, .. }
            | Command::Wait { target, .. }
            | Command::Run { target, .. }
            | Command::Delete { target } => target,
        }
    }
}

fn wait_condition(condition: &str, options: Option<&str>) -> Result<WaitCondition> {
    let condition = WaitCondition::parse(&serde_json::from_str(condition)?)?;
    match options {
        Some(raw) => {
            let options = WaitOptions::parse(&serde_json::from_str(raw)?)?;
            Ok(condition.with_time_params(options.interval, options.timeout))
        }
        None => Ok(condition),
    }
}

impl Cli {
    async fn run(self) -> Result<()> {
        let target = self.command.target();
        let config = Config::from_env()?;
        let env = Environment::from_folder(&target.name, &target.init_folder, &config)
            .with_context(|| format!("Failed to load environment from {}", target.init_folder.display()))?;
        info!("{}", env.describe());
        let name = target.name.clone();

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });

        match self.command {
            Command::Create { .. } => {
                let mut env = env;
                env.create().await?;
            }
            Command::Apply { file, .. } => {
                let applied = env.attach().apply(&file).await?;
                info!("Applied {} documents", applied);
            }
            Command::Wait { condition, options, .. } => {
                let condition = wait_condition(&condition, options.as_deref())?;
                env.attach().wait(&condition, &cancel).await?;
            }
            Command::Run { criteria, .. } => {
                env.attach().with_criteria(criteria).run_test(&cancel).await?;
            }
            Command::Delete { .. } => {
                env.attach().delete().await?;
            }
        }

        info!("{} done", name);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    Cli::parse().run().await
}
