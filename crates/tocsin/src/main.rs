// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tocsin - incident engine over scheduler snapshot history.
//!
//! This is the binary entry point.

mod commands;
mod doctor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tocsin_config::TocsinConfig;

use crate::commands::{IncidentAction, ListArgs, SnapshotAction};

/// Tocsin - incident engine over scheduler snapshot history.
#[derive(Parser, Debug)]
#[command(name = "tocsin", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `storage.database_path`.
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or upgrade the database schema.
    Migrate,
    /// Run diagnostic checks against the configuration and database.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// List incidents.
    Incidents(ListArgs),
    /// Inspect or change a single incident.
    Incident {
        #[command(subcommand)]
        action: IncidentAction,
    },
    /// Record and query scheduler snapshots.
    Snapshots {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Evaluate an expression against a scheduler's snapshots.
    Eval {
        scheduler_id: String,
        expression: String,
    },
    /// Evaluate a rule once and apply the resulting incident transition.
    Reconcile {
        rule_id: String,
        scheduler_id: String,
        expression: String,
        /// Close the incident when the rule stops firing.
        #[arg(long)]
        auto_close: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => tocsin_config::load_and_validate_path(path),
        None => tocsin_config::load_and_validate(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tocsin_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    if let Some(database) = cli.database {
        config.storage.database_path = database;
    }

    init_tracing(&config.log.level);

    if let Err(e) = run(cli.command, &config).await {
        eprintln!("tocsin: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &TocsinConfig) -> Result<(), commands::CliError> {
    if let Commands::Doctor { plain } = command {
        if doctor::run_doctor(config, plain).await > 0 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let store = commands::open_store(config).await?;
    let result = match command {
        Commands::Migrate => commands::print_json(&commands::migrate(&store, config).await?),
        Commands::Incidents(args) => {
            commands::print_json(&commands::list_incidents(&store, &args).await?)
        }
        Commands::Incident { action } => {
            commands::print_json(&commands::incident(&store, action).await?)
        }
        Commands::Snapshots { action } => {
            commands::print_json(&commands::snapshots(&store, action).await?)
        }
        Commands::Eval {
            scheduler_id,
            expression,
        } => {
            let output = commands::eval(&store, config, &scheduler_id, &expression).await?;
            commands::print_json(&output)
        }
        Commands::Reconcile {
            rule_id,
            scheduler_id,
            expression,
            auto_close,
        } => {
            let outcome = commands::reconcile(
                &store,
                config,
                commands::rule(rule_id, scheduler_id, expression, auto_close)?,
            )
            .await?;
            commands::print_json(&outcome)
        }
        Commands::Doctor { .. } => Ok(()),
    };
    commands::close_store(&store).await;
    result
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tocsin={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
