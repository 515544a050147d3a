//! Binary entry point for reclaim.
//!
//! Operator CLI over the persistence core: run or schedule garbage
//! collection, inspect dependencies and query the secondary indexes.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use reclaim::ReclaimConfig;
use reclaim::cli::{self, parse_object_id, parse_object_type, parse_object_types};
use reclaim::observability::{self, ObservabilityConfig};
use reclaim::services::ServiceContainer;
use std::path::PathBuf;
use std::process::ExitCode;

/// Reclaim - indexes, paginated queries and dependency-aware garbage
/// collection for a wide-column object store.
#[derive(Parser)]
#[command(name = "reclaim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "RECLAIM_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run one GC cycle per type now.
    Gc {
        /// Object type to collect (repeatable; default: all types).
        #[arg(short = 't', long = "type")]
        types: Vec<String>,

        /// Report what would be deleted without deleting.
        #[arg(long)]
        dry_run: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run the GC scheduler until Ctrl-C.
    Run {
        /// Object type to schedule (repeatable; default: all types).
        #[arg(short = 't', long = "type")]
        types: Vec<String>,
    },

    /// Show what still references an object.
    Deps {
        /// Object id.
        id: String,

        /// Object type.
        #[arg(short = 't', long = "type")]
        object_type: String,

        /// Count decommissioned referrers too.
        #[arg(long)]
        include_inactive: bool,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Query the secondary indexes.
    Query {
        /// Query kind.
        #[command(subcommand)]
        kind: QueryKind,
    },

    /// Mark an object inactive.
    Decommission {
        /// Object id.
        id: String,

        /// Object type.
        #[arg(short = 't', long = "type")]
        object_type: String,
    },
}

/// Index queries.
#[derive(Subcommand)]
enum QueryKind {
    /// Objects in a container whose label starts with a prefix.
    Label {
        /// Object type.
        #[arg(short = 't', long = "type")]
        object_type: String,

        /// Container object id (e.g. the project).
        #[arg(short, long)]
        container: String,

        /// Label prefix (case-insensitive).
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Maximum number of hits.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Decommissioned objects of a type.
    Decommissioned {
        /// Object type.
        #[arg(short = 't', long = "type")]
        object_type: String,

        /// Include objects still inside the retention delay.
        #[arg(long)]
        all: bool,

        /// Maximum number of hits.
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match ReclaimConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let expose_metrics = matches!(cli.command, Commands::Run { .. });
    let _observability = match observability::init(ObservabilityConfig::from_config(
        &config,
        cli.verbose,
        expose_metrics,
    )) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &ReclaimConfig) -> anyhow::Result<()> {
    let container =
        ServiceContainer::from_config(config).context("failed to initialize services")?;

    match command {
        Commands::Gc {
            types,
            dry_run,
            json,
        } => {
            let types = parse_object_types(&types, container.registry())?;
            cli::gc::execute(&container, &types, dry_run, json)?;
        },

        Commands::Run { types } => {
            let types = parse_object_types(&types, container.registry())?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .thread_name("reclaim-gc")
                .build()
                .context("failed to start tokio runtime")?;
            runtime.block_on(cli::run::execute(&container, &types))?;
        },

        Commands::Deps {
            id,
            object_type,
            include_inactive,
            json,
        } => {
            let object_type = parse_object_type(&object_type)?;
            let id = parse_object_id(&id, object_type)?;
            cli::deps::execute(&container, object_type, &id, include_inactive, json)?;
        },

        Commands::Query { kind } => match kind {
            QueryKind::Label {
                object_type,
                container: container_id,
                prefix,
                limit,
            } => {
                let object_type = parse_object_type(&object_type)?;
                let container_id = reclaim::ObjectId::parse(&container_id)?;
                cli::query::label(&container, object_type, &container_id, &prefix, limit)?;
            },
            QueryKind::Decommissioned {
                object_type,
                all,
                limit,
            } => {
                let object_type = parse_object_type(&object_type)?;
                cli::query::decommissioned(&container, object_type, all, limit)?;
            },
        },

        Commands::Decommission { id, object_type } => {
            let object_type = parse_object_type(&object_type)?;
            let id = parse_object_id(&id, object_type)?;
            cli::decommission::execute(&container, object_type, &id)
                .with_context(|| format!("failed to decommission {id}"))?;
        },
    }
    Ok(())
}
