mod commands;
mod config;

use clap::{Parser, Subcommand};
use common::{Environment, setup_logging};
use config::CtlConfig;
use shmheap::CheckOptions;
use std::process::ExitCode;

/// Operate a shared-memory heap from the shell.
#[derive(Debug, Parser)]
#[command(name = "shmheapctl", version)]
struct Cli {
    #[command(flatten)]
    config: CtlConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the segment, replacing any previous one at the same paths.
    Init {
        /// Bytes per size class.
        #[arg(long, env = "SHMHEAP_CLUSTER_SIZE")]
        cluster_size: Option<u32>,
    },
    /// Remove the segment's lock and backing files.
    Destroy {
        /// Destroy even while connections are registered.
        #[arg(long)]
        force: bool,
    },
    /// Show free blocks per size class.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Validate the segment and report blocks of dead processes.
    Check {
        #[arg(long)]
        verbose: bool,
        /// Reclaim orphaned blocks and release dead connections.
        #[arg(long)]
        cleanup: bool,
        #[arg(long)]
        json: bool,
    },
    /// List live blocks, one JSON object per line.
    Scan {
        #[arg(long)]
        pid: Option<i32>,
        #[arg(long)]
        seed: Option<i32>,
        #[arg(long = "type")]
        type_tag: Option<i32>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Decode the name/value records stored at an offset.
    Records { offset: i32 },
    /// Register a connection and print its seed.
    Connect {
        /// Register on behalf of this pid instead of shmheapctl itself.
        #[arg(long)]
        pid: Option<i32>,
    },
    /// Release a connection.
    Disconnect { seed: i32 },
    /// List live connections.
    Connections,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(Environment::from_env());

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Command failed");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = &cli.config;
    match cli.command {
        Command::Init { cluster_size } => commands::init(config, cluster_size)?,
        Command::Destroy { force } => commands::destroy(config, force)?,
        Command::Stats { json } => commands::stats(config, json)?,
        Command::Check {
            verbose,
            cleanup,
            json,
        } => {
            let consistent = commands::check(config, CheckOptions { verbose, cleanup }, json)?;
            if !consistent {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Scan {
            pid,
            seed,
            type_tag,
            limit,
        } => commands::scan(
            config,
            commands::ScanFilter {
                pid,
                seed,
                type_tag,
                limit,
            },
        )?,
        Command::Records { offset } => commands::records(config, offset)?,
        Command::Connect { pid } => commands::connect(config, pid)?,
        Command::Disconnect { seed } => commands::disconnect(config, seed)?,
        Command::Connections => commands::connections(config)?,
    }
    Ok(ExitCode::SUCCESS)
}
