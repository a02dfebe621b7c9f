//! meshsync: mirror a Netmaker installation into a versioned SQLite history.
//!
//! # Commands
//!
//! - `serve` - sync everything on the configured interval
//! - `sync <kind>` - run one synchronizer now
//! - `networks`, `network`, `history`, `runs` - read the store as JSON

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "meshsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./meshsync.toml, then /etc/meshsync/meshsync.toml)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `meshsync_engine=debug` (RUST_LOG wins when set)
    #[arg(global = true, long)]
    log_level: Option<String>,

    /// Database file, overriding the configuration
    #[arg(global = true, long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full sync on the configured interval until interrupted
    Serve {
        /// Stop after this many runs
        #[arg(long)]
        max_runs: Option<usize>,
    },

    /// Run synchronizers once
    #[command(subcommand)]
    Sync(SyncCommand),

    /// List current networks
    Networks,

    /// Show one current network
    Network { id: String },

    /// Show every stored version of an entity, newest first
    History {
        /// network, node, ext_client, dns, host or acl
        kind: String,
        id: String,
    },

    /// Show recent sync runs
    Runs {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum SyncCommand {
    /// Networks, then every network's children, then hosts
    All {
        /// Also reconcile ACL matrices
        #[arg(long)]
        acls: bool,
    },
    Networks,
    Hosts,
    Nodes { network: String },
    ExtClients { network: String },
    Dns { network: String },
    Acls { network: String },
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level {level:?}"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    init_logging(&config.logging.level)?;

    match cli.command {
        Command::Serve { max_runs } => commands::serve(&config, max_runs),
        Command::Sync(SyncCommand::All { acls }) => {
            commands::sync_all(&config, acls || config.sync.include_acls)
        }
        Command::Sync(SyncCommand::Networks) => commands::sync_one(&config, |s| s.sync_networks()),
        Command::Sync(SyncCommand::Hosts) => commands::sync_one(&config, |s| s.sync_hosts()),
        Command::Sync(SyncCommand::Nodes { network }) => {
            commands::sync_one(&config, |s| s.sync_nodes(&network))
        }
        Command::Sync(SyncCommand::ExtClients { network }) => {
            commands::sync_one(&config, |s| s.sync_ext_clients(&network))
        }
        Command::Sync(SyncCommand::Dns { network }) => {
            commands::sync_one(&config, |s| s.sync_dns_entries(&network))
        }
        Command::Sync(SyncCommand::Acls { network }) => {
            commands::sync_one(&config, |s| s.sync_acls(&network))
        }
        Command::Networks => commands::networks(&config),
        Command::Network { id } => commands::network(&config, &id),
        Command::History { kind, id } => commands::history(&config, &kind, &id),
        Command::Runs { limit } => commands::runs(&config, limit),
    }
}
