//! Connect service (bp-connect) - Main entry point
//!
//! Command-line front end for the BeatPlanner connection workflow: the
//! periodic membership repair task plus one-shot maintenance commands
//! (single repair pass, legacy back-fill, pending-inbox listing). All
//! commands run against the SQLite document store in the root folder.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bp_common::config::{RootFolderInitializer, RootFolderResolver};
use bp_common::store::{DocumentStore, SqliteStore};
use bp_connect::migrate::backfill_legacy_membership;
use bp_connect::{ConnectionRequests, MembershipSync};

/// Command-line arguments for bp-connect
#[derive(Parser, Debug)]
#[command(name = "bp-connect")]
#[command(about = "Connection workflow service for BeatPlanner")]
#[command(version)]
struct Args {
    /// Root folder containing the document store
    #[arg(short, long, env = "BEATPLANNER_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the periodic membership repair task for a user
    Run {
        /// User id whose accepted join requests are repaired
        #[arg(long)]
        user: String,

        /// Repair interval in seconds (overrides the config file)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Run a single membership repair pass for a user
    Sync {
        /// User id whose accepted join requests are repaired
        #[arg(long)]
        user: String,
    },

    /// Mirror a legacy id's studio memberships onto a user id
    Backfill {
        /// Legacy directory id that appears in studio member lists
        #[arg(long)]
        legacy_id: String,

        /// Platform user id to add alongside the legacy id
        #[arg(long)]
        user: String,
    },

    /// List pending connection requests addressed to a user
    Pending {
        /// Receiving user id
        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let resolver = RootFolderResolver::new("bp-connect");

    // Initialize tracing; RUST_LOG overrides the configured level
    let level = resolver.configured_log_level();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "bp_connect={level},bp_common={level}"
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    info!("Starting BeatPlanner Connect v{}", env!("CARGO_PKG_VERSION"));

    let config = resolver.load_config();
    let root_folder = resolver.resolve_with_cli(args.root_folder.as_deref());
    info!("Root folder: {}", root_folder.display());

    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteStore::open(&initializer.database_path())
            .await
            .context("Failed to open document store")?,
    );

    match args.command {
        Command::Run { user, interval } => {
            let mut sync_config = config.sync.clone();
            if let Some(secs) = interval {
                sync_config.interval_secs = secs;
            }
            let sync = Arc::new(MembershipSync::new(store, user, sync_config));
            sync.run();

            shutdown_signal().await;
            info!("Shutdown complete");
        }
        Command::Sync { user } => {
            let sync = MembershipSync::new(store, user, config.sync.clone());
            let report = sync.run_once().await.context("Repair pass failed")?;
            println!("requests checked:  {}", report.requests_checked);
            println!("memberships added: {}", report.members_added);
            println!("skipped:           {}", report.skipped);
        }
        Command::Backfill { legacy_id, user } => {
            let report = backfill_legacy_membership(store, &legacy_id, &user)
                .await
                .context("Back-fill failed")?;
            println!("studios with legacy id: {}", report.studios_with_legacy_id);
            println!("memberships added:      {}", report.members_added);
        }
        Command::Pending { user } => {
            let requests = ConnectionRequests::new(store);
            let pending = requests
                .pending_for_receiver(&user)
                .await
                .context("Failed to list pending requests")?;
            if pending.is_empty() {
                println!("no pending requests for {}", user);
            }
            for record in pending {
                println!(
                    "{}  {:<11}  from {} ({})",
                    record.id,
                    record.request.kind.type_str(),
                    record.request.sender_name,
                    record.request.sender_id
                );
            }
        }
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
