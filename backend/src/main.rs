//! Scorebook CLI
//!
//! ```bash
//! scorebook serve                              # Start HTTP server (port 3000)
//! scorebook serve --snapshot data/store.json   # Persist to a JSON snapshot
//! scorebook audit --snapshot data/store.json   # Report comment counter drift
//! scorebook audit --snapshot data/store.json --repair
//! ```
//!
//! Flags override the `SCOREBOOK_*` environment variables, which may also be
//! set in a `.env` file.

use clap::{Parser, Subcommand};
use scorebook::{AppConfig, CounterCoordinator, EntityStore, MemoryStore, RemovalPolicy};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "scorebook")]
#[command(about = "Composition catalogue with user comments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// JSON snapshot file backing the store
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// What to do with comments when their composition is removed
        #[arg(long, value_name = "reject|cascade")]
        removal_policy: Option<RemovalPolicy>,
    },

    /// Compare every comment counter in a snapshot with the real comment count
    Audit {
        /// JSON snapshot file to check
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Write the corrected counters back to the snapshot
        #[arg(long)]
        repair: bool,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scorebook=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            host,
            port,
            snapshot,
            removal_policy,
        } => cmd_serve(host, port, snapshot, removal_policy).await,

        Commands::Audit { snapshot, repair } => cmd_audit(&snapshot, repair),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn cmd_serve(
    host: Option<String>,
    port: Option<u16>,
    snapshot: Option<PathBuf>,
    removal_policy: Option<RemovalPolicy>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::from_env()?;
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(snapshot) = snapshot {
        config.snapshot_path = Some(snapshot);
    }
    if let Some(policy) = removal_policy {
        config.removal_policy = policy;
    }

    scorebook::start_server(config).await?;
    Ok(())
}

fn cmd_audit(snapshot: &Path, repair: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !snapshot.exists() {
        return Err(format!("Snapshot not found: {}", snapshot.display()).into());
    }

    let store = Arc::new(MemoryStore::open(snapshot)?);
    let compositions = store.compositions()?.len();
    let drifted = CounterCoordinator::new(store).reconcile_all(repair)?;

    println!("{}", serde_json::to_string_pretty(&drifted)?);
    tracing::info!(
        "Audited {compositions} composition(s): {} drifted{}",
        drifted.len(),
        if repair && !drifted.is_empty() { ", repaired" } else { "" }
    );

    if !repair && !drifted.is_empty() {
        std::process::exit(2);
    }
    Ok(())
}
