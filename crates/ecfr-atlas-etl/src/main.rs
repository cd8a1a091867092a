// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ecfr_atlas_client::{BulkDataClient, FederalRegisterClient};
use ecfr_atlas_core::{SnapshotDate, ENV_ATLAS_LOG, ENV_ATLAS_LOG_JSON};
use ecfr_atlas_db::SqliteRepo;
use ecfr_atlas_etl::{import_summaries, read_summary_file, EtlConfig, SnapshotCoordinator};
use ecfr_atlas_store::ArchiveRepo;

#[derive(Parser)]
#[command(name = "ecfr-atlas-etl")]
#[command(about = "eCFR Atlas snapshot ETL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one dated snapshot over all 50 Titles.
    Etl {
        #[arg(long)]
        snapshot_date: Option<String>,
    },
    /// Print per-agency totals from the relational store as JSON.
    AgencyTotals {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Persist externally generated summaries for a snapshot date.
    ImportSummaries {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        snapshot_date: Option<String>,
    },
}

fn init_tracing() {
    let directive = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| std::env::var(ENV_ATLAS_LOG).ok())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(ENV_ATLAS_LOG_JSON).map(|v| v == "1").unwrap_or(false);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Etl { snapshot_date } => run_etl(snapshot_date).await,
        Commands::AgencyTotals { title, db } => run_agency_totals(title, db),
        Commands::ImportSummaries {
            path,
            snapshot_date,
        } => run_import_summaries(path, snapshot_date).await,
    }
}

fn resolve_snapshot(raw: Option<String>) -> Result<SnapshotDate, String> {
    match raw {
        Some(raw) => SnapshotDate::parse(&raw).map_err(|e| e.to_string()),
        None => Ok(SnapshotDate::today()),
    }
}

async fn run_etl(snapshot_date: Option<String>) -> Result<(), String> {
    let snapshot = resolve_snapshot(snapshot_date)?;
    let config = EtlConfig::from_env().map_err(|e| e.to_string())?;

    let raw_store = config
        .raw_store
        .build(config.store_bearer.clone(), config.allow_private_store_hosts);
    let archive_store = config
        .archive_store
        .build(config.store_bearer.clone(), config.allow_private_store_hosts);

    let archive = Arc::new(ArchiveRepo::new(archive_store, config.archive_prefix.clone()));
    let bulk = Arc::new(BulkDataClient::new(
        config.bulkdata_url.clone(),
        Arc::clone(&raw_store),
        config.raw_prefix.clone(),
    ));
    let federal_register = Arc::new(FederalRegisterClient::new(
        config.federal_register_url.clone(),
    ));

    // Fatal setup errors (bad paths, unwritable db) exit nonzero;
    // per-Title failures inside the run do not.
    let repo = SqliteRepo::open(&config.db_path).map_err(|e| e.to_string())?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling snapshot run");
            let _ = cancel_tx.send(true);
        }
    });

    let coordinator = Arc::new(SnapshotCoordinator::new(
        bulk,
        federal_register,
        raw_store,
        archive,
        config.agencies_path.clone(),
        config.title_pool,
        config.metric_threads,
        config.write_queue_capacity,
    ));

    let manifest = coordinator
        .run(snapshot, repo, cancel_rx)
        .await
        .map_err(|e| e.to_string())?;
    info!(
        snapshot = %manifest.snapshot_date,
        ok = manifest.titles_ok,
        skipped = manifest.titles_skipped,
        failed = manifest.titles_failed,
        "etl completed"
    );
    Ok(())
}

fn run_agency_totals(title: Option<String>, db: Option<PathBuf>) -> Result<(), String> {
    let config = EtlConfig::from_env().map_err(|e| e.to_string())?;
    let path = db.unwrap_or(config.db_path);
    let repo = SqliteRepo::open(&path).map_err(|e| e.to_string())?;
    let metrics = repo
        .agency_totals(title.as_deref())
        .map_err(|e| e.to_string())?;
    println!(
        "{}",
        serde_json::to_string_pretty(&metrics).map_err(|e| e.to_string())?
    );
    Ok(())
}

async fn run_import_summaries(
    path: PathBuf,
    snapshot_date: Option<String>,
) -> Result<(), String> {
    let snapshot = resolve_snapshot(snapshot_date)?;
    let config = EtlConfig::from_env().map_err(|e| e.to_string())?;
    let archive_store = config
        .archive_store
        .build(config.store_bearer.clone(), config.allow_private_store_hosts);
    let archive = ArchiveRepo::new(archive_store, config.archive_prefix.clone());
    let repo = SqliteRepo::open(&config.db_path).map_err(|e| e.to_string())?;

    let rows = read_summary_file(&path).map_err(|e| e.to_string())?;
    import_summaries(repo, &archive, snapshot, rows)
        .await
        .map_err(|e| e.to_string())
}
