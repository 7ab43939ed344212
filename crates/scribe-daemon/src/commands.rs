//! Command implementations for the scribe CLI.
//!
//! Handles:
//! - run: foreground maintenance loop (periodic sync and cleanup)
//! - rebuild/sync/cleanup/optimize/status: one-shot maintenance passes
//! - index/remove/search: single-entity operations
//! - import/stats: system-of-record loading and storage statistics

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use scribe_indexing::{IndexService, ServiceConfig, SyncConfig};
use scribe_storage::Storage;
use scribe_types::{Entity, OperationOutcome, SearchCriteria, Settings};

use crate::cli::{Cli, Commands};

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    apply_overrides(&mut settings, cli);
    Ok(settings)
}

pub fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(log_level) = &cli.log_level {
        settings.log_level = log_level.clone();
    }
    if let Some(db_path) = &cli.db_path {
        settings.db_path = db_path.clone();
    }
    if let Some(index_path) = &cli.index_path {
        settings.search_index_path = index_path.clone();
    }
    if let Some(primary) = cli.primary {
        settings.engines.primary = primary;
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Open storage and wire the engines.
pub fn open_service(settings: &Settings) -> Result<(Arc<Storage>, IndexService)> {
    let db_path = settings.expanded_db_path();
    info!(path = ?db_path, "Opening storage");

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let storage = Arc::new(Storage::open(&db_path).context("Failed to open storage")?);

    let service =
        IndexService::open(settings, storage.clone()).context("Failed to open search engines")?;
    Ok((storage, service))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", json);
    Ok(())
}

fn check_outcome(operation: &str, outcome: OperationOutcome) -> Result<()> {
    match outcome {
        OperationOutcome::Failed => anyhow::bail!("{} failed", operation),
        OperationOutcome::Partial => {
            warn!(operation, "Completed with errors");
            Ok(())
        }
        OperationOutcome::Success => Ok(()),
    }
}

/// Result of a JSON-lines import.
#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub imported: u64,
    /// Lines that were not valid entities
    pub rejected: u64,
    /// Imported entities that were also indexed
    pub indexed: u64,
}

/// Load one entity per line into the system-of-record.
///
/// Blank lines are ignored; malformed lines are logged and counted.
pub async fn import_entities(
    storage: &Storage,
    service: Option<&IndexService>,
    path: &Path,
) -> Result<ImportSummary> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut summary = ImportSummary::default();

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {:?}", path))?;
        if line.trim().is_empty() {
            continue;
        }

        let entity: Entity = match serde_json::from_str(&line) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "Skipping malformed entity");
                summary.rejected += 1;
                continue;
            }
        };

        storage
            .put_entity(&entity)
            .with_context(|| format!("Failed to store entity on line {}", line_no + 1))?;
        summary.imported += 1;

        if let Some(service) = service {
            if service.index_entity(entity.entity_type(), entity.id()).await {
                summary.indexed += 1;
            }
        }
    }

    info!(
        imported = summary.imported,
        rejected = summary.rejected,
        indexed = summary.indexed,
        "Import complete"
    );
    Ok(summary)
}

/// Periodic sync and cleanup until `cancel` fires.
///
/// Both passes run once at startup. A pass in progress sees the
/// cancellation between items.
pub async fn run_maintenance_loop(
    service: Arc<IndexService>,
    sync_every: Duration,
    cleanup_every: Duration,
    cancel: CancellationToken,
) {
    let mut sync_tick = tokio::time::interval(sync_every);
    sync_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cleanup_tick = tokio::time::interval(cleanup_every);
    cleanup_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        sync_secs = sync_every.as_secs(),
        cleanup_secs = cleanup_every.as_secs(),
        "Maintenance loop started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Maintenance loop stopping");
                break;
            }
            _ = sync_tick.tick() => {
                let result = service.sync_indexes(&cancel).await;
                info!(
                    added = result.added_to_search_engine,
                    updated = result.updated_in_search_engine,
                    errors = result.errors.len(),
                    "Scheduled sync finished"
                );
            }
            _ = cleanup_tick.tick() => {
                let result = service.cleanup_invalid_indexes(&cancel).await;
                info!(
                    scanned = result.scanned,
                    cleaned = result.cleaned,
                    errors = result.errors.len(),
                    "Scheduled cleanup finished"
                );
            }
        }
    }
}

/// Cancel `token` on Ctrl-C or SIGTERM.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = terminate => info!("Received SIGTERM, shutting down..."),
        }
        token.cancel();
    });
}

/// Execute one parsed command.
pub async fn execute(command: Commands, settings: Settings) -> Result<()> {
    let (storage, service) = open_service(&settings)?;
    let cancel = CancellationToken::new();

    match command {
        Commands::Run {
            sync_interval,
            cleanup_interval,
        } => {
            let sync_every =
                Duration::from_secs(sync_interval.unwrap_or(settings.maintenance.sync_interval_secs).max(1));
            let cleanup_every = Duration::from_secs(
                cleanup_interval
                    .unwrap_or(settings.maintenance.cleanup_interval_secs)
                    .max(1),
            );
            spawn_shutdown_listener(cancel.clone());
            run_maintenance_loop(Arc::new(service), sync_every, cleanup_every, cancel).await;
            storage.flush().context("Failed to flush storage")?;
        }
        Commands::Rebuild => {
            spawn_shutdown_listener(cancel.clone());
            let result = service.rebuild_all_indexes(&cancel).await;
            print_json(&result)?;
            check_outcome("rebuild", result.outcome())?;
        }
        Commands::Sync { all_types } => {
            spawn_shutdown_listener(cancel.clone());
            let result = if all_types {
                // Same stores and engines, wider type coverage
                let config = ServiceConfig {
                    sync: SyncConfig::all_types()
                        .with_batch_size(settings.maintenance.batch_size),
                    ..ServiceConfig::from_settings(&settings)
                };
                let wide = IndexService::new(
                    storage.clone(),
                    storage.clone(),
                    service.coordinator().clone(),
                    config,
                );
                wide.sync_indexes(&cancel).await
            } else {
                service.sync_indexes(&cancel).await
            };
            print_json(&result)?;
            check_outcome("sync", result.outcome())?;
        }
        Commands::Cleanup => {
            spawn_shutdown_listener(cancel.clone());
            let result = service.cleanup_invalid_indexes(&cancel).await;
            print_json(&result)?;
            check_outcome("cleanup", result.outcome())?;
        }
        Commands::Optimize => {
            spawn_shutdown_listener(cancel.clone());
            let optimized = service.optimize_index(&cancel).await;
            print_json(&serde_json::json!({ "optimized": optimized }))?;
            if !optimized {
                anyhow::bail!("optimize failed");
            }
        }
        Commands::Status => {
            print_json(&service.get_index_status().await)?;
        }
        Commands::Index { entity_type, id } => {
            let indexed = service.index_entity(entity_type, id).await;
            print_json(&serde_json::json!({
                "entity_type": entity_type,
                "id": id,
                "indexed": indexed,
            }))?;
        }
        Commands::Remove { entity_type, id } => {
            let removed = service.remove_entity(entity_type, id).await;
            print_json(&serde_json::json!({
                "entity_type": entity_type,
                "id": id,
                "removed": removed,
            }))?;
        }
        Commands::Search {
            query,
            entity_type,
            limit,
        } => {
            let mut criteria = SearchCriteria::new(query).with_limit(limit);
            if let Some(entity_type) = entity_type {
                criteria = criteria.with_entity_type(entity_type);
            }
            print_json(&service.search(&criteria).await)?;
        }
        Commands::Import { file, index } => {
            let indexer = index.then_some(&service);
            let summary = import_entities(&storage, indexer, &file).await?;
            print_json(&summary)?;
        }
        Commands::Stats => {
            let stats = storage.get_stats().context("Failed to read storage stats")?;
            print_json(&stats)?;
        }
    }

    Ok(())
}
