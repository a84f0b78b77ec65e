//! mlib-meta - catalog metadata maintenance tool
//!
//! Opens the catalog database under the resolved root folder and runs one
//! maintenance command against the stored items.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use mlib_common::config::{self, LoggingConfig, RootFolderResolver};
use mlib_common::events::EventBus;
use mlib_meta::db::SqliteItemRepository;
use mlib_meta::probe::FsProbe;
use mlib_meta::{ImageKind, MetadataField, MetadataService};

#[derive(Parser, Debug)]
#[command(name = "mlib-meta")]
#[command(about = "Catalog metadata maintenance for MLIB")]
#[command(version)]
struct Args {
    /// Root folder holding the catalog database
    #[arg(short, long, env = "MLIB_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Configuration file (defaults to the platform location)
    #[arg(short, long, env = "MLIB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print an item as JSON
    Show { id: Uuid },

    /// Drop image records whose local files are gone
    Validate {
        /// Only this item (default: every item)
        #[arg(long)]
        id: Option<Uuid>,
    },

    /// Exchange two image slots of one kind
    Swap {
        id: Uuid,
        kind: ImageKind,
        first: usize,
        second: usize,
    },

    /// Protect a field from refresh
    Lock { id: Uuid, field: MetadataField },

    /// Allow refresh to overwrite a field again
    Unlock { id: Uuid, field: MetadataField },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = config::load_or_default(args.config.as_deref());

    init_tracing(&toml_config.logging)?;

    let resolver = RootFolderResolver::new(args.root_folder.clone(), toml_config);
    let db_path = resolver.database_path();
    info!("Root folder: {}", resolver.resolve().display());
    info!("Database: {}", db_path.display());

    let pool = mlib_common::db::init_database(&db_path)
        .await
        .context("Failed to open catalog database")?;
    let repository = Arc::new(SqliteItemRepository::new(pool));
    let service = MetadataService::new(
        repository.clone(),
        repository,
        Arc::new(FsProbe),
        EventBus::new(100),
    );
    service.load_from_repository().await?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    match args.command {
        Command::Show { id } => {
            let item = service.snapshot(id).await?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        Command::Validate { id } => {
            let ids = match id {
                Some(id) => vec![id],
                None => service.ids().await,
            };
            validate(&service, &ids, &cancel).await;
        }
        Command::Swap {
            id,
            kind,
            first,
            second,
        } => {
            service
                .swap_images(id, kind, first, second, &cancel)
                .await
                .with_context(|| format!("Swap failed for {}", id))?;
            info!(item_id = %id, kind = %kind, first, second, "Swapped image slots");
        }
        Command::Lock { id, field } => {
            let changed = service.set_field_lock(id, field, true, &cancel).await?;
            info!(item_id = %id, field = %field, changed, "Field locked");
        }
        Command::Unlock { id, field } => {
            let changed = service.set_field_lock(id, field, false, &cancel).await?;
            info!(item_id = %id, field = %field, changed, "Field unlocked");
        }
    }

    Ok(())
}

/// Validate items concurrently; per-item failures are logged, not fatal
async fn validate(service: &MetadataService, ids: &[Uuid], cancel: &CancellationToken) {
    let results =
        futures::future::join_all(ids.iter().map(|id| service.validate_images(*id, cancel))).await;

    let mut removed = 0;
    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(report) => {
                removed += report.removed.len();
                for record in &report.removed {
                    info!(item_id = %id, kind = %record.kind, path = %record.path(), "Removed");
                }
            }
            Err(e) if e.is_cancelled() => {
                warn!(item_id = %id, "Validation cancelled");
            }
            Err(e) => error!(item_id = %id, error = %e, "Validation failed"),
        }
    }
    info!(items = ids.len(), removed, "Validation complete");
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, cancelling");
        cancel.cancel();
    }
}
