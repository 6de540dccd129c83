use crate::config::{BackfillConfig, TagmeshConfig};
use crate::http::{self, AppState};
use crate::providers;
use std::sync::Arc;
use std::time::Duration;
use tagmesh_core::TagService;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub async fn run(config: TagmeshConfig) -> anyhow::Result<()> {
    info!("Starting tagmesh server v{}", env!("CARGO_PKG_VERSION"));
    info!("HTTP: {}", config.server.http_addr);
    info!("Data: {:?}", config.server.data_dir);

    let service = Arc::new(open_service(&config)?);

    let backfill_task = spawn_backfill(service.clone(), &config.backfill);

    let http_task = {
        let app_state = AppState {
            service: service.clone(),
            backfill_batch: config.backfill.batch_size,
            start_time: std::time::Instant::now(),
        };
        let app = http::create_router(app_state);
        let listener = tokio::net::TcpListener::bind(config.server.http_addr).await?;
        info!("Starting HTTP server on {}", config.server.http_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("HTTP server failed: {}", e);
            }
        })
    };

    info!("tagmesh server ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, terminating...");

    http_task.abort();
    if let Some(task) = backfill_task {
        task.abort();
    }

    Ok(())
}

/// Open the database with the configured providers and log what was loaded.
pub fn open_service(config: &TagmeshConfig) -> anyhow::Result<TagService> {
    std::fs::create_dir_all(&config.server.data_dir)?;
    let providers = providers::build(config)?;

    info!("Opening database...");
    let service = TagService::open(config.db_path(), providers, config.to_resolver_config())?;
    let stats = service.stats()?;
    info!(
        "Database loaded: {} canonical tags, {} aliases ({} pending backfill), {} indexed vectors",
        stats.store.canonical_count,
        stats.store.alias_count,
        stats.store.pending_backfill_count,
        stats.indexed_vectors
    );
    Ok(service)
}

fn spawn_backfill(service: Arc<TagService>, config: &BackfillConfig) -> Option<JoinHandle<()>> {
    if config.interval_secs == 0 {
        info!("Embedding backfill task disabled");
        return None;
    }
    let interval = Duration::from_secs(config.interval_secs);
    let batch = config.batch_size;
    info!("Embedding backfill every {}s, {} aliases per run", interval.as_secs(), batch);

    Some(tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match service.backfill_embeddings(batch).await {
                Ok(report) if report.processed > 0 => info!(
                    "Backfill: {} processed, {} succeeded, {} failed",
                    report.processed, report.succeeded, report.failed
                ),
                Ok(_) => {}
                Err(e) => error!("Backfill run failed: {}", e),
            }
        }
    }))
}
