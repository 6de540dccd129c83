use crate::cli::BackfillArgs;
use crate::config::TagmeshConfig;
use crate::serve::open_service;
use anyhow::Result;

pub async fn run(args: BackfillArgs, config: TagmeshConfig) -> Result<()> {
    let service = open_service(&config)?;
    if !service.resolver().providers().has_embedding() {
        anyhow::bail!("No embedding provider configured; check [embedding] and OPENAI_API_KEY");
    }

    let limit = args.limit.unwrap_or(config.backfill.batch_size);
    let report = service.backfill_embeddings(limit).await?;
    let remaining = service.stats()?.store.pending_backfill_count;

    println!(
        "Backfill: {} processed, {} succeeded, {} failed ({} still pending)",
        report.processed, report.succeeded, report.failed, remaining
    );
    Ok(())
}
