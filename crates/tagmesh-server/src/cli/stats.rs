use crate::config::TagmeshConfig;
use crate::serve::open_service;
use anyhow::Result;

pub fn run(config: TagmeshConfig) -> Result<()> {
    let service = open_service(&config)?;
    let stats = service.stats()?;
    let db_mb = stats.store.db_size_bytes as f64 / 1_048_576.0;

    println!();
    println!("Tag Overview");
    println!("{}", "─".repeat(50));
    println!("Canonical tags:   {:>8}", stats.store.canonical_count);
    println!("  approved        {:>8}", stats.store.approved_count);
    println!("Aliases:          {:>8}", stats.store.alias_count);
    println!("  pending embed   {:>8}", stats.store.pending_backfill_count);
    println!("Indexed vectors:  {:>8}", stats.indexed_vectors);
    match stats.embedding_dimension {
        Some(dim) => println!("Dimension:        {:>8}", dim),
        None => println!("Dimension:        {:>8}", "-"),
    }
    println!("Video links:      {:>8}", stats.store.video_link_count);
    println!("DB Size:          {:>7.1} MB", db_mb);
    println!("{}", "─".repeat(50));
    println!();

    Ok(())
}
