use crate::cli::ImportArgs;
use crate::config::TagmeshConfig;
use crate::serve::open_service;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tagmesh_core::{parse_legacy_json, LegacyTagRecord};
use uuid::Uuid;

pub async fn run(args: ImportArgs, config: TagmeshConfig) -> Result<()> {
    let path = &args.file;

    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let format = args.format.clone().unwrap_or_else(|| {
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => "csv",
            _ => "json",
        }
        .to_string()
    });

    println!("Importing {} as {} format...", path.display(), format);

    let records = match format.as_str() {
        "json" => import_json(path)?,
        "csv" => import_csv(path)?,
        other => anyhow::bail!("Unknown format: {}", other),
    };

    println!("Parsed {} legacy tags", records.len());

    if args.dry_run {
        println!("Dry run, no changes written.");
        for record in &records {
            let id = record.id.map(|id| id.to_string()).unwrap_or_else(|| "(new id)".to_string());
            println!("  {} ({}), {} videos", record.name, id, record.video_ids.len());
        }
        return Ok(());
    }

    let service = open_service(&config)?;
    let report = service.import_legacy(records).await?;

    println!();
    println!("Imported:          {}", report.imported);
    println!("Merged duplicates: {}", report.merged_duplicates);
    println!("Failed:            {}", report.failed);
    println!("Video links:       {}", report.video_links);
    println!("Pending backfill:  {}", report.pending_backfill);
    if report.pending_backfill > 0 {
        println!("Run `tagmesh backfill` to embed the remaining aliases.");
    }
    Ok(())
}

fn import_json(path: &Path) -> Result<Vec<LegacyTagRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_legacy_json(&text)?)
}

/// One legacy tag per row. `video_ids` is `;`-separated.
#[derive(Debug, Deserialize)]
struct CsvTagRow {
    #[serde(default)]
    id: Option<Uuid>,
    name: String,
    #[serde(default)]
    video_ids: Option<String>,
}

fn import_csv(path: &Path) -> Result<Vec<LegacyTagRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    parse_csv_rows(&mut reader)
}

fn parse_csv_rows<R: std::io::Read>(reader: &mut csv::Reader<R>) -> Result<Vec<LegacyTagRecord>> {
    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<CsvTagRow>().enumerate() {
        // +2: header row, 1-based
        let row = row.with_context(|| format!("Invalid CSV row {}", line + 2))?;
        let video_ids = row
            .video_ids
            .as_deref()
            .unwrap_or("")
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Uuid::parse_str)
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Invalid video id in CSV row {}", line + 2))?;

        let mut record = LegacyTagRecord::named(row.name);
        record.id = row.id;
        record.video_ids = video_ids;
        records.push(record);
    }
    Ok(records)
}
