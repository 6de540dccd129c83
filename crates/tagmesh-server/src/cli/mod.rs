pub mod backfill;
pub mod config_cmd;
pub mod import;
pub mod stats;
pub mod tags;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tagmesh_core::CanonicalTag;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "tagmesh")]
#[command(version, about = "Canonical tag resolution: one tag per concept, in any language")]
pub struct Cli {
    /// Path to tagmesh.toml
    #[arg(
        long,
        global = true,
        env = "TAGMESH_CONFIG",
        default_value = "tagmesh.toml"
    )]
    pub config: PathBuf,

    /// Path to data directory (overrides config file)
    #[arg(long, global = true, env = "TAGMESH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve,
    /// Resolve text to its canonical tag, creating one if needed
    Resolve(ResolveArgs),
    /// Search canonical tags by substring, then by meaning
    Search(SearchArgs),
    /// Merge one canonical tag into another
    Merge(MergeArgs),
    /// Approve (or revoke approval of) a canonical tag
    Approve(ApproveArgs),
    /// Generate embeddings for aliases stored without one
    Backfill(BackfillArgs),
    /// Import legacy tags from JSON or CSV
    Import(ImportArgs),
    /// Tag statistics
    Stats,
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    Validate,
    Show,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    pub text: String,
    /// "table" or "json"
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    pub query: String,
    #[arg(long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub approved_only: bool,
    /// "table" or "json"
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Tag to absorb and delete
    pub source: Uuid,
    /// Tag that survives
    pub target: Uuid,
}

#[derive(Args, Debug)]
pub struct ApproveArgs {
    pub id: Uuid,
    /// Mark as unapproved instead
    #[arg(long)]
    pub revoke: bool,
}

#[derive(Args, Debug)]
pub struct BackfillArgs {
    /// Aliases to process (defaults to [backfill] batch_size)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// .json (array of records) or .csv (id,name,video_ids)
    pub file: PathBuf,
    /// Override format detection: "json" or "csv"
    #[arg(long)]
    pub format: Option<String>,
    /// Parse and report without writing
    #[arg(long)]
    pub dry_run: bool,
}

// --- Table printing helpers ---

pub fn print_tag_table(tags: &[CanonicalTag]) {
    if tags.is_empty() {
        println!("(no results)");
        return;
    }
    println!("{:<36}  {:<8}  {:<24}  {}", "ID", "APPROVED", "SLUG", "NAME");
    println!("{}", "─".repeat(90));
    for tag in tags {
        println!(
            "{:<36}  {:<8}  {:<24}  {}",
            tag.id,
            if tag.is_approved { "yes" } else { "no" },
            truncate(&tag.slug, 24),
            truncate(&tag.display_name, 40)
        );
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}…", s.chars().take(max - 1).collect::<String>())
    }
}
