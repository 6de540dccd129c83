mod cli;
mod config;
mod http;
mod providers;
mod serve;

use clap::Parser;
use cli::{Cli, Commands};
use config::TagmeshConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; also picks up `log` records from tagmesh-core
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = TagmeshConfig::load_or_default(&cli.config);
    if let Some(data_dir) = cli.data_dir.clone() {
        config.server.data_dir = data_dir;
    }

    match cli.command {
        Commands::Serve => {
            let errors = config.validate();
            if !errors.is_empty() {
                anyhow::bail!("Invalid configuration:\n  - {}", errors.join("\n  - "));
            }
            serve::run(config).await
        }
        Commands::Resolve(args) => cli::tags::resolve(args, config).await,
        Commands::Search(args) => cli::tags::search(args, config).await,
        Commands::Merge(args) => cli::tags::merge(args, config),
        Commands::Approve(args) => cli::tags::approve(args, config),
        Commands::Backfill(args) => cli::backfill::run(args, config).await,
        Commands::Import(args) => cli::import::run(args, config).await,
        Commands::Stats => cli::stats::run(config),
        Commands::Config(cmd) => cli::config_cmd::run(cmd, &cli.config),
    }
}
