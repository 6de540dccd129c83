use crate::cli::ConfigCommands;
use crate::config::TagmeshConfig;
use anyhow::Result;
use std::path::Path;

pub fn run(cmd: ConfigCommands, config_path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Validate => validate(config_path),
        ConfigCommands::Show => show(config_path),
    }
}

fn validate(config_path: &Path) -> Result<()> {
    let config = if config_path.exists() {
        TagmeshConfig::load(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", config_path.display(), e))?
    } else {
        println!("{} not found, checking defaults.", config_path.display());
        TagmeshConfig::default()
    };

    let errors = config.validate();
    if !errors.is_empty() {
        println!("Validation errors in {}:", config_path.display());
        for e in &errors {
            println!("  - {}", e);
        }
        anyhow::bail!("{} invalid setting(s)", errors.len());
    }

    println!("{} is valid.", config_path.display());
    if config.embedding.resolved_api_key().is_none() {
        println!("Note: no API key set; OpenAI embedding and translation will be disabled.");
    }
    Ok(())
}

fn show(config_path: &Path) -> Result<()> {
    let mut config = TagmeshConfig::load_or_default(config_path);
    if config.embedding.api_key.is_some() {
        config.embedding.api_key = Some("********".to_string());
    }
    match toml::to_string_pretty(&config) {
        Ok(s) => println!("{}", s),
        Err(e) => anyhow::bail!("Failed to serialize config: {}", e),
    }
    Ok(())
}
