//! List command - Show the blueprints of a repository.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use forge_blueprint::{parse_blueprint_metadata, BlueprintRepository};

use crate::config::ForgeConfig;

#[derive(Args)]
pub struct ListArgs {
    /// Blueprint repository directory
    #[arg(short, long, env = "FORGE_REPOSITORY")]
    repository: Option<PathBuf>,
}

pub fn execute(args: ListArgs, config: &ForgeConfig) -> Result<()> {
    let repository = super::open_repository(args.repository, config)?;
    info!("Listing blueprints in {:?}", repository.root());

    let blueprints = repository
        .list_blueprints()
        .context("Failed to list blueprints")?;

    if blueprints.is_empty() {
        println!("⚠️  No blueprints found in {:?}", repository.root());
        return Ok(());
    }

    println!(
        "📚 {} blueprint(s) in repository {}:\n",
        blueprints.len(),
        repository.name()
    );

    let width = blueprints.keys().map(|k| k.len()).max().unwrap_or(0);
    for (path, remote) in &blueprints {
        let summary = repository
            .get_file_contents(&remote.definition_file)
            .and_then(|content| parse_blueprint_metadata(&content, path));
        match summary {
            Ok(config) => {
                let description = if config.metadata.description.is_empty() {
                    config.metadata.name
                } else {
                    config.metadata.description
                };
                println!("  {:<width$}  {}", path, description, width = width);
            }
            Err(e) => {
                warn!("Blueprint {} is invalid: {}", path, e);
                println!("  {:<width$}  ❌ invalid: {}", path, e, width = width);
            }
        }
    }

    Ok(())
}
