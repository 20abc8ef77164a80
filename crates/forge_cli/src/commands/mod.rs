//! CLI command definitions.
//!
//! This module defines the command structure for the forge CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use forge_blueprint::LocalRepository;

use crate::config::ForgeConfig;

pub mod blueprint;
pub mod list;

/// forge - blueprint-driven project generator
#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about = "forge - generate configuration from composable blueprints")]
#[command(long_about = r#"
forge renders parameterized blueprints into concrete files. A blueprint
declares its parameters, the files it ships and other blueprints it
includes; forge asks for the parameters, evaluates the conditions and
writes the result.

COMMANDS:
  blueprint  → Instantiate a blueprint into the output directory
  list       → List the blueprints of a repository

CONFIGURATION:
  forge.toml in the working directory (or --config) may set
  [repository] name/path and [output] dir.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Template error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to ./forge.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Instantiate a blueprint
    Blueprint(blueprint::BlueprintArgs),

    /// List available blueprints
    List(list::ListArgs),
}

/// Open the blueprint repository from the flag or the configuration.
pub(crate) fn open_repository(
    path: Option<PathBuf>,
    config: &ForgeConfig,
) -> Result<LocalRepository> {
    let path = path.unwrap_or_else(|| config.repository.path.clone());
    if !path.is_dir() {
        anyhow::bail!("Repository directory not found: {:?}", path);
    }
    Ok(LocalRepository::new(config.repository.name.clone(), path))
}
