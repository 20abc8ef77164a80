//! `forge.toml` configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "forge.toml";

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForgeConfig {
    pub repository: RepositoryConfig,
    pub output: OutputConfig,
}

/// Where blueprints come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Name shown in messages.
    pub name: String,
    /// Local directory holding the blueprints.
    pub path: PathBuf,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            name: "local".to_string(),
            path: PathBuf::from("."),
        }
    }
}

/// Where generated files go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

impl ForgeConfig {
    /// Load the explicit configuration file, else `./forge.toml` when it
    /// exists, else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::from_file(path)
                } else {
                    debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse a configuration file. Relative paths in it are taken relative
    /// to the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {:?}", path))?;
        let mut config: ForgeConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration file {:?}", path))?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.repository.path = rebase(base, &config.repository.path);
            config.output.dir = rebase(base, &config.output.dir);
        }
        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
