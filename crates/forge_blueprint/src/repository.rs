//! Blueprint repositories.
//!
//! A repository exposes blueprint discovery and raw file access. A
//! blueprint is any directory holding a `blueprint.yaml` / `blueprint.yml`
//! definition (file stem matched case-insensitively) and is identified by
//! its `/`-separated path relative to the repository root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{BlueprintError, BlueprintResult};

/// A blueprint found in a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBlueprint {
    /// Repository path of the blueprint directory, e.g. `aws/monolith`.
    pub path: String,
    /// Repository path of the definition file.
    pub definition_file: String,
    /// Repository paths of the other files in the blueprint directory.
    pub files: Vec<String>,
}

/// Source of blueprint definitions and files.
pub trait BlueprintRepository {
    /// Display name of the repository.
    fn name(&self) -> &str;

    /// Backend kind, e.g. `local`.
    fn provider(&self) -> &str;

    /// All blueprints keyed by path.
    fn list_blueprints(&self) -> BlueprintResult<BTreeMap<String, RemoteBlueprint>>;

    /// Raw contents of a file addressed by repository path.
    fn get_file_contents(&self, path: &str) -> BlueprintResult<Vec<u8>>;
}

/// Whether a file name is a blueprint definition.
pub fn is_definition_file(file_name: &str) -> bool {
    let Some((stem, extension)) = file_name.rsplit_once('.') else {
        return false;
    };
    stem.eq_ignore_ascii_case("blueprint")
        && (extension.eq_ignore_ascii_case("yaml") || extension.eq_ignore_ascii_case("yml"))
}

/// Group a flat list of repository file paths into blueprints.
pub fn index_blueprints<I>(paths: I) -> BTreeMap<String, RemoteBlueprint>
where
    I: IntoIterator<Item = String>,
{
    let paths: Vec<String> = paths.into_iter().collect();
    let mut blueprints = BTreeMap::new();

    for path in &paths {
        let (dir, file_name) = match path.rsplit_once('/') {
            Some((dir, file_name)) => (dir, file_name),
            None => ("", path.as_str()),
        };
        if !is_definition_file(file_name) {
            continue;
        }
        if dir.is_empty() {
            warn!("Ignoring blueprint definition at repository root: {}", path);
            continue;
        }
        blueprints.insert(
            dir.to_string(),
            RemoteBlueprint {
                path: dir.to_string(),
                definition_file: path.clone(),
                files: Vec::new(),
            },
        );
    }

    for path in &paths {
        for blueprint in blueprints.values_mut() {
            if path != &blueprint.definition_file
                && path.starts_with(&format!("{}/", blueprint.path))
            {
                blueprint.files.push(path.clone());
            }
        }
    }

    blueprints
}

/// Reject repository paths that could escape the repository root.
fn checked_relative(path: &str) -> BlueprintResult<PathBuf> {
    let relative = PathBuf::from(path);
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe || path.is_empty() {
        return Err(BlueprintError::schema(format!(
            "invalid repository path '{}'",
            path
        )));
    }
    Ok(relative)
}

/// A repository backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    name: String,
    root: PathBuf,
}

impl LocalRepository {
    /// Create a new local repository rooted at `root`.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlueprintRepository for LocalRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        "local"
    }

    fn list_blueprints(&self) -> BlueprintResult<BTreeMap<String, RemoteBlueprint>> {
        if !self.root.is_dir() {
            return Err(BlueprintError::Io {
                operation: "list blueprints in",
                path: self.root.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "repository directory does not exist",
                ),
            });
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| BlueprintError::Io {
                operation: "walk",
                path: self.root.clone(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            paths.push(parts.join("/"));
        }

        let blueprints = index_blueprints(paths);
        info!(
            "Found {} blueprint(s) in local repository {:?}",
            blueprints.len(),
            self.root
        );
        Ok(blueprints)
    }

    fn get_file_contents(&self, path: &str) -> BlueprintResult<Vec<u8>> {
        let full = self.root.join(checked_relative(path)?);
        debug!("Reading {:?}", full);
        fs::read(&full).map_err(BlueprintError::io("read", full))
    }
}

/// A repository held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    name: String,
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: BTreeMap::new(),
        }
    }

    /// Add a file at a repository path.
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), content.into());
    }
}

impl BlueprintRepository for MemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        "memory"
    }

    fn list_blueprints(&self) -> BlueprintResult<BTreeMap<String, RemoteBlueprint>> {
        Ok(index_blueprints(self.files.keys().cloned()))
    }

    fn get_file_contents(&self, path: &str) -> BlueprintResult<Vec<u8>> {
        checked_relative(path)?;
        self.files.get(path).cloned().ok_or_else(|| BlueprintError::Io {
            operation: "read",
            path: PathBuf::from(path),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file in repository"),
        })
    }
}
