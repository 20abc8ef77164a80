//! Output files of a blueprint run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::error::{BlueprintError, BlueprintResult};
use crate::prepare::PreparedData;

/// Directory under the output root holding the generated value files.
pub const OUTPUT_SUBDIR: &str = "forge";

pub const VALUES_FILE: &str = "values.properties";
pub const SECRETS_FILE: &str = "secrets.properties";
pub const GITIGNORE_FILE: &str = ".gitignore";

pub const VALUES_HEADER: &str =
    "# Non-secret values of this blueprint. Add entries here and refer to them with the '!value' tag.";
pub const SECRETS_HEADER: &str =
    "# Secret values of this blueprint, excluded from git. Edit or add entries and refer to them with the '!value' tag.";

/// Files written for a blueprint run.
#[derive(Debug, Clone)]
pub struct GeneratedBlueprint {
    output_dir: PathBuf,
    created_files: Vec<PathBuf>,
}

impl GeneratedBlueprint {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            created_files: Vec::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Every file written so far, in write order.
    pub fn created_files(&self) -> &[PathBuf] {
        &self.created_files
    }

    /// Write a file under the output directory, creating parents.
    pub fn write_file(&mut self, relative: &str, content: &[u8]) -> BlueprintResult<PathBuf> {
        let target = self.output_dir.join(safe_relative_path(relative)?);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(BlueprintError::io("create directory", parent))?;
        }
        fs::write(&target, content).map_err(BlueprintError::io("write", &target))?;
        debug!("Wrote {:?}", target);
        self.created_files.push(target.clone());
        Ok(target)
    }

    /// Write the values, secrets and ignore files.
    pub fn write_value_files(&mut self, data: &PreparedData) -> BlueprintResult<()> {
        let values = format_properties(VALUES_HEADER, &data.values);
        let secrets = format_properties(SECRETS_HEADER, &data.secrets);
        let gitignore = format!("{}\n", SECRETS_FILE);

        self.write_file(&format!("{}/{}", OUTPUT_SUBDIR, VALUES_FILE), values.as_bytes())?;
        self.write_file(&format!("{}/{}", OUTPUT_SUBDIR, SECRETS_FILE), secrets.as_bytes())?;
        self.write_file(&format!("{}/{}", OUTPUT_SUBDIR, GITIGNORE_FILE), gitignore.as_bytes())?;

        info!(
            "Saved {} value(s) and {} secret(s) under {:?}",
            data.values.len(),
            data.secrets.len(),
            self.output_dir.join(OUTPUT_SUBDIR)
        );
        Ok(())
    }
}

/// Validate a relative output path.
///
/// Absolute paths, `..` components and empty paths are rejected.
pub fn safe_relative_path(path: &str) -> BlueprintResult<PathBuf> {
    let relative = PathBuf::from(path);
    let mut normal = 0;
    for component in relative.components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            _ => return Err(BlueprintError::InvalidOutputPath(path.to_string())),
        }
    }
    if normal == 0 {
        return Err(BlueprintError::InvalidOutputPath(path.to_string()));
    }
    Ok(relative)
}

/// Render `key = value` lines sorted by key below a header comment.
pub fn format_properties(header: &str, entries: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    out.push_str(header);
    out.push('\n');
    for (key, value) in entries {
        out.push_str(&escape_property(key, true));
        out.push_str(" = ");
        out.push_str(&escape_property(value, false));
        out.push('\n');
    }
    out
}

fn escape_property(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0c}' => out.push_str("\\f"),
            ' ' | '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
