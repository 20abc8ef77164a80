//! Template rendering.

use std::collections::{BTreeMap, HashMap};

use forge_functions::FunctionRegistry;
use serde_json::Value as Json;
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::error::{BlueprintError, BlueprintResult};
use crate::model::{TemplateConfig, TEMPLATE_EXTENSION};
use crate::output::GeneratedBlueprint;
use crate::prepare::PreparedData;
use crate::repository::BlueprintRepository;
use crate::resolver::FieldResolver;

/// Directories whose plain files are never copied to the output.
pub const IGNORED_PATHS: &[&str] = &["__test__"];

/// Renders blueprint files into an output directory.
#[derive(Debug)]
pub struct TemplateRenderer<'a> {
    resolver: FieldResolver<'a>,
}

impl<'a> TemplateRenderer<'a> {
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        Self {
            resolver: FieldResolver::new(functions),
        }
    }

    /// Render or copy every file whose `writeIf` holds.
    ///
    /// Returns the number of files written.
    pub fn render(
        &self,
        files: &[TemplateConfig],
        data: &PreparedData,
        repository: &dyn BlueprintRepository,
        output: &mut GeneratedBlueprint,
    ) -> BlueprintResult<usize> {
        let mut written = 0;

        for file in files {
            if !self
                .resolver
                .resolve_bool(&file.path, "writeIf", &file.depends_on, &data.summary_data)?
            {
                info!("Skipping file {}: writeIf not met", file.path);
                continue;
            }

            let target = self.output_path(file, data)?;
            let content = repository.get_file_contents(&file.full_path)?;

            if file.is_template() {
                let source =
                    String::from_utf8(content).map_err(|e| BlueprintError::Render {
                        path: file.full_path.clone(),
                        message: format!("template is not valid UTF-8: {}", e),
                    })?;
                let rendered = render_content(&file.full_path, &source, &data.template_data)?;
                let target = target
                    .strip_suffix(TEMPLATE_EXTENSION)
                    .unwrap_or(&target)
                    .to_string();
                output.write_file(&target, rendered.trim().as_bytes())?;
                debug!("Rendered {} -> {}", file.full_path, target);
            } else if is_ignored(&file.full_path) {
                debug!("Not copying {}: ignored directory", file.full_path);
                continue;
            } else {
                output.write_file(&target, &content)?;
                debug!("Copied {} -> {}", file.full_path, target);
            }
            written += 1;
        }

        Ok(written)
    }

    fn output_path(&self, file: &TemplateConfig, data: &PreparedData) -> BlueprintResult<String> {
        if !file.rename_to.is_set() {
            return Ok(file.path.clone());
        }
        let renamed = self
            .resolver
            .resolve_value(&file.path, "renameTo", &file.rename_to, &data.summary_data)?;
        if renamed.is_empty() {
            Ok(file.path.clone())
        } else {
            Ok(renamed)
        }
    }
}

/// Render a template body against the template data.
pub fn render_content(
    name: &str,
    content: &str,
    template_data: &BTreeMap<String, Json>,
) -> BlueprintResult<String> {
    let context = Context::from_serialize(template_data).map_err(|e| render_error(name, &e))?;
    let mut tera = Tera::default();
    tera.register_filter("kebabcase", case_filter(to_kebab_case));
    tera.register_filter("snakecase", case_filter(to_snake_case));
    tera.register_filter("pascalcase", case_filter(to_pascal_case));
    tera.render_str(content, &context)
        .map_err(|e| render_error(name, &e))
}

fn render_error(name: &str, error: &tera::Error) -> BlueprintError {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    BlueprintError::Render {
        path: name.to_string(),
        message,
    }
}

fn is_ignored(full_path: &str) -> bool {
    let parent = full_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let base = parent.rsplit('/').next().unwrap_or("");
    IGNORED_PATHS.contains(&base)
}

fn case_filter(convert: fn(&str) -> String) -> impl tera::Filter + 'static {
    move |value: &tera::Value, _args: &HashMap<String, tera::Value>| -> tera::Result<tera::Value> {
        let text = match value {
            tera::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(tera::Value::String(convert(&text)))
    }
}

fn words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in s.chars() {
        if c == '-' || c == '_' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Convert to kebab-case.
pub fn to_kebab_case(s: &str) -> String {
    words(s).join("-")
}

/// Convert to snake_case.
pub fn to_snake_case(s: &str) -> String {
    words(s).join("_")
}

/// Convert to PascalCase.
pub fn to_pascal_case(s: &str) -> String {
    words(s)
        .iter()
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect()
}
