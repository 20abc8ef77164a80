//! End-to-end blueprint instantiation.

use std::path::PathBuf;

use forge_functions::FunctionRegistry;
use tracing::info;

use crate::composer::Composer;
use crate::error::BlueprintResult;
use crate::output::GeneratedBlueprint;
use crate::prepare::{PrepareOptions, Preparer, Prompter};
use crate::renderer::TemplateRenderer;
use crate::repository::BlueprintRepository;
use crate::varfield::VarField;

/// What to instantiate and where.
#[derive(Debug, Clone, Default)]
pub struct InstantiateOptions {
    /// Repository path of the blueprint.
    pub blueprint: String,
    /// Directory the files are written to.
    pub output_dir: PathBuf,
    pub prepare: PrepareOptions,
}

impl InstantiateOptions {
    pub fn new(blueprint: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            blueprint: blueprint.into(),
            output_dir: output_dir.into(),
            prepare: PrepareOptions::default(),
        }
    }

    pub fn with_prepare(mut self, prepare: PrepareOptions) -> Self {
        self.prepare = prepare;
        self
    }
}

/// Outcome of an instantiation.
#[derive(Debug, Clone, Default)]
pub struct InstantiateReport {
    /// Blueprints that made up the composition, in emission order.
    pub blueprints: Vec<String>,
    pub created_files: Vec<PathBuf>,
    /// Instructions of the requested blueprint, possibly empty.
    pub instructions: String,
}

/// Compose, prepare and render a blueprint.
pub fn instantiate_blueprint(
    options: &InstantiateOptions,
    repository: &dyn BlueprintRepository,
    functions: &FunctionRegistry,
    prompter: &mut dyn Prompter,
) -> BlueprintResult<InstantiateReport> {
    let composer = Composer::new(repository)?;
    let (composed, root) = composer.resolve(&options.blueprint, VarField::default(), "")?;

    let preparer = Preparer::new(functions, options.prepare.clone());
    let (data, merged) = preparer.prepare(&composed, prompter)?;

    let mut output = GeneratedBlueprint::new(&options.output_dir);
    output.write_value_files(&data)?;
    let written = TemplateRenderer::new(functions).render(
        &merged.template_configs,
        &data,
        repository,
        &mut output,
    )?;

    info!(
        "Blueprint {} instantiated: {} file(s) rendered into {:?}",
        options.blueprint, written, options.output_dir
    );

    Ok(InstantiateReport {
        blueprints: composed.into_iter().map(|node| node.name).collect(),
        created_files: output.created_files().to_vec(),
        instructions: root.metadata.instructions,
    })
}
