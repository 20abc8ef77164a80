//! # forge_blueprint
//!
//! Blueprint handling for Blueprint Forge.
//!
//! A blueprint is a directory holding a `blueprint.yaml` definition and a
//! set of files. This crate covers the whole path from definition to
//! generated output:
//!
//! - Definition parsing with strict schema checks
//! - Composition of `includeBefore` / `includeAfter` blueprints with
//!   parameter and file overrides
//! - Data preparation from fixed values, defaults, answers files or prompts
//! - Template rendering with Tera, conditional writes and renames
//! - Values and secrets property files
//!
//! ## Example
//!
//! ```rust,no_run
//! use forge_blueprint::{
//!     instantiate_blueprint, Answer, BlueprintResult, InstantiateOptions, LocalRepository,
//!     PrepareOptions, Prompter, Question,
//! };
//! use forge_functions::FunctionRegistry;
//!
//! struct Defaults;
//!
//! impl Prompter for Defaults {
//!     fn ask(&mut self, question: &Question) -> BlueprintResult<Answer> {
//!         Ok(Answer::Text(question.default.clone()))
//!     }
//! }
//!
//! let repository = LocalRepository::new("local", "blueprints");
//! let functions = FunctionRegistry::with_defaults();
//! let options = InstantiateOptions::new("aws/monolith", "out")
//!     .with_prepare(PrepareOptions::default().use_defaults(true));
//!
//! let report = instantiate_blueprint(&options, &repository, &functions, &mut Defaults).unwrap();
//! println!("{}", report.instructions);
//! ```

pub mod composer;
pub mod error;
pub mod instantiate;
pub mod model;
pub mod output;
pub mod parser;
pub mod prepare;
pub mod renderer;
pub mod repository;
pub mod resolver;
pub mod varfield;

pub use composer::{apply_file_overrides, apply_parameter_overrides, ComposedBlueprint, Composer};
pub use error::{BlueprintError, BlueprintResult};
pub use instantiate::{instantiate_blueprint, InstantiateOptions, InstantiateReport};
pub use model::{
    BlueprintConfig, IncludedBlueprint, Metadata, Stage, TemplateConfig, Variable, VariableType,
    API_VERSION, KIND, TEMPLATE_EXTENSION,
};
pub use output::{GeneratedBlueprint, GITIGNORE_FILE, OUTPUT_SUBDIR, SECRETS_FILE, VALUES_FILE};
pub use parser::parse_blueprint_metadata;
pub use prepare::{parse_answers, Answer, PrepareOptions, PreparedData, Preparer, Prompter, Question};
pub use renderer::{TemplateRenderer, IGNORED_PATHS};
pub use repository::{BlueprintRepository, LocalRepository, MemoryRepository, RemoteBlueprint};
pub use resolver::{FieldResolver, ResolvedOption};
pub use varfield::{FieldTag, VarField};
