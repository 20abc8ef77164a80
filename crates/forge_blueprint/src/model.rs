//! Blueprint definition model.
//!
//! A blueprint definition is decoded into a [`BlueprintConfig`] holding its
//! metadata, parameters ([`Variable`]), files ([`TemplateConfig`]) and
//! inclusions of other blueprints ([`IncludedBlueprint`]).

use std::fmt;

use crate::varfield::VarField;

/// Recognized blueprint schema version.
pub const API_VERSION: &str = "forge/v1";

/// Required document kind.
pub const KIND: &str = "Blueprint";

/// Suffix marking a file as a template to render.
pub const TEMPLATE_EXTENSION: &str = ".tmpl";

/// Parameter types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VariableType {
    /// Single-line free text.
    #[default]
    Input,
    /// Multi-line free text.
    Editor,
    /// One of a list of options.
    Select,
    /// Yes/no question.
    Confirm,
    /// Masked free text stored as a secret.
    SecretInput,
}

impl VariableType {
    /// All recognized type names.
    pub const NAMES: [&'static str; 5] = ["Input", "Editor", "Select", "Confirm", "SecretInput"];

    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::Input => "Input",
            VariableType::Editor => "Editor",
            VariableType::Select => "Select",
            VariableType::Confirm => "Confirm",
            VariableType::SecretInput => "SecretInput",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Input" => Some(VariableType::Input),
            "Editor" => Some(VariableType::Editor),
            "Select" => Some(VariableType::Select),
            "Confirm" => Some(VariableType::Confirm),
            "SecretInput" => Some(VariableType::SecretInput),
            _ => None,
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, VariableType::SecretInput)
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One blueprint parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub label: String,
    pub var_type: VariableType,
    pub prompt: String,
    pub description: String,
    pub default: VarField,
    pub value: VarField,
    /// `promptIf`: the variable is only asked when this holds.
    pub depends_on: VarField,
    pub options: Vec<VarField>,
    pub pattern: String,
    /// Persist the answer in the non-secret values file.
    pub save_in_values: bool,
    /// Put a secret's clear value in the template data instead of a reference.
    pub replace_as_is: bool,
}

impl Variable {
    /// Create a variable; the label defaults to the name.
    pub fn new(name: impl Into<String>, var_type: VariableType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            var_type,
            ..Self::default()
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_default(mut self, default: VarField) -> Self {
        self.default = default;
        self
    }

    pub fn with_value(mut self, value: VarField) -> Self {
        self.value = value;
        self
    }

    pub fn with_depends_on(mut self, depends_on: VarField) -> Self {
        self.depends_on = depends_on;
        self
    }

    pub fn with_options(mut self, options: Vec<VarField>) -> Self {
        self.options = options;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn save_in_values(mut self, save: bool) -> Self {
        self.save_in_values = save;
        self
    }

    pub fn is_secret(&self) -> bool {
        self.var_type.is_secret()
    }

    /// Text shown when asking for this variable.
    pub fn question(&self) -> String {
        if !self.prompt.is_empty() {
            self.prompt.clone()
        } else if !self.description.is_empty() {
            self.description.clone()
        } else {
            format!("What is the value of {}?", self.name)
        }
    }
}

/// A file shipped with a blueprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateConfig {
    /// Path relative to the blueprint directory.
    pub path: String,
    /// Path in the repository, `<blueprint>/<path>`.
    pub full_path: String,
    /// `writeIf`: the file is only written when this holds.
    pub depends_on: VarField,
    /// Output path override.
    pub rename_to: VarField,
}

impl TemplateConfig {
    pub fn new(path: impl Into<String>, blueprint_path: &str) -> Self {
        let path = path.into();
        Self {
            full_path: join_repo_path(blueprint_path, &path),
            path,
            ..Self::default()
        }
    }

    pub fn is_template(&self) -> bool {
        self.path.ends_with(TEMPLATE_EXTENSION)
    }
}

/// Where an included blueprint's contributions go relative to the includer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    Before,
    #[default]
    After,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Before => "before",
            Stage::After => "after",
        }
    }
}

/// One inclusion edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludedBlueprint {
    pub blueprint: String,
    pub stage: Stage,
    pub parameter_overrides: Vec<Variable>,
    pub file_overrides: Vec<TemplateConfig>,
    /// `includeIf`: the whole included subtree is skipped unless this holds.
    pub depends_on: VarField,
}

impl IncludedBlueprint {
    pub fn new(blueprint: impl Into<String>, stage: Stage) -> Self {
        Self {
            blueprint: blueprint.into(),
            stage,
            ..Self::default()
        }
    }
}

/// Descriptive metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
    /// Shown to the user after generation.
    pub instructions: String,
}

/// A parsed blueprint definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlueprintConfig {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub variables: Vec<Variable>,
    pub template_configs: Vec<TemplateConfig>,
    pub include: Vec<IncludedBlueprint>,
}

impl BlueprintConfig {
    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Inclusions of the given stage, in declaration order.
    pub fn includes(&self, stage: Stage) -> impl Iterator<Item = &IncludedBlueprint> {
        self.include.iter().filter(move |i| i.stage == stage)
    }
}

/// Join `/`-separated repository path segments.
pub fn join_repo_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}
