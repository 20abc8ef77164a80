//! Data preparation.
//!
//! Walks the composed blueprints in order and settles a value for every
//! variable: from its fixed `value`, its default, an answers file or the
//! user. The result is split into the maps the renderer and the output
//! writers consume.

use std::collections::{BTreeMap, HashMap, HashSet};

use forge_functions::FunctionRegistry;
use regex::Regex;
use serde::Serialize;
use serde_json::Value as Json;
use serde_yaml::Value as Yaml;
use tracing::{debug, info, warn};

use crate::composer::ComposedBlueprint;
use crate::error::{BlueprintError, BlueprintResult};
use crate::model::{BlueprintConfig, Variable, VariableType};
use crate::resolver::{parse_bool, FieldResolver, ResolvedOption};
use crate::varfield::{canonical_number, VarField};

/// Something to ask the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Variable name.
    pub name: String,
    /// Text shown to the user.
    pub message: String,
    pub var_type: VariableType,
    /// Resolved default, possibly empty.
    pub default: String,
    /// Resolved options for `Select`.
    pub options: Vec<ResolvedOption>,
    /// Validation pattern for free-text answers, possibly empty.
    pub pattern: String,
}

/// A user's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Confirm(bool),
}

/// Asks the user for variable values.
pub trait Prompter {
    fn ask(&mut self, question: &Question) -> BlueprintResult<Answer>;
}

/// Options controlling where answers come from.
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// Answers keyed by variable name.
    pub answers: Option<BTreeMap<String, String>>,
    /// Every asked variable must have an answer and every answer a variable.
    pub strict_answers: bool,
    /// Take defaults instead of asking.
    pub use_defaults: bool,
}

impl PrepareOptions {
    pub fn with_answers(mut self, answers: BTreeMap<String, String>) -> Self {
        self.answers = Some(answers);
        self
    }

    pub fn strict_answers(mut self, strict: bool) -> Self {
        self.strict_answers = strict;
        self
    }

    pub fn use_defaults(mut self, use_defaults: bool) -> Self {
        self.use_defaults = use_defaults;
        self
    }
}

/// The data collected for one blueprint run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreparedData {
    /// Data handed to templates; secrets appear as `!value <Name>` references.
    pub template_data: BTreeMap<String, Json>,
    /// Every answer in clear, used for conditions.
    pub summary_data: BTreeMap<String, Json>,
    /// Non-secret answers to persist.
    pub values: BTreeMap<String, String>,
    /// Secret answers to persist.
    pub secrets: BTreeMap<String, String>,
}

impl PreparedData {
    fn store(&mut self, variable: &Variable, value: Json) {
        let text = json_text(&value);
        self.summary_data.insert(variable.name.clone(), value.clone());

        if variable.is_secret() {
            let reference = if variable.replace_as_is {
                value
            } else {
                Json::String(format!("!value {}", variable.name))
            };
            self.template_data.insert(variable.name.clone(), reference);
            self.secrets.insert(variable.name.clone(), text);
        } else {
            self.template_data.insert(variable.name.clone(), value);
            if variable.save_in_values {
                self.values.insert(variable.name.clone(), text);
            }
        }
    }
}

/// Settles variable values for a composed blueprint.
#[derive(Debug)]
pub struct Preparer<'a> {
    resolver: FieldResolver<'a>,
    options: PrepareOptions,
}

impl<'a> Preparer<'a> {
    pub fn new(functions: &'a FunctionRegistry, options: PrepareOptions) -> Self {
        Self {
            resolver: FieldResolver::new(functions),
            options,
        }
    }

    /// Prepare data for composed blueprints in emission order.
    ///
    /// Returns the data and the merged configuration of every admitted
    /// blueprint.
    pub fn prepare(
        &self,
        composed: &[ComposedBlueprint],
        prompter: &mut dyn Prompter,
    ) -> BlueprintResult<(PreparedData, BlueprintConfig)> {
        let mut data = PreparedData::default();
        let mut merged = BlueprintConfig::default();
        let mut index: HashMap<String, usize> = HashMap::new();

        for node in composed {
            if node.parent.is_empty() {
                merged.api_version = node.config.api_version.clone();
                merged.kind = node.config.kind.clone();
                merged.metadata = node.config.metadata.clone();
            }

            if !self.admitted(node, &data)? {
                info!("Skipping blueprint {}: inclusion condition not met", node.name);
                continue;
            }
            debug!("Preparing variables of blueprint {}", node.name);

            for variable in &node.config.variables {
                let mut variable = variable.clone();
                self.prepare_variable(&mut variable, &mut data, prompter)?;

                match index.get(&variable.name) {
                    Some(&i) => merged.variables[i] = variable,
                    None => {
                        index.insert(variable.name.clone(), merged.variables.len());
                        merged.variables.push(variable);
                    }
                }
            }
            merged
                .template_configs
                .extend(node.config.template_configs.iter().cloned());
        }

        if self.options.strict_answers {
            if let Some(answers) = &self.options.answers {
                // Variables of skipped includes are still declared.
                let declared: HashSet<&str> = composed
                    .iter()
                    .flat_map(|node| node.config.variables.iter())
                    .map(|v| v.name.as_str())
                    .collect();
                let unknown: Vec<&str> = answers
                    .keys()
                    .filter(|key| !declared.contains(key.as_str()))
                    .map(String::as_str)
                    .collect();
                if !unknown.is_empty() {
                    return Err(BlueprintError::UnknownAnswers(unknown.join(", ")));
                }
            }
        }

        info!(
            "Prepared {} variable(s), {} value(s), {} secret(s)",
            merged.variables.len(),
            data.values.len(),
            data.secrets.len()
        );
        Ok((data, merged))
    }

    fn admitted(&self, node: &ComposedBlueprint, data: &PreparedData) -> BlueprintResult<bool> {
        for gate in node.gates() {
            if !self
                .resolver
                .resolve_bool(&node.name, "includeIf", gate, &data.summary_data)?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn prepare_variable(
        &self,
        variable: &mut Variable,
        data: &mut PreparedData,
        prompter: &mut dyn Prompter,
    ) -> BlueprintResult<()> {
        let name = variable.name.clone();

        if !self
            .resolver
            .resolve_bool(&name, "promptIf", &variable.depends_on, &data.summary_data)?
        {
            debug!("Skipping variable {}: promptIf not met", name);
            if !data.summary_data.contains_key(&name) {
                let empty = match variable.var_type {
                    VariableType::Confirm => Json::Bool(false),
                    _ => Json::String(String::new()),
                };
                data.summary_data.insert(name.clone(), empty.clone());
                data.template_data.insert(name, empty);
            }
            return Ok(());
        }

        let default = match self
            .resolver
            .resolve_value(&name, "default", &variable.default, &data.summary_data)
        {
            Ok(default) => default,
            Err(e) => {
                warn!("Default of {} could not be resolved: {}", name, e);
                String::new()
            }
        };

        let value = if variable.value.is_set() {
            let text = self
                .resolver
                .resolve_value(&name, "value", &variable.value, &data.summary_data)?;
            typed(variable, text)?
        } else if self.options.use_defaults {
            self.default_answer(variable, default, data)?
        } else if let Some(answer) = self.options.answers.as_ref().and_then(|a| a.get(&name)) {
            validate_pattern(variable, answer)?;
            self.validate_option(variable, answer, data)?;
            typed(variable, answer.clone())?
        } else if self.options.strict_answers && self.options.answers.is_some() {
            return Err(BlueprintError::MissingAnswer(name));
        } else {
            let question = Question {
                name: name.clone(),
                message: variable.question(),
                var_type: variable.var_type,
                default,
                options: self.options_for(variable, data)?,
                pattern: variable.pattern.clone(),
            };
            match prompter.ask(&question)? {
                Answer::Confirm(b) => Json::Bool(b),
                Answer::Text(text) => {
                    validate_pattern(variable, &text)?;
                    typed(variable, text)?
                }
            }
        };

        if let (VariableType::Confirm, Json::Bool(b)) = (variable.var_type, &value) {
            variable.value = VarField::from_bool(*b);
        }
        data.store(variable, value);
        Ok(())
    }

    fn default_answer(
        &self,
        variable: &Variable,
        default: String,
        data: &PreparedData,
    ) -> BlueprintResult<Json> {
        match variable.var_type {
            VariableType::Confirm => Ok(Json::Bool(parse_bool(&default).unwrap_or(false))),
            VariableType::Select if default.is_empty() => {
                let first = self
                    .options_for(variable, data)?
                    .into_iter()
                    .next()
                    .map(|o| o.value)
                    .unwrap_or_default();
                Ok(Json::String(first))
            }
            _ => Ok(Json::String(default)),
        }
    }

    /// Answers for `Select` must name one of the resolved options.
    fn validate_option(
        &self,
        variable: &Variable,
        answer: &str,
        data: &PreparedData,
    ) -> BlueprintResult<()> {
        let options = self.options_for(variable, data)?;
        if options.is_empty() || options.iter().any(|o| o.value == answer) {
            return Ok(());
        }
        let allowed: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
        Err(BlueprintError::InvalidAnswer {
            variable: variable.name.clone(),
            message: format!("'{}' is not one of: {}", answer, allowed.join(", ")),
        })
    }

    fn options_for(
        &self,
        variable: &Variable,
        data: &PreparedData,
    ) -> BlueprintResult<Vec<ResolvedOption>> {
        if variable.var_type != VariableType::Select {
            return Ok(Vec::new());
        }
        self.resolver
            .resolve_options(&variable.name, &variable.options, &data.summary_data)
    }
}

fn typed(variable: &Variable, text: String) -> BlueprintResult<Json> {
    if variable.var_type != VariableType::Confirm {
        return Ok(Json::String(text));
    }
    parse_bool(&text)
        .map(Json::Bool)
        .ok_or_else(|| BlueprintError::InvalidAnswer {
            variable: variable.name.clone(),
            message: format!("'{}' is not a boolean", text),
        })
}

fn validate_pattern(variable: &Variable, text: &str) -> BlueprintResult<()> {
    if variable.pattern.is_empty() || variable.var_type == VariableType::Confirm {
        return Ok(());
    }
    let pattern = Regex::new(&variable.pattern).map_err(|e| BlueprintError::InvalidAnswer {
        variable: variable.name.clone(),
        message: e.to_string(),
    })?;
    if pattern.is_match(text) {
        Ok(())
    } else {
        Err(BlueprintError::InvalidAnswer {
            variable: variable.name.clone(),
            message: format!("'{}' does not match pattern {}", text, variable.pattern),
        })
    }
}

fn json_text(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse an answers file: a YAML mapping of variable name to scalar.
pub fn parse_answers(content: &str) -> BlueprintResult<BTreeMap<String, String>> {
    let document: Yaml = serde_yaml::from_str(content)?;
    let mapping = match document {
        Yaml::Mapping(mapping) => mapping,
        Yaml::Null => return Ok(BTreeMap::new()),
        _ => return Err(BlueprintError::schema("answers file must be a mapping")),
    };

    let mut answers = BTreeMap::new();
    for (key, value) in mapping {
        let Yaml::String(key) = key else {
            return Err(BlueprintError::schema("answers file keys must be strings"));
        };
        let text = match value {
            Yaml::Null => String::new(),
            Yaml::Bool(b) => b.to_string(),
            Yaml::Number(n) => canonical_number(&n),
            Yaml::String(s) => s,
            _ => {
                return Err(BlueprintError::schema(format!(
                    "answer for [{}] must be a scalar value",
                    key
                )))
            }
        };
        answers.insert(key, text);
    }
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TemplateConfig;
    use mockall::mock;

    mock! {
        pub TestPrompter {}

        impl Prompter for TestPrompter {
            fn ask(&mut self, question: &Question) -> BlueprintResult<Answer>;
        }
    }

    fn node(name: &str, variables: Vec<Variable>) -> ComposedBlueprint {
        ComposedBlueprint {
            name: name.to_string(),
            config: BlueprintConfig {
                variables,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn no_prompts() -> MockTestPrompter {
        let mut prompter = MockTestPrompter::new();
        prompter.expect_ask().never();
        prompter
    }

    #[test]
    fn test_prompts_and_stores() {
        let registry = FunctionRegistry::new();
        let preparer = Preparer::new(&registry, PrepareOptions::default());
        let composed = vec![node(
            "app",
            vec![
                Variable::new("AppName", VariableType::Input).save_in_values(true),
                Variable::new("UseCache", VariableType::Confirm),
                Variable::new("Password", VariableType::SecretInput),
            ],
        )];

        let mut prompter = MockTestPrompter::new();
        prompter
            .expect_ask()
            .withf(|q| q.name == "AppName")
            .times(1)
            .returning(|q| {
                assert_eq!(q.message, "What is the value of AppName?");
                Ok(Answer::Text("shop".into()))
            });
        prompter
            .expect_ask()
            .withf(|q| q.name == "UseCache")
            .times(1)
            .returning(|_| Ok(Answer::Confirm(true)));
        prompter
            .expect_ask()
            .withf(|q| q.name == "Password")
            .times(1)
            .returning(|_| Ok(Answer::Text("s3cret".into())));

        let (data, merged) = preparer.prepare(&composed, &mut prompter).unwrap();

        assert_eq!(data.template_data["AppName"], Json::String("shop".into()));
        assert_eq!(data.template_data["UseCache"], Json::Bool(true));
        assert_eq!(data.template_data["Password"], Json::String("!value Password".into()));
        assert_eq!(data.summary_data["Password"], Json::String("s3cret".into()));
        assert_eq!(data.values.get("AppName").map(String::as_str), Some("shop"));
        assert!(!data.values.contains_key("Password"));
        assert_eq!(data.secrets.get("Password").map(String::as_str), Some("s3cret"));
        assert_eq!(merged.variable("UseCache").unwrap().value, VarField::from_bool(true));
    }

    #[test]
    fn test_replace_as_is_secret() {
        let registry = FunctionRegistry::new();
        let options = PrepareOptions::default().use_defaults(true);
        let preparer = Preparer::new(&registry, options);
        let mut token = Variable::new("Token", VariableType::SecretInput)
            .with_value(VarField::literal("abc"));
        token.replace_as_is = true;

        let (data, _) = preparer
            .prepare(&[node("app", vec![token])], &mut no_prompts())
            .unwrap();
        assert_eq!(data.template_data["Token"], Json::String("abc".into()));
        assert_eq!(data.secrets["Token"], "abc");
    }

    #[test]
    fn test_prompt_if_false_records_empty() {
        let registry = FunctionRegistry::new();
        let preparer = Preparer::new(&registry, PrepareOptions::default());
        let composed = vec![node(
            "app",
            vec![
                Variable::new("Enabled", VariableType::Confirm).with_value(VarField::from_bool(false)),
                Variable::new("Port", VariableType::Input)
                    .with_depends_on(VarField::literal("Enabled")),
                Variable::new("Fast", VariableType::Confirm)
                    .with_depends_on(VarField::literal("Enabled")),
            ],
        )];

        let (data, _) = preparer.prepare(&composed, &mut no_prompts()).unwrap();
        assert_eq!(data.summary_data["Port"], Json::String(String::new()));
        assert_eq!(data.summary_data["Fast"], Json::Bool(false));
        assert!(data.values.is_empty());
    }

    #[test]
    fn test_use_defaults() {
        let registry = FunctionRegistry::new();
        let preparer = Preparer::new(&registry, PrepareOptions::default().use_defaults(true));
        let composed = vec![node(
            "app",
            vec![
                Variable::new("Test", VariableType::Input)
                    .with_default(VarField::literal("lala"))
                    .save_in_values(true),
                Variable::new("Size", VariableType::Select).with_options(vec![
                    VarField::literal("small"),
                    VarField::literal("large"),
                ]),
                Variable::new("Broken", VariableType::Input)
                    .with_default(VarField::function("nowhere.x()")),
                Variable::new("Double", VariableType::Input)
                    .with_default(VarField::expression("strlen(Test) * 2")),
            ],
        )];

        let (data, _) = preparer.prepare(&composed, &mut no_prompts()).unwrap();
        assert_eq!(data.values["Test"], "lala");
        assert_eq!(data.summary_data["Size"], Json::String("small".into()));
        assert_eq!(data.summary_data["Broken"], Json::String(String::new()));
        assert_eq!(data.summary_data["Double"], Json::String("8".into()));
    }

    #[test]
    fn test_answers_file() {
        let registry = FunctionRegistry::new();
        let answers = parse_answers("Name: shop\nUseCache: true\nReplicas: 3\n").unwrap();
        let preparer = Preparer::new(&registry, PrepareOptions::default().with_answers(answers));
        let composed = vec![node(
            "app",
            vec![
                Variable::new("Name", VariableType::Input).with_pattern("^[a-z]+$"),
                Variable::new("UseCache", VariableType::Confirm),
                Variable::new("Replicas", VariableType::Input),
                Variable::new("Asked", VariableType::Input),
            ],
        )];

        let mut prompter = MockTestPrompter::new();
        prompter
            .expect_ask()
            .withf(|q| q.name == "Asked")
            .times(1)
            .returning(|_| Ok(Answer::Text("yes".into())));

        let (data, _) = preparer.prepare(&composed, &mut prompter).unwrap();
        assert_eq!(data.summary_data["UseCache"], Json::Bool(true));
        assert_eq!(data.summary_data["Replicas"], Json::String("3".into()));
        assert_eq!(data.summary_data["Asked"], Json::String("yes".into()));
    }

    #[test]
    fn test_invalid_answers() {
        let registry = FunctionRegistry::new();
        let composed = vec![node(
            "app",
            vec![Variable::new("Name", VariableType::Input).with_pattern("^[a-z]+$")],
        )];
        let answers = parse_answers("Name: Shop-1\n").unwrap();
        let preparer = Preparer::new(&registry, PrepareOptions::default().with_answers(answers));
        let err = preparer.prepare(&composed, &mut no_prompts()).unwrap_err();
        assert!(matches!(err, BlueprintError::InvalidAnswer { .. }));

        let composed = vec![node("app", vec![Variable::new("Flag", VariableType::Confirm)])];
        let answers = parse_answers("Flag: maybe\n").unwrap();
        let preparer = Preparer::new(&registry, PrepareOptions::default().with_answers(answers));
        assert!(preparer.prepare(&composed, &mut no_prompts()).is_err());
    }

    #[test]
    fn test_strict_answers() {
        let registry = FunctionRegistry::new();
        let composed = vec![node(
            "app",
            vec![
                Variable::new("A", VariableType::Input),
                Variable::new("B", VariableType::Input),
            ],
        )];

        let options = PrepareOptions::default()
            .with_answers(parse_answers("A: x\n").unwrap())
            .strict_answers(true);
        let err = Preparer::new(&registry, options)
            .prepare(&composed, &mut no_prompts())
            .unwrap_err();
        assert!(matches!(err, BlueprintError::MissingAnswer(ref name) if name == "B"));

        let options = PrepareOptions::default()
            .with_answers(parse_answers("A: x\nB: y\nC: z\n").unwrap())
            .strict_answers(true);
        let err = Preparer::new(&registry, options)
            .prepare(&composed, &mut no_prompts())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "answers file contains keys that match no variable: C"
        );
    }

    #[test]
    fn test_strict_answers_accepts_skipped_include_variables() {
        let registry = FunctionRegistry::new();
        let root = node("root", vec![Variable::new("Deploy", VariableType::Confirm)]);
        let mut gated = node("gated", vec![Variable::new("Cluster", VariableType::Input)]);
        gated.parent = "root".into();
        gated.depends_on = VarField::literal("Deploy");

        let options = PrepareOptions::default()
            .with_answers(parse_answers("Deploy: \"false\"\nCluster: c1\n").unwrap())
            .strict_answers(true);
        let (data, merged) = Preparer::new(&registry, options)
            .prepare(&[root, gated], &mut no_prompts())
            .unwrap();

        assert_eq!(data.summary_data["Deploy"], Json::Bool(false));
        assert!(!data.summary_data.contains_key("Cluster"));
        assert!(merged.variable("Cluster").is_none());
    }

    #[test]
    fn test_select_answer_must_be_an_option() {
        let registry = FunctionRegistry::new();
        let composed = vec![node(
            "app",
            vec![Variable::new("Size", VariableType::Select).with_options(vec![
                VarField::literal("small"),
                VarField::literal("large"),
            ])],
        )];

        let answers = parse_answers("Size: large\n").unwrap();
        let preparer = Preparer::new(&registry, PrepareOptions::default().with_answers(answers));
        let (data, _) = preparer.prepare(&composed, &mut no_prompts()).unwrap();
        assert_eq!(data.summary_data["Size"], Json::String("large".into()));

        let answers = parse_answers("Size: huge\n").unwrap();
        let preparer = Preparer::new(&registry, PrepareOptions::default().with_answers(answers));
        let err = preparer.prepare(&composed, &mut no_prompts()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid answer for variable [Size]: 'huge' is not one of: small, large"
        );
    }

    #[test]
    fn test_node_gates_and_merge() {
        let registry = FunctionRegistry::new();
        let preparer = Preparer::new(&registry, PrepareOptions::default().use_defaults(true));

        let mut root = node(
            "root",
            vec![
                Variable::new("Deploy", VariableType::Confirm).with_value(VarField::from_bool(false)),
                Variable::new("Shared", VariableType::Input).with_default(VarField::literal("one")),
            ],
        );
        root.config.template_configs = vec![TemplateConfig::new("root.txt", "root")];

        let mut gated = node(
            "gated",
            vec![Variable::new("Cluster", VariableType::Input).with_default(VarField::literal("c1"))],
        );
        gated.parent = "root".into();
        gated.depends_on = VarField::literal("Deploy");
        gated.config.template_configs = vec![TemplateConfig::new("gated.txt", "gated")];

        let mut after = node(
            "after",
            vec![Variable::new("Shared", VariableType::Input).with_default(VarField::literal("two"))],
        );
        after.parent = "root".into();
        after.config.template_configs = vec![TemplateConfig::new("after.txt", "after")];

        let (data, merged) = preparer
            .prepare(&[root, gated, after], &mut no_prompts())
            .unwrap();

        assert!(!data.summary_data.contains_key("Cluster"));
        assert_eq!(data.summary_data["Shared"], Json::String("two".into()));
        let names: Vec<&str> = merged.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["Deploy", "Shared"]);
        assert_eq!(merged.variables[1].default, VarField::literal("two"));
        let files: Vec<&str> = merged.template_configs.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(files, vec!["root.txt", "after.txt"]);
    }

    #[test]
    fn test_parse_answers_shapes() {
        assert!(parse_answers("").unwrap().is_empty());
        assert!(parse_answers("- a\n- b\n").is_err());
        assert!(parse_answers("A: [1, 2]\n").is_err());
        assert_eq!(parse_answers("F: 1.5\n").unwrap()["F"], "1.500000");
    }
}
