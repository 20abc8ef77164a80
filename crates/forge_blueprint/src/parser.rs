//! Blueprint definition parser.
//!
//! The document is read into a generic YAML tree (custom tags preserved)
//! and decoded field by field. Keys that are not part of the schema are
//! rejected.

use std::collections::HashSet;

use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{BlueprintError, BlueprintResult};
use crate::model::{
    BlueprintConfig, IncludedBlueprint, Metadata, Stage, TemplateConfig, Variable, VariableType,
    API_VERSION, KIND,
};
use crate::varfield::{decode_dependency, decode_field, VarField};

const TOP_LEVEL_KEYS: &[&str] = &["apiVersion", "kind", "metadata", "spec"];
const METADATA_KEYS: &[&str] = &["name", "description", "author", "version", "instructions"];
const SPEC_KEYS: &[&str] = &["parameters", "files", "includeBefore", "includeAfter"];
const PARAMETER_KEYS: &[&str] = &[
    "name",
    "label",
    "type",
    "prompt",
    "description",
    "default",
    "value",
    "promptIf",
    "options",
    "pattern",
    "saveInXlvals",
    "replaceAsIs",
];
const OPTION_KEYS: &[&str] = &["label", "value"];
const FILE_KEYS: &[&str] = &["path", "writeIf", "renameTo"];
const INCLUDE_KEYS: &[&str] = &["blueprint", "includeIf", "parameterOverrides", "fileOverrides"];
const PARAMETER_OVERRIDE_KEYS: &[&str] = &["name", "value", "default", "promptIf"];

/// Parse a blueprint definition document.
///
/// `blueprint_path` is the blueprint's repository path, used to build each
/// file's full path.
pub fn parse_blueprint_metadata(
    content: &[u8],
    blueprint_path: &str,
) -> BlueprintResult<BlueprintConfig> {
    debug!("Parsing blueprint definition for {}", blueprint_path);
    let document: Value = serde_yaml::from_slice(content)?;
    let root = Fields::new(&document, "blueprint definition")?;

    let api_version = root.string("apiVersion")?;
    if api_version != API_VERSION {
        return Err(BlueprintError::schema(format!(
            "api version needs to be {}",
            API_VERSION
        )));
    }
    let kind = root.string("kind")?;
    if kind != KIND {
        return Err(BlueprintError::schema(format!(
            "yaml document kind needs to be {}",
            KIND
        )));
    }
    root.check_keys(TOP_LEVEL_KEYS)?;

    let metadata = match root.get("metadata") {
        Some(value) if !value.is_null() => parse_metadata(value)?,
        _ => Metadata::default(),
    };

    let mut config = BlueprintConfig {
        api_version,
        kind,
        metadata,
        ..BlueprintConfig::default()
    };

    let Some(spec_value) = root.get("spec").filter(|v| !v.is_null()) else {
        return Ok(config);
    };
    let spec = Fields::new(spec_value, "spec")?;
    spec.check_keys(SPEC_KEYS)?;

    for (index, parameter) in spec.sequence("parameters")?.iter().enumerate() {
        config.variables.push(parse_variable(parameter, index)?);
    }
    let mut seen = HashSet::new();
    if !config.variables.iter().all(|v| seen.insert(v.name.as_str())) {
        return Err(BlueprintError::schema(
            "variable names must be unique within blueprint 'parameters' definition",
        ));
    }

    for file in spec.sequence("files")? {
        config
            .template_configs
            .push(parse_file(file, blueprint_path, "files")?);
    }

    for (key, stage) in [("includeBefore", Stage::Before), ("includeAfter", Stage::After)] {
        for include in spec.sequence(key)? {
            config.include.push(parse_include(include, stage, blueprint_path)?);
        }
    }

    debug!(
        "Parsed blueprint {}: {} parameter(s), {} file(s), {} include(s)",
        blueprint_path,
        config.variables.len(),
        config.template_configs.len(),
        config.include.len()
    );
    Ok(config)
}

fn parse_metadata(value: &Value) -> BlueprintResult<Metadata> {
    let fields = Fields::new(value, "metadata")?;
    fields.check_keys(METADATA_KEYS)?;
    Ok(Metadata {
        name: fields.string("name")?,
        description: fields.string("description")?,
        author: fields.string("author")?,
        version: fields.string("version")?,
        instructions: fields.string("instructions")?,
    })
}

fn parse_variable(value: &Value, index: usize) -> BlueprintResult<Variable> {
    let fields = Fields::new(value, &format!("parameter #{}", index + 1))?;
    let name = fields.string("name")?;
    let type_name = fields.string("type")?;
    let display_name = if name.is_empty() {
        format!("#{}", index + 1)
    } else {
        name.clone()
    };

    let missing: Vec<&str> = [("name", &name), ("type", &type_name)]
        .into_iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(k, _)| k)
        .collect();
    if !missing.is_empty() {
        return Err(BlueprintError::schema(format!(
            "parameter [{}] is missing required fields: [{}]",
            display_name,
            missing.join(", ")
        )));
    }

    let fields = fields.with_context(format!("parameter [{}]", name));
    fields.check_keys(PARAMETER_KEYS)?;

    let var_type = VariableType::from_str(&type_name).ok_or_else(|| {
        BlueprintError::schema(format!(
            "type [{}] is not valid for parameter [{}]",
            type_name, name
        ))
    })?;

    let mut variable = Variable::new(name.clone(), var_type);
    let label = fields.string("label")?;
    if !label.is_empty() {
        variable.label = label;
    }
    variable.prompt = fields.string("prompt")?;
    variable.description = fields.string("description")?;
    variable.default = fields.field("default")?;
    variable.value = fields.field("value")?;
    variable.depends_on = fields.dependency("promptIf")?;
    variable.pattern = fields.string("pattern")?;
    variable.save_in_values = fields.flag("saveInXlvals")?;
    variable.replace_as_is = fields.flag("replaceAsIs")?;

    for option in fields.sequence("options")? {
        variable.options.push(parse_option(option, &name)?);
    }

    if var_type == VariableType::Select && variable.options.is_empty() {
        return Err(BlueprintError::schema(format!(
            "at least one option field is need to be set for parameter [{}]",
            name
        )));
    }
    if var_type.is_secret() && variable.default.is_set() && !variable.default.is_dynamic() {
        return Err(BlueprintError::schema(format!(
            "secret parameter [{}] cannot have a literal default value, use !fn or !expression",
            name
        )));
    }
    if var_type == VariableType::Confirm
        && variable.default.is_set()
        && !variable.default.is_dynamic()
        && !variable.default.is_bool_literal()
    {
        return Err(BlueprintError::schema(format!(
            "default value of Confirm parameter [{}] must be true or false",
            name
        )));
    }
    if !variable.pattern.is_empty() {
        Regex::new(&variable.pattern).map_err(|e| {
            BlueprintError::schema(format!("invalid pattern for parameter [{}]: {}", name, e))
        })?;
    }

    Ok(variable)
}

fn parse_option(value: &Value, parameter: &str) -> BlueprintResult<VarField> {
    let context = format!("options of parameter [{}]", parameter);
    match value {
        Value::Mapping(_) => {
            let fields = Fields::new(value, &context)?;
            fields.check_keys(OPTION_KEYS)?;
            let option_value = match fields.get("value") {
                Some(v) if !v.is_null() => decode_field(v, &context)?,
                _ => {
                    return Err(BlueprintError::schema(format!(
                        "option of parameter [{}] is missing the 'value' field",
                        parameter
                    )))
                }
            };
            let label = fields.string("label")?;
            Ok(option_value.with_label(label))
        }
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Tagged(_) => {
            decode_field(value, &context)
        }
        _ => Err(BlueprintError::schema(format!(
            "{} must be scalars, tagged values or label/value maps",
            context
        ))),
    }
}

fn parse_file(value: &Value, blueprint_path: &str, context: &str) -> BlueprintResult<TemplateConfig> {
    let fields = Fields::new(value, &format!("file specification in {}", context))?;
    let path = fields.string("path")?;
    if path.is_empty() {
        return Err(BlueprintError::schema(format!(
            "path is missing for file specification in {}",
            context
        )));
    }
    validate_relative_path(&path)?;
    let fields = fields.with_context(format!("file [{}]", path));
    fields.check_keys(FILE_KEYS)?;

    let mut file = TemplateConfig::new(path, blueprint_path);
    file.depends_on = fields.dependency("writeIf")?;
    file.rename_to = fields.field("renameTo")?;
    Ok(file)
}

fn parse_include(
    value: &Value,
    stage: Stage,
    including_path: &str,
) -> BlueprintResult<IncludedBlueprint> {
    let fields = Fields::new(value, &format!("include{:?}", stage))?;
    let blueprint = fields.string("blueprint")?;
    if blueprint.is_empty() {
        return Err(BlueprintError::schema(format!(
            "blueprint is missing for include specification in {}",
            including_path
        )));
    }
    let fields = fields.with_context(format!("include [{}]", blueprint));
    fields.check_keys(INCLUDE_KEYS)?;

    let mut include = IncludedBlueprint::new(blueprint.clone(), stage);
    include.depends_on = fields.dependency("includeIf")?;

    for (index, item) in fields.sequence("parameterOverrides")?.iter().enumerate() {
        include
            .parameter_overrides
            .push(parse_parameter_override(item, index, &blueprint)?);
    }
    for item in fields.sequence("fileOverrides")? {
        include
            .file_overrides
            .push(parse_file(item, &blueprint, "fileOverrides")?);
    }
    Ok(include)
}

fn parse_parameter_override(
    value: &Value,
    index: usize,
    blueprint: &str,
) -> BlueprintResult<Variable> {
    let fields = Fields::new(
        value,
        &format!("parameter override #{} of [{}]", index + 1, blueprint),
    )?;
    let name = fields.string("name")?;
    if name.is_empty() {
        return Err(BlueprintError::schema(format!(
            "parameter override #{} of include [{}] is missing required fields: [name]",
            index + 1,
            blueprint
        )));
    }
    let fields = fields.with_context(format!("parameter override [{}]", name));
    fields.check_keys(PARAMETER_OVERRIDE_KEYS)?;

    let mut variable = Variable::new(name, VariableType::Input);
    variable.value = fields.field("value")?;
    variable.default = fields.field("default")?;
    variable.depends_on = fields.dependency("promptIf")?;
    Ok(variable)
}

fn validate_relative_path(path: &str) -> BlueprintResult<()> {
    if path.starts_with('/') || path.starts_with("..") || path.starts_with("./") {
        return Err(BlueprintError::schema(
            "path for file specification cannot start with /, .. or ./",
        ));
    }
    Ok(())
}

/// A YAML mapping being decoded, with a description for error messages.
struct Fields<'a> {
    map: &'a Mapping,
    context: String,
}

impl<'a> Fields<'a> {
    fn new(value: &'a Value, context: &str) -> BlueprintResult<Self> {
        let map = value.as_mapping().ok_or_else(|| {
            BlueprintError::schema(format!("{} must be a YAML mapping", context))
        })?;
        Ok(Self {
            map,
            context: context.to_string(),
        })
    }

    fn with_context(self, context: String) -> Self {
        Self { context, ..self }
    }

    fn check_keys(&self, allowed: &[&str]) -> BlueprintResult<()> {
        for key in self.map.keys() {
            let Some(key) = key.as_str() else {
                return Err(BlueprintError::schema(format!(
                    "{} contains a non-string key",
                    self.context
                )));
            };
            if !allowed.contains(&key) {
                return Err(BlueprintError::schema(format!(
                    "unknown field [{}] in {}",
                    key, self.context
                )));
            }
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    fn describe(&self, key: &str) -> String {
        format!("'{}' of {}", key, self.context)
    }

    /// Plain scalar as text; absent or null is empty.
    fn string(&self, key: &str) -> BlueprintResult<String> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(_) => Err(BlueprintError::schema(format!(
                "{} must be a plain scalar",
                self.describe(key)
            ))),
        }
    }

    fn flag(&self, key: &str) -> BlueprintResult<bool> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) if s == "true" || s == "false" => Ok(s == "true"),
            Some(_) => Err(BlueprintError::schema(format!(
                "{} must be true or false",
                self.describe(key)
            ))),
        }
    }

    fn field(&self, key: &str) -> BlueprintResult<VarField> {
        match self.get(key) {
            None => Ok(VarField::default()),
            Some(value) => decode_field(value, &self.describe(key)),
        }
    }

    fn dependency(&self, key: &str) -> BlueprintResult<VarField> {
        match self.get(key) {
            None => Ok(VarField::default()),
            Some(value) => decode_dependency(value, &self.describe(key)),
        }
    }

    fn sequence(&self, key: &str) -> BlueprintResult<&'a [Value]> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Sequence(items)) => Ok(items.as_slice()),
            Some(_) => Err(BlueprintError::schema(format!(
                "{} must be a list",
                self.describe(key)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varfield::FieldTag;

    fn parse(yaml: &str) -> BlueprintResult<BlueprintConfig> {
        parse_blueprint_metadata(yaml.as_bytes(), "aws/monolith")
    }

    fn with_parameters(parameters: &str) -> String {
        format!(
            "apiVersion: forge/v1\nkind: Blueprint\nspec:\n  parameters:\n{}",
            parameters
        )
    }

    fn err(yaml: &str) -> String {
        parse(yaml).unwrap_err().to_string()
    }

    #[test]
    fn test_api_version_checked_first() {
        assert_eq!(
            err("apiVersion: forge/v0\nkind: Nope\nspec: 3"),
            "api version needs to be forge/v1"
        );
    }

    #[test]
    fn test_kind() {
        assert_eq!(
            err("apiVersion: forge/v1\nkind: Template"),
            "yaml document kind needs to be Blueprint"
        );
    }

    #[test]
    fn test_full_document() {
        let config = parse(
            r#"
apiVersion: forge/v1
kind: Blueprint
metadata:
  name: Monolith
  description: A monolith on AWS
  author: Platform Team
  version: 2.0
  instructions: |
    Run deploy.sh
    then check the console
spec:
  parameters:
  - name: AppName
    type: Input
    prompt: What is the name of the application?
    pattern: "^[a-z-]+$"
    saveInXlvals: true
  - name: Region
    type: Select
    prompt: Which region?
    options:
      - !fn aws.regions(ecs)
      - label: Frankfurt
        value: eu-central-1
      - 10.5
    default: !fn aws.regions(ecs)[0]
  - name: UseCache
    type: Confirm
    default: false
    promptIf: !expression "AppName != 'test'"
  - name: Password
    type: SecretInput
    default: !fn aws.credentials().SecretAccessKey
  files:
  - path: xld-app.yml.tmpl
    writeIf: UseCache
  - path: cache/redis.yml
    writeIf: "!UseCache"
    renameTo: !expression "AppName + '-redis.yml'"
  includeBefore:
  - blueprint: aws/datalake
    includeIf: !expression "Region == 'eu-central-1'"
    parameterOverrides:
    - name: Bar
      value: hello
      promptIf: !expression "2 > 1"
    fileOverrides:
    - path: xld-infra-env.yml.tmpl
      writeIf: false
  includeAfter:
  - blueprint: k8s/environment
"#,
        )
        .unwrap();

        assert_eq!(config.metadata.name, "Monolith");
        assert_eq!(config.metadata.version, "2.0");
        assert!(config.metadata.instructions.contains("then check the console"));

        assert_eq!(config.variables.len(), 4);
        let app = &config.variables[0];
        assert_eq!(app.label, "AppName");
        assert!(app.save_in_values);

        let region = &config.variables[1];
        assert_eq!(region.options.len(), 3);
        assert_eq!(region.options[0].tag, FieldTag::Fn);
        assert_eq!(region.options[1].label, "Frankfurt");
        assert_eq!(region.options[1].value, "eu-central-1");
        assert_eq!(region.options[2].value, "10.500000");
        assert_eq!(region.default, VarField::function("aws.regions(ecs)[0]"));

        let cache = &config.variables[2];
        assert_eq!(cache.default, VarField::from_bool(false));
        assert_eq!(cache.depends_on, VarField::expression("AppName != 'test'"));

        assert_eq!(config.template_configs[0].full_path, "aws/monolith/xld-app.yml.tmpl");
        assert_eq!(config.template_configs[0].depends_on, VarField::literal("UseCache"));
        assert!(config.template_configs[1].depends_on.invert_bool);
        assert_eq!(config.template_configs[1].rename_to.tag, FieldTag::Expression);

        assert_eq!(config.include.len(), 2);
        let before = &config.include[0];
        assert_eq!(before.stage, Stage::Before);
        assert_eq!(before.parameter_overrides[0].name, "Bar");
        assert_eq!(before.parameter_overrides[0].value, VarField::literal("hello"));
        assert_eq!(
            before.file_overrides[0].depends_on,
            VarField {
                value: "false".into(),
                bool: false,
                ..Default::default()
            }
        );
        assert_eq!(before.file_overrides[0].full_path, "aws/datalake/xld-infra-env.yml.tmpl");
        assert_eq!(config.include[1].stage, Stage::After);
    }

    #[test]
    fn test_missing_type() {
        assert_eq!(
            err(&with_parameters("  - name: Test\n    value: x\n")),
            "parameter [Test] is missing required fields: [type]"
        );
    }

    #[test]
    fn test_invalid_type() {
        assert_eq!(
            err(&with_parameters("  - name: Test\n    type: Invalid\n")),
            "type [Invalid] is not valid for parameter [Test]"
        );
    }

    #[test]
    fn test_select_without_options() {
        assert_eq!(
            err(&with_parameters("  - name: Test\n    type: Select\n    options: []\n")),
            "at least one option field is need to be set for parameter [Test]"
        );
    }

    #[test]
    fn test_option_map_without_value() {
        let e = err(&with_parameters(
            "  - name: Test\n    type: Select\n    options:\n      - label: a\n        key: b\n",
        ));
        assert!(e.contains("unknown field [key]"), "{}", e);
        let e = err(&with_parameters(
            "  - name: Test\n    type: Select\n    options:\n      - label: a\n",
        ));
        assert!(e.contains("'value'"), "{}", e);
    }

    #[test]
    fn test_bool_option_literal() {
        let config = parse(&with_parameters(
            "  - name: Test\n    type: Select\n    options:\n      - a\n      - true\n      - label: Disabled\n        value: false\n",
        ))
        .unwrap();
        let values: Vec<&str> = config.variables[0]
            .options
            .iter()
            .map(|o| o.value.as_str())
            .collect();
        assert_eq!(values, vec!["a", "true", "false"]);
        assert_eq!(config.variables[0].options[2].label, "Disabled");
    }

    #[test]
    fn test_unknown_parameter_field() {
        assert_eq!(
            err(&with_parameters("  - name: Test\n    type: Input\n    defualt: x\n")),
            "unknown field [defualt] in parameter [Test]"
        );
    }

    #[test]
    fn test_unknown_tag() {
        assert!(err(&with_parameters("  - name: Test\n    type: Input\n    value: !foo bar\n"))
            .contains("unknown tag"));
    }

    #[test]
    fn test_duplicate_names() {
        assert_eq!(
            err(&with_parameters(
                "  - name: Test\n    type: Input\n  - name: Test\n    type: Confirm\n"
            )),
            "variable names must be unique within blueprint 'parameters' definition"
        );
    }

    #[test]
    fn test_secret_literal_default_rejected() {
        assert!(parse(&with_parameters(
            "  - name: Pass\n    type: SecretInput\n    default: hunter2\n"
        ))
        .is_err());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(err(&with_parameters("  - name: A\n    type: Input\n    pattern: \"([\"\n"))
            .contains("invalid pattern"));
    }

    #[test]
    fn test_file_path_rules() {
        let base = "apiVersion: forge/v1\nkind: Blueprint\nspec:\n  files:\n";
        assert_eq!(
            err(&format!("{}  - writeIf: x\n", base)),
            "path is missing for file specification in files"
        );
        for bad in ["/etc/passwd", "../x", "./x"] {
            assert_eq!(
                err(&format!("{}  - path: {}\n", base, bad)),
                "path for file specification cannot start with /, .. or ./"
            );
        }
    }

    #[test]
    fn test_empty_spec() {
        let config = parse("apiVersion: forge/v1\nkind: Blueprint\n").unwrap();
        assert!(config.variables.is_empty());
        assert!(config.include.is_empty());
    }
}
