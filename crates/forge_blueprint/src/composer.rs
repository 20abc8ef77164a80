//! Blueprint composition.
//!
//! Resolving a blueprint produces the ordered list of blueprints that make
//! it up: every `includeBefore` subtree, then the blueprint itself, then
//! every `includeAfter` subtree. Later entries win when their variables
//! are folded into the template data.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::error::{BlueprintError, BlueprintResult};
use crate::model::{BlueprintConfig, IncludedBlueprint, Stage, TemplateConfig, Variable};
use crate::parser::parse_blueprint_metadata;
use crate::repository::{BlueprintRepository, RemoteBlueprint};
use crate::varfield::VarField;

/// One node of a resolved composition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedBlueprint {
    /// Repository path of the blueprint.
    pub name: String,
    /// Path of the including blueprint; empty for the root.
    pub parent: String,
    /// The blueprint's own definition with its includes cleared.
    pub config: BlueprintConfig,
    /// `includeIf` of the edge that included this blueprint.
    pub depends_on: VarField,
    /// `includeIf` conditions of every enclosing edge, outermost first.
    pub inherited_depends_on: Vec<VarField>,
}

impl ComposedBlueprint {
    /// All conditions that must hold for this node to be used.
    pub fn gates(&self) -> impl Iterator<Item = &VarField> {
        self.inherited_depends_on
            .iter()
            .chain(std::iter::once(&self.depends_on))
            .filter(|gate| gate.is_set())
    }
}

/// Resolves blueprints and their includes against a repository.
pub struct Composer<'r> {
    repository: &'r dyn BlueprintRepository,
    blueprints: BTreeMap<String, RemoteBlueprint>,
}

impl<'r> Composer<'r> {
    /// Create a composer, listing the repository once.
    pub fn new(repository: &'r dyn BlueprintRepository) -> BlueprintResult<Self> {
        let blueprints = repository.list_blueprints()?;
        debug!(
            "Repository {} ({}) lists {} blueprint(s)",
            repository.name(),
            repository.provider(),
            blueprints.len()
        );
        Ok(Self {
            repository,
            blueprints,
        })
    }

    /// Blueprints available in the repository.
    pub fn blueprints(&self) -> &BTreeMap<String, RemoteBlueprint> {
        &self.blueprints
    }

    /// Fetch and parse a single blueprint definition.
    pub fn load(&self, name: &str, parent: &str) -> BlueprintResult<BlueprintConfig> {
        let name = normalize_name(name);
        let Some(remote) = self.blueprints.get(&name) else {
            let repository = self.repository.name().to_string();
            return Err(if parent.is_empty() {
                BlueprintError::NotFound { name, repository }
            } else {
                BlueprintError::IncludeNotFound {
                    name,
                    parent: parent.to_string(),
                    repository,
                }
            });
        };

        debug!("Loading blueprint definition {}", remote.definition_file);
        let content = self.repository.get_file_contents(&remote.definition_file)?;
        parse_blueprint_metadata(&content, &remote.path)
    }

    /// Resolve a blueprint into its composed node list.
    ///
    /// Also returns the blueprint's own definition with includes intact.
    pub fn resolve(
        &self,
        name: &str,
        depends_on: VarField,
        parent: &str,
    ) -> BlueprintResult<(Vec<ComposedBlueprint>, BlueprintConfig)> {
        let name = normalize_name(name);
        info!("Resolving blueprint {}", name);
        let config = self.load(&name, parent)?;
        let mut stack = Vec::new();
        let nodes = self.compose(
            &name,
            config.clone(),
            parent,
            depends_on,
            Vec::new(),
            &mut stack,
        )?;
        info!(
            "Blueprint {} composed from {} blueprint(s)",
            name,
            nodes.len()
        );
        Ok((nodes, config))
    }

    fn compose(
        &self,
        name: &str,
        mut config: BlueprintConfig,
        parent: &str,
        depends_on: VarField,
        inherited: Vec<VarField>,
        stack: &mut Vec<String>,
    ) -> BlueprintResult<Vec<ComposedBlueprint>> {
        stack.push(name.to_string());

        let mut child_gates = inherited.clone();
        if depends_on.is_set() {
            child_gates.push(depends_on.clone());
        }

        let mut before = Vec::new();
        for include in config.includes(Stage::Before) {
            before.extend(self.compose_include(include, name, &child_gates, stack)?);
        }
        let mut after = Vec::new();
        for include in config.includes(Stage::After) {
            after.extend(self.compose_include(include, name, &child_gates, stack)?);
        }

        stack.pop();
        config.include.clear();

        let mut nodes = before;
        nodes.push(ComposedBlueprint {
            name: name.to_string(),
            parent: parent.to_string(),
            config,
            depends_on,
            inherited_depends_on: inherited,
        });
        nodes.extend(after);
        Ok(nodes)
    }

    fn compose_include(
        &self,
        include: &IncludedBlueprint,
        parent: &str,
        gates: &[VarField],
        stack: &mut Vec<String>,
    ) -> BlueprintResult<Vec<ComposedBlueprint>> {
        let name = normalize_name(&include.blueprint);
        if stack.contains(&name) {
            let mut cycle = stack.clone();
            cycle.push(name);
            return Err(BlueprintError::CyclicInclude(cycle.join(" -> ")));
        }

        debug!(
            "Including blueprint {} {} {}",
            name,
            include.stage.as_str(),
            parent
        );
        let mut child = self.load(&name, parent)?;
        child.variables = apply_parameter_overrides(&child.variables, &include.parameter_overrides);
        child.template_configs = apply_file_overrides(&child.template_configs, &include.file_overrides);

        self.compose(
            &name,
            child,
            parent,
            include.depends_on.clone(),
            gates.to_vec(),
            stack,
        )
    }
}

impl std::fmt::Debug for Composer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("repository", &self.repository.name())
            .field("blueprints", &self.blueprints.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn normalize_name(name: &str) -> String {
    name.replace('\\', "/").trim_matches('/').to_string()
}

/// Apply parameter overrides by name.
///
/// A matching variable takes the override's value, condition and default
/// where the override sets them; an unmatched override becomes a new
/// variable.
pub fn apply_parameter_overrides(variables: &[Variable], overrides: &[Variable]) -> Vec<Variable> {
    let mut merged = variables.to_vec();
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, v)| (v.name.clone(), i))
        .collect();

    for o in overrides {
        match index.get(&o.name) {
            Some(&i) => {
                let target = &mut merged[i];
                if o.value.is_set() {
                    target.value = o.value.clone();
                }
                if o.depends_on.is_set() {
                    target.depends_on = o.depends_on.clone();
                }
                if o.default.is_set() {
                    target.default = o.default.clone();
                }
            }
            None => {
                debug!("Parameter override {} adds a new variable", o.name);
                index.insert(o.name.clone(), merged.len());
                merged.push(o.clone());
            }
        }
    }
    merged
}

/// Apply file overrides by path.
///
/// Overrides for files the blueprint does not declare are ignored.
pub fn apply_file_overrides(
    files: &[TemplateConfig],
    overrides: &[TemplateConfig],
) -> Vec<TemplateConfig> {
    let mut merged = files.to_vec();
    let index: HashMap<&str, usize> = files
        .iter()
        .enumerate()
        .map(|(i, f)| (f.path.as_str(), i))
        .collect();

    for o in overrides {
        match index.get(o.path.as_str()) {
            Some(&i) => {
                if o.depends_on.is_set() {
                    merged[i].depends_on = o.depends_on.clone();
                }
                if o.rename_to.is_set() {
                    merged[i].rename_to = o.rename_to.clone();
                }
            }
            None => warn!("File override for undeclared file {} ignored", o.path),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VariableType;
    use crate::repository::MemoryRepository;

    fn blueprint(params: &str, extra: &str) -> String {
        format!(
            "apiVersion: forge/v1\nkind: Blueprint\nspec:\n  parameters:\n{}{}",
            params, extra
        )
    }

    fn repo() -> MemoryRepository {
        MemoryRepository::new("test")
            .with_file(
                "a/blueprint.yaml",
                blueprint(
                    "  - name: A\n    type: Input\n",
                    "  includeAfter:\n  - blueprint: c\n  includeBefore:\n  - blueprint: b\n",
                ),
            )
            .with_file("b/blueprint.yaml", blueprint("  - name: B\n    type: Input\n", ""))
            .with_file("c/blueprint.yaml", blueprint("  - name: C\n    type: Input\n", ""))
    }

    fn names(nodes: &[ComposedBlueprint]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_before_self_after_order() {
        let repo = repo();
        let composer = Composer::new(&repo).unwrap();
        let (nodes, root) = composer.resolve("a", VarField::default(), "").unwrap();
        assert_eq!(names(&nodes), vec!["b", "a", "c"]);
        assert_eq!(nodes[0].parent, "a");
        assert_eq!(nodes[1].parent, "");
        assert!(nodes[1].config.include.is_empty());
        assert_eq!(root.include.len(), 2);
    }

    #[test]
    fn test_single_node() {
        let repo = repo();
        let composer = Composer::new(&repo).unwrap();
        let (nodes, _) = composer.resolve("b", VarField::default(), "").unwrap();
        assert_eq!(names(&nodes), vec!["b"]);
    }

    #[test]
    fn test_not_found() {
        let repo = repo();
        let composer = Composer::new(&repo).unwrap();
        let err = composer.resolve("abc", VarField::default(), "").unwrap_err();
        assert_eq!(err.to_string(), "blueprint [abc] not found in repository test");
    }

    #[test]
    fn test_missing_include_names_parent() {
        let repo = MemoryRepository::new("test").with_file(
            "x/blueprint.yaml",
            blueprint("  - name: X\n    type: Input\n", "  includeAfter:\n  - blueprint: gone\n"),
        );
        let composer = Composer::new(&repo).unwrap();
        let err = composer.resolve("x", VarField::default(), "").unwrap_err();
        assert!(err.to_string().contains("included from [x]"));
    }

    #[test]
    fn test_cycle_detected() {
        let repo = MemoryRepository::new("test")
            .with_file(
                "x/blueprint.yaml",
                blueprint("  - name: X\n    type: Input\n", "  includeAfter:\n  - blueprint: y\n"),
            )
            .with_file(
                "y/blueprint.yaml",
                blueprint("  - name: Y\n    type: Input\n", "  includeBefore:\n  - blueprint: x\n"),
            );
        let composer = Composer::new(&repo).unwrap();
        let err = composer.resolve("x", VarField::default(), "").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cyclic blueprint inclusion detected: x -> y -> x"
        );
    }

    #[test]
    fn test_parameter_overrides() {
        let vars = vec![
            Variable::new("Test", VariableType::Input)
                .with_value(VarField::literal("testing"))
                .save_in_values(true),
            Variable::new("Other", VariableType::Input),
        ];
        let overrides = vec![
            Variable::new("Test", VariableType::Input)
                .with_value(VarField::literal("hello"))
                .with_depends_on(VarField::expression("2 > 1")),
            Variable::new("Extra", VariableType::Input).with_value(VarField::literal("1")),
        ];

        let merged = apply_parameter_overrides(&vars, &overrides);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].value, VarField::literal("hello"));
        assert_eq!(merged[0].depends_on, VarField::expression("2 > 1"));
        assert!(merged[0].save_in_values);
        assert_eq!(merged[2].name, "Extra");
        assert_eq!(vars[0].value, VarField::literal("testing"));
    }

    #[test]
    fn test_file_overrides() {
        let files = vec![
            TemplateConfig::new("x.yml.tmpl", "b"),
            TemplateConfig::new("y.yml", "b"),
        ];
        let mut o = TemplateConfig::new("x.yml.tmpl", "b");
        o.depends_on = VarField::from_bool(false);
        let mut unknown = TemplateConfig::new("nope.yml", "b");
        unknown.rename_to = VarField::literal("z.yml");

        let merged = apply_file_overrides(&files, &[o, unknown]);
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged[0].depends_on,
            VarField {
                value: "false".into(),
                bool: false,
                ..Default::default()
            }
        );
        assert!(!merged[1].depends_on.is_set());
    }

    #[test]
    fn test_nested_gates_inherited() {
        let repo = MemoryRepository::new("test")
            .with_file(
                "root/blueprint.yaml",
                blueprint(
                    "  - name: R\n    type: Confirm\n",
                    "  includeAfter:\n  - blueprint: mid\n    includeIf: R\n",
                ),
            )
            .with_file(
                "mid/blueprint.yaml",
                blueprint(
                    "  - name: M\n    type: Input\n",
                    "  includeBefore:\n  - blueprint: leaf\n    includeIf: !expression \"M == 'x'\"\n",
                ),
            )
            .with_file("leaf/blueprint.yaml", blueprint("  - name: L\n    type: Input\n", ""));

        let composer = Composer::new(&repo).unwrap();
        let (nodes, _) = composer.resolve("root", VarField::default(), "").unwrap();
        assert_eq!(names(&nodes), vec!["root", "leaf", "mid"]);

        let leaf = &nodes[1];
        assert_eq!(leaf.parent, "mid");
        let gates: Vec<&VarField> = leaf.gates().collect();
        assert_eq!(gates.len(), 2);
        assert_eq!(gates[0], &VarField::literal("R"));
        assert_eq!(gates[1], &VarField::expression("M == 'x'"));
    }
}
