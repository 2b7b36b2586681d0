//! Operation descriptors and the closed script instruction set.
//!
//! A descriptor declares how one named remote operation maps onto the overlay:
//! which state path it touches, which parameter identifies the target entity,
//! and a script of tagged primitive calls whose value slots are filled in at
//! invoke time from the positional arguments and the resolved id. Scripts are
//! data, not code — the host can ship them over the wire and nothing is ever
//! evaluated.
//!
//! [`DescriptorBuilder`] constructs descriptors in process; CRUD-flavored
//! operations get their script and advisory rules derived from the declared
//! parameter list, mirroring the host-side attribute that introspects server
//! method signatures.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RegistryError;
use crate::registry::rules::{Rule, RuleSet};
use crate::types::DEFAULT_STATE_PATH;

// ============================================================================
// Name Regex
// ============================================================================

/// Compiled once at first use.
fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("name regex is valid"))
}

fn check_name(kind: &'static str, name: &str) -> Result<(), RegistryError> {
    if name_regex().is_match(name) {
        Ok(())
    } else {
        Err(RegistryError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

// ============================================================================
// ValueTemplate
// ============================================================================

/// A value slot in a script op, filled in at invoke time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueTemplate {
    /// The caller's positional argument (after id injection, if any).
    Arg(usize),
    /// The resolved entity id, as a JSON string.
    Id,
    /// A constant.
    Literal(Value),
}

// ============================================================================
// Script
// ============================================================================

/// One tagged call to an overlay primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptOp {
    Create {
        data: BTreeMap<String, ValueTemplate>,
    },
    Update {
        id: ValueTemplate,
        data: BTreeMap<String, ValueTemplate>,
    },
    Remove {
        id: ValueTemplate,
    },
}

/// The ordered primitive calls an operation performs against the overlay.
///
/// An empty script is legal — the operation becomes a pure passthrough whose
/// settlement unwinds nothing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script(pub Vec<ScriptOp>);

impl Script {
    pub fn iter(&self) -> std::slice::Iter<'_, ScriptOp> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every `Arg` index referenced anywhere in the script.
    pub fn arg_indices(&self) -> Vec<usize> {
        fn collect(template: &ValueTemplate, out: &mut Vec<usize>) {
            if let ValueTemplate::Arg(index) = template {
                out.push(*index);
            }
        }

        let mut out = Vec::new();
        for op in &self.0 {
            match op {
                ScriptOp::Create { data } => {
                    data.values().for_each(|t| collect(t, &mut out));
                }
                ScriptOp::Update { id, data } => {
                    collect(id, &mut out);
                    data.values().for_each(|t| collect(t, &mut out));
                }
                ScriptOp::Remove { id } => collect(id, &mut out),
            }
        }
        out
    }
}

// ============================================================================
// OperationDescriptor
// ============================================================================

/// Declarative definition of one optimistic-capable operation.
///
/// Immutable once built. Wire names are camelCase and the script travels
/// under `fn`, matching the configuration payload the host embeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    pub name: String,
    pub state_path: String,
    #[serde(rename = "fn")]
    pub script: Script,
    /// Advisory validation rules per parameter. The engine never checks
    /// these; see `rules::validate_args`.
    #[serde(default)]
    pub rules: BTreeMap<String, RuleSet>,
    pub id_attribute: String,
    /// Ordered formal parameter names of the remote operation.
    pub parameters: Vec<String>,
    /// Generate an id client-side and prepend it to the outgoing arguments.
    pub inject_optimistic_id: bool,
}

impl OperationDescriptor {
    /// Position of `id_attribute` within `parameters`.
    pub fn id_position(&self) -> Option<usize> {
        self.parameters
            .iter()
            .position(|parameter| parameter == &self.id_attribute)
    }

    /// Build-time validation: names, id resolution, and argument ranges.
    ///
    /// In particular, a descriptor whose id parameter is absent while id
    /// injection is off can never resolve a target id and is rejected here
    /// rather than keying the overlay under a garbage sentinel at runtime.
    pub fn validate(&self) -> Result<(), RegistryError> {
        check_name("operation name", &self.name)?;
        check_name("state path", &self.state_path)?;
        check_name("id attribute", &self.id_attribute)?;
        for parameter in &self.parameters {
            check_name("parameter name", parameter)?;
        }

        if self.inject_optimistic_id {
            // The generated id is prepended, so it must land on the id slot.
            if self.parameters.first().map(String::as_str) != Some(self.id_attribute.as_str()) {
                return Err(RegistryError::MisplacedIdParameter {
                    operation: self.name.clone(),
                    id_attribute: self.id_attribute.clone(),
                });
            }
        } else if self.id_position().is_none() {
            return Err(RegistryError::MissingIdParameter {
                operation: self.name.clone(),
                id_attribute: self.id_attribute.clone(),
            });
        }

        let arity = self.parameters.len();
        if let Some(index) = self
            .script
            .arg_indices()
            .into_iter()
            .find(|index| *index >= arity)
        {
            return Err(RegistryError::ArgumentOutOfRange {
                operation: self.name.clone(),
                index,
                arity,
            });
        }
        Ok(())
    }
}

// ============================================================================
// CrudKind / ParamType
// ============================================================================

/// CRUD flavor for derived scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudKind {
    Create,
    Update,
    Delete,
}

/// Declared parameter type, used to derive advisory rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
}

impl ParamType {
    /// The advisory rule this type maps to.
    pub fn rule(self) -> Rule {
        match self {
            Self::Integer => Rule::Integer,
            Self::Float => Rule::Numeric,
            Self::Boolean => Rule::Boolean,
            Self::String => Rule::String,
        }
    }
}

// ============================================================================
// DescriptorBuilder
// ============================================================================

/// Fluent builder for [`OperationDescriptor`]s.
///
/// Either supply an explicit [`Script`] with [`script`](Self::script), or
/// pick a [`CrudKind`] and let [`build`](Self::build) derive the script and
/// rules from the declared parameters:
/// - every parameter gets `[required, <type rule>]`, overriding any
///   caller-supplied rules for the same key;
/// - `create` maps every parameter into the created entity's data;
/// - `update` targets the id parameter and maps every other parameter at its
///   original position;
/// - `delete` targets the id parameter only.
pub struct DescriptorBuilder {
    name: String,
    state_path: Option<String>,
    script: Option<Script>,
    crud: Option<CrudKind>,
    rules: BTreeMap<String, RuleSet>,
    id_attribute: String,
    parameters: Vec<(String, ParamType)>,
    inject_optimistic_id: bool,
}

/// Create a new descriptor builder for `name`.
pub fn operation(name: &str) -> DescriptorBuilder {
    DescriptorBuilder {
        name: name.to_string(),
        state_path: None,
        script: None,
        crud: None,
        rules: BTreeMap::new(),
        id_attribute: "id".to_string(),
        parameters: Vec::new(),
        inject_optimistic_id: false,
    }
}

impl DescriptorBuilder {
    /// Target state path. Defaults to [`DEFAULT_STATE_PATH`].
    pub fn state_path(mut self, state_path: &str) -> Self {
        self.state_path = Some(state_path.to_string());
        self
    }

    /// Name of the parameter identifying the target entity. Defaults to
    /// `"id"`.
    pub fn id_attribute(mut self, id_attribute: &str) -> Self {
        self.id_attribute = id_attribute.to_string();
        self
    }

    /// Declare the next formal parameter.
    pub fn parameter(mut self, name: &str, ty: ParamType) -> Self {
        self.parameters.push((name.to_string(), ty));
        self
    }

    /// Supply advisory rules for one parameter. CRUD derivation overrides
    /// these for parameters it rules itself.
    pub fn rule(mut self, parameter: &str, rules: RuleSet) -> Self {
        self.rules.insert(parameter.to_string(), rules);
        self
    }

    /// Supply an explicit script instead of CRUD derivation.
    pub fn script(mut self, script: Script) -> Self {
        self.script = Some(script);
        self
    }

    /// Derive the script and rules for a CRUD-flavored operation.
    pub fn crud(mut self, kind: CrudKind) -> Self {
        self.crud = Some(kind);
        self
    }

    /// Generate an id client-side and prepend it to the outgoing arguments.
    pub fn inject_optimistic_id(mut self, inject: bool) -> Self {
        self.inject_optimistic_id = inject;
        self
    }

    /// Finalize and validate the descriptor.
    pub fn build(self) -> Result<OperationDescriptor, RegistryError> {
        let state_path = self
            .state_path
            .unwrap_or_else(|| DEFAULT_STATE_PATH.to_string());
        let mut rules = self.rules;

        let script = match (self.script, self.crud) {
            (Some(script), _) => script,
            (None, Some(kind)) => {
                // Derived rules win over caller-supplied ones for the same key.
                for (name, ty) in &self.parameters {
                    rules.insert(name.clone(), vec![Rule::Required, ty.rule()]);
                }
                derive_script(kind, &self.name, &self.id_attribute, &self.parameters)?
            }
            (None, None) => Script::default(),
        };

        let descriptor = OperationDescriptor {
            name: self.name,
            state_path,
            script,
            rules,
            id_attribute: self.id_attribute,
            parameters: self.parameters.into_iter().map(|(name, _)| name).collect(),
            inject_optimistic_id: self.inject_optimistic_id,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

/// Derive the primitive script for a CRUD kind from the parameter list.
fn derive_script(
    kind: CrudKind,
    operation: &str,
    id_attribute: &str,
    parameters: &[(String, ParamType)],
) -> Result<Script, RegistryError> {
    let id_position = parameters
        .iter()
        .position(|(name, _)| name == id_attribute);

    // Update and delete always need the id parameter, injection or not.
    if kind != CrudKind::Create && id_position.is_none() {
        return Err(RegistryError::MissingIdParameter {
            operation: operation.to_string(),
            id_attribute: id_attribute.to_string(),
        });
    }

    let op = match kind {
        CrudKind::Create => ScriptOp::Create {
            data: parameters
                .iter()
                .enumerate()
                .map(|(index, (name, _))| (name.clone(), ValueTemplate::Arg(index)))
                .collect(),
        },
        CrudKind::Update => ScriptOp::Update {
            id: ValueTemplate::Id,
            // Non-id parameters keep their original positions.
            data: parameters
                .iter()
                .enumerate()
                .filter(|(_, (name, _))| name != id_attribute)
                .map(|(index, (name, _))| (name.clone(), ValueTemplate::Arg(index)))
                .collect(),
        },
        CrudKind::Delete => ScriptOp::Remove {
            id: ValueTemplate::Id,
        },
    };
    Ok(Script(vec![op]))
}

// ============================================================================
// Tests
// ============================================================================
