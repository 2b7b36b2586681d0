//! Advisory argument rules.
//!
//! Rules describe what the remote operation expects of each parameter. They
//! exist for early feedback at the call site: [`validate_args`] lets a caller
//! surface bad input before dispatch, but the engine itself never consults
//! them — the remote side stays the source of truth for acceptance.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ValidationError, ValidationErrors};
use crate::registry::descriptor::OperationDescriptor;

// ============================================================================
// Rule
// ============================================================================

/// One advisory constraint on a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    /// Present and non-null.
    Required,
    String,
    Integer,
    /// Any JSON number, integer or float.
    Numeric,
    Boolean,
}

/// Ordered rule list for one parameter.
pub type RuleSet = Vec<Rule>;

impl Rule {
    pub fn name(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Check `args` against the descriptor's rules, collecting every failure.
///
/// Arguments pair with parameters by position. Type rules only apply to
/// values that are present and non-null; absence is `required`'s concern.
pub fn validate_args(
    descriptor: &OperationDescriptor,
    args: &[Value],
) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    for (position, parameter) in descriptor.parameters.iter().enumerate() {
        let Some(rules) = descriptor.rules.get(parameter) else {
            continue;
        };
        let arg = args.get(position);
        for rule in rules {
            if let Some(error) = check_rule(*rule, parameter, arg) {
                errors.push(error);
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

fn check_rule(rule: Rule, parameter: &str, arg: Option<&Value>) -> Option<ValidationError> {
    let failure = |expected: &str, received: &str| {
        Some(ValidationError {
            path: parameter.to_string(),
            expected: expected.to_string(),
            received: received.to_string(),
        })
    };

    match rule {
        Rule::Required => match arg {
            None => failure("required", "missing"),
            Some(Value::Null) => failure("required", "null"),
            Some(_) => None,
        },
        // Type rules pass on absent or null values.
        _ => match arg {
            None | Some(Value::Null) => None,
            Some(value) if rule_passes(rule, value) => None,
            Some(value) => failure(rule.name(), type_name(value)),
        },
    }
}

fn rule_passes(rule: Rule, value: &Value) -> bool {
    match rule {
        Rule::Required => !value.is_null(),
        Rule::String => value.is_string(),
        Rule::Integer => value.is_i64() || value.is_u64(),
        Rule::Numeric => value.is_number(),
        Rule::Boolean => value.is_boolean(),
    }
}

/// Human-readable JSON type name for error messages.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================
