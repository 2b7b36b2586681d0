use std::fmt;
use thiserror::Error;

use crate::engine::RemoteError;

// ---------------------------------------------------------------------------
// ValidationError / ValidationErrors
// ---------------------------------------------------------------------------

/// A single argument-level validation failure.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub path: String,
    pub expected: String,
    pub received: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"Validation failed at "{}": expected {}, received {}"#,
            self.path, self.expected, self.received
        )
    }
}

impl std::error::Error for ValidationError {}

/// A collection of one or more `ValidationError`s.
#[derive(Debug, Clone)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed:")?;
        for e in &self.0 {
            write!(
                f,
                "\n  - {}: expected {}, received {}",
                e.path, e.expected, e.received
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Operation \"{0}\" is already registered")]
    DuplicateOperation(String),

    #[error("Invalid {kind} \"{name}\": must start with a letter or underscore and contain only letters, digits, and underscores")]
    InvalidName { kind: &'static str, name: String },

    #[error(
        "Operation \"{operation}\": id parameter \"{id_attribute}\" is not among the declared \
         parameters and id injection is disabled"
    )]
    MissingIdParameter {
        operation: String,
        id_attribute: String,
    },

    #[error(
        "Operation \"{operation}\": id injection prepends the generated id, so \
         \"{id_attribute}\" must be the first declared parameter"
    )]
    MisplacedIdParameter {
        operation: String,
        id_attribute: String,
    },

    #[error(
        "Operation \"{operation}\": script references argument {index} but only {arity} \
         parameters are declared"
    )]
    ArgumentOutOfRange {
        operation: String,
        index: usize,
        arity: usize,
    },

    #[error("Configuration key \"{key}\" does not match descriptor name \"{name}\"")]
    KeyMismatch { key: String, name: String },

    #[error("Invalid descriptor blob: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid descriptor JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// InvokeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Operation \"{operation}\": missing or non-scalar id argument \"{id_attribute}\"")]
    MissingIdArgument {
        operation: String,
        id_attribute: String,
    },

    #[error("Operation \"{operation}\" expects {expected} arguments, received {received}")]
    ArityMismatch {
        operation: String,
        expected: usize,
        received: usize,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

// ---------------------------------------------------------------------------
// OptimisticError — top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OptimisticError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

/// Convenience alias — the default error type is `OptimisticError`.
pub type Result<T, E = OptimisticError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
