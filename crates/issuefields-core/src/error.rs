//! Error types for issuefields-core.

use thiserror::Error;

/// Result type alias for issuefields-core operations.
pub type Result<T> = std::result::Result<T, FieldError>;

/// Errors raised by field operations.
///
/// User input problems are not errors: they are collected into an
/// [`ErrorCollection`](crate::validation::ErrorCollection) during validation.
/// This enum covers contract violations and collaborator failures.
#[derive(Debug, Error)]
pub enum FieldError {
    /// A value could not be mapped onto the field (import-style population).
    #[error("field validation failed: {0}")]
    FieldValidation(String),

    /// The field does not support the requested operation.
    #[error("field '{field}' does not support {operation}")]
    UnsupportedOperation {
        field: String,
        operation: &'static str,
    },

    /// No field is registered under this id.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// A duration string could not be parsed.
    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    /// A collaborator failed to read or write data.
    #[error("data access error: {0}")]
    DataAccess(String),

    /// Template rendering failed.
    #[error("template error in '{template}': {message}")]
    Template { template: String, message: String },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FieldError {
    /// Shorthand for [`FieldError::UnsupportedOperation`].
    #[must_use]
    pub fn unsupported(field: impl Into<String>, operation: &'static str) -> Self {
        Self::UnsupportedOperation {
            field: field.into(),
            operation,
        }
    }
}
