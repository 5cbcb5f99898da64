//! Error types for site storage.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while reading or writing a site directory.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No site at the specified path.
    #[error("site not found at '{0}'")]
    SiteNotFound(PathBuf),

    /// A site already exists.
    #[error("site already exists at '{0}'")]
    SiteExists(PathBuf),

    /// Issue not found.
    #[error("issue not found: {0}")]
    IssueNotFound(String),

    /// Issue key unusable as a file name.
    #[error("invalid issue key: {0}")]
    InvalidIssueKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Field layer error.
    #[error("field error: {0}")]
    Field(#[from] issuefields_core::FieldError),
}
