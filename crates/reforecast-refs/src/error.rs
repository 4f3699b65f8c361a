//! Error types for the reference builder.

use thiserror::Error;

/// Errors that can occur while building reference documents.
#[derive(Error, Debug)]
pub enum RefsError {
    /// The requested forecast hour has no matching message.
    #[error("invalid forecast hour {hour}: {reason}")]
    InvalidForecastHour { hour: u32, reason: &'static str },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A remote object could not be read.
    #[error("failed to fetch {uri}: {message}")]
    Fetch { uri: String, message: String },

    /// The index file does not describe the requested message.
    #[error("malformed index {uri}: {reason}")]
    MalformedIndex { uri: String, reason: String },

    #[error("invalid archive uri: {0}")]
    InvalidUri(String),

    /// The reference template is missing or unusable.
    #[error("reference template error: {0}")]
    Template(String),

    /// Two documents cannot be combined.
    #[error("cannot merge {file}: {reason}")]
    Merge { file: String, reason: String },

    #[error("no reference documents to merge ({failed} files failed)")]
    NothingToMerge { failed: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to access reference store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode reference document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RefsError {
    pub fn fetch(uri: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            uri: uri.into(),
            message: message.to_string(),
        }
    }

    pub fn malformed(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIndex {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub fn merge(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Merge {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for reference building operations.
pub type Result<T> = std::result::Result<T, RefsError>;
