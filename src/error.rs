//! Error types shared across the crate.

use thiserror::Error;

/// Crate-wide error type.
///
/// Gateways return these; the workspace stores log them and degrade to
/// "no-op, prior state preserved".
#[derive(Debug, Error)]
pub enum Error {
    /// A status string outside the enumerated set.
    #[error("invalid {kind} status '{value}'")]
    InvalidStatus { kind: &'static str, value: String },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// A write referencing a parent record that does not exist (or belongs elsewhere).
    #[error("{kind} references missing {target} '{target_id}'")]
    DanglingReference {
        kind: &'static str,
        target: &'static str,
        target_id: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway error: {0}")]
    Gateway(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn dangling(kind: &'static str, target: &'static str, target_id: impl Into<String>) -> Self {
        Self::DanglingReference {
            kind,
            target,
            target_id: target_id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
