//! Error types for the triage core.

use thiserror::Error;

use crate::domain::request::RequestId;

/// Result type alias using the triage error type.
pub type Result<T> = std::result::Result<T, TriageError>;

/// Main error type for the triage core.
#[derive(Error, Debug)]
pub enum TriageError {
    /// Request not found
    #[error("Request not found: {0}")]
    NotFound(RequestId),

    /// Request is in a state from which the attempted action is not a legal edge
    #[error("Invalid transition: request {0} is in state '{1}', cannot apply '{2}'")]
    InvalidTransition(RequestId, String, String),

    /// Non-admin identity attempted an admin-only operation
    #[error("Unauthorized")]
    Unauthorized,

    /// Chat gateway call failed
    #[error("Gateway request failed: {0}")]
    Gateway(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
