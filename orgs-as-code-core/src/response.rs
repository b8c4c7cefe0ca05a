//! Uniform success/failure envelope.
//!
//! Every fallible operation that talks to an external collaborator returns a
//! [`Response<T>`]. A [`Failure`] carries a human-readable message plus the raw
//! diagnostic detail of whatever went wrong underneath, so callers can render
//! the message to users and log the detail.

use serde::{Deserialize, Serialize};

/// Result of an operation against an external collaborator.
pub type Response<T> = std::result::Result<T, Failure>;

/// Failed response: a user-facing message plus optional raw detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct Failure {
    pub message: String,

    /// Raw underlying error, serialized for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    /// Attach the raw underlying error.
    pub fn with_detail(mut self, detail: impl std::fmt::Display) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}
