//! Error types for event handling.

use thiserror::Error;

/// Errors that can occur when encoding or delivering events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The sink refused or failed to store the event.
    #[error("event sink error: {0}")]
    Sink(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}
