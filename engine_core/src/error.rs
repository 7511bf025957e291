// Typed errors with thiserror. Surface meaningful messages to JS.
// Arbitration drops are decisions, not errors; nothing here is fatal to the host.

use thiserror::Error;

/// Engine error types.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid {feed} snapshot: {message}")]
    InvalidSnapshot { feed: &'static str, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
