//! Error types returned by component factories and lifecycle hooks.

use thiserror::Error;

use crate::hub::HubError;

/// Errors raised by a component while being created, started or stopped.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// Configuration blob could not be mapped onto the component's config type
    #[error("Config error: {0}")]
    Config(String),

    /// A named injection was requested but not supplied
    #[error("injection '{0}' unspecified")]
    MissingInjection(String),

    /// A named connection was requested but not supplied
    #[error("connection '{0}' unspecified")]
    MissingConnection(String),

    /// An injected instance is not of the type the component expects
    #[error("injection '{name}' type mismatch: expected {expected}")]
    TypeMismatch { name: String, expected: String },

    /// Component failed while running its lifecycle
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Hub operation failed
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),

    /// Generic I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ComponentError {
    fn from(err: serde_json::Error) -> Self {
        ComponentError::Config(err.to_string())
    }
}
