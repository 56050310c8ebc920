//! Error taxonomy for the simulation kernel.
//!
//! Three classes of failure exist:
//!
//! - **Configuration errors** are detected while the context initializes
//!   (duplicate message names, non-positive-definite inertia, unresolved
//!   messages) and abort before any model is updated.
//! - **Numerical warnings** never surface as errors. Models record them through
//!   [`ModelContext::warn`](crate::model::ModelContext::warn) and keep running.
//! - **Fatal runtime errors** (non-finite integrator state) abort the run. The
//!   failing model tag and simulation time are attached by the scheduler.

use thiserror::Error;

use crate::config::ConfigError;
use crate::types::SimTime;

/// Errors raised by the message bus.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessagingError {
    #[error("message '{0}' already exists")]
    DuplicateName(String),

    #[error("unknown message '{0}'")]
    UnknownMessage(String),

    #[error("message '{name}' holds {expected} elements, got {actual}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("message '{name}' has type {expected}, requested as {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("message '{0}' needs a buffer count of at least 1")]
    InvalidBufferCount(String),
}

/// Errors raised by a single model during init, reset or update.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("invalid field '{field}': {reason}")]
    Config { field: String, reason: String },

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error("non-finite {0}")]
    NonFinite(String),
}

impl ModelError {
    /// Shorthand for a configuration error on a named field.
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level error returned by the lifecycle API.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("configuration error in '{tag}': {source}")]
    Config {
        tag: String,
        #[source]
        source: ModelError,
    },

    #[error("fatal error in '{tag}' at t={time} ns: {source}")]
    Fatal {
        tag: String,
        time: SimTime,
        #[source]
        source: ModelError,
    },

    #[error("invalid lifecycle transition: {0}")]
    InvalidState(String),

    #[error("'{0}' is already defined")]
    Duplicate(String),

    #[error("unknown process '{0}'")]
    UnknownProcess(String),

    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Scenario(#[from] ConfigError),
}

impl SimError {
    /// Returns true for errors raised while the simulation was running.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimError::Fatal { .. })
    }

    /// Returns the tag of the model that raised the error, if any.
    pub fn model_tag(&self) -> Option<&str> {
        match self {
            SimError::Config { tag, .. } | SimError::Fatal { tag, .. } => Some(tag),
            _ => None,
        }
    }
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Result type for lifecycle operations.
pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_tag_and_time() {
        let err = SimError::Fatal {
            tag: "scObject".to_string(),
            time: 1_000,
            source: ModelError::NonFinite("attitude rate".to_string()),
        };
        let text = err.to_string();
        assert!(text.contains("scObject"));
        assert!(text.contains("t=1000"));
        assert!(err.is_fatal());
        assert_eq!(err.model_tag(), Some("scObject"));
    }

    #[test]
    fn test_config_helper() {
        let err = ModelError::config("inertia", "not positive definite");
        assert_eq!(
            err.to_string(),
            "invalid field 'inertia': not positive definite"
        );
    }
}
