//! Error types for the provisioner.

use std::fmt;

use thiserror::Error;

use crate::machine::ProvisionStep;

/// Result type alias for single provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for provisioner operations.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// How a provider failure should be treated by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Worth retrying (throttling, eventual consistency of new roles).
    Transient,
    /// The addressed resource does not exist.
    NotFound,
    /// The provider answered, but not in the expected shape.
    Malformed,
    Other,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transient => "transient",
            Self::NotFound => "not found",
            Self::Malformed => "malformed response",
            Self::Other => "error",
        })
    }
}

/// A failed call against the cloud provider.
#[derive(Debug, Error)]
#[error("{operation}: {message}")]
pub struct ProviderError {
    pub operation: &'static str,
    pub kind: ProviderErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(operation: &'static str, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn transient(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(operation, ProviderErrorKind::Transient, message)
    }

    pub fn not_found(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(operation, ProviderErrorKind::NotFound, message)
    }

    pub fn malformed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(operation, ProviderErrorKind::Malformed, message)
    }

    pub fn other(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(operation, ProviderErrorKind::Other, message)
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ProviderErrorKind::NotFound
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A provisioning step failed. Completed steps are left in place.
    #[error(
        "provisioning stopped at step {step} after {} completed step(s)",
        .completed.len()
    )]
    Interrupted {
        step: ProvisionStep,
        completed: Vec<ProvisionStep>,
        #[source]
        source: ProviderError,
    },

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ProvisionError {
    /// Steps that finished before the run stopped, if this is an interruption.
    pub fn completed_steps(&self) -> &[ProvisionStep] {
        match self {
            Self::Interrupted { completed, .. } => completed,
            _ => &[],
        }
    }
}
