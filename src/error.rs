//! Error Taxonomy
//!
//! Errors are split by who produces them:
//!
//! - [`ValidationError`]: local checks that run before any action is contacted
//! - [`StepError`]: what a step reports back (local validation, service rejection, transport)
//! - [`ConcurrencyError`]: a second invocation while one is pending
//! - [`WorkflowError`]: a workflow operation that is not legal in the current state
//!
//! None of these are fatal. Every error leaves the workflow on the same step,
//! ready to be retried.

use thiserror::Error;

/// A local, pre-submission rejection of step input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{0}' is required")]
    MissingField(String),

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("Field '{field}' must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("Field '{field}' does not match '{other}'")]
    Mismatch { field: String, other: String },

    #[error("Code must be {expected} characters, got {actual}")]
    CodeLength { expected: usize, actual: usize },

    #[error("Code contains characters that are not accepted")]
    CodeCharacters,
}

/// Failure reported for a single step.
///
/// Transport failures are classified by the collaborator that talks to the
/// network. The workflow never branches on the variant; it only exposes the
/// error for the host to render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Service {
        message: String,
        status: Option<u16>,
    },

    #[error("Transport failure: {0}")]
    Transport(String),
}

impl StepError {
    /// A rejection reported by the remote service.
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
            status: None,
        }
    }

    /// A rejection carrying the status code returned by the service.
    pub fn service_with_status(message: impl Into<String>, status: u16) -> Self {
        Self::Service {
            message: message.into(),
            status: Some(status),
        }
    }

    /// A network-level failure (unreachable host, timeout).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Returns true if the error was raised locally, without contacting the action.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Raised when an invocation is attempted while another one is pending.
///
/// Hosts are expected to prevent this by disabling submission while a step
/// is pending, so it is never shown to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("An invocation is already pending")]
pub struct ConcurrencyError;

/// A workflow operation that is not legal in the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Step '{step}' has expired; request a new code")]
    Expired { step: String },

    #[error("Step '{step}' is the first step")]
    NoPreviousStep { step: String },

    #[error("Step '{step}' does not support resending")]
    ResendUnavailable { step: String },

    #[error("Workflow has already finished")]
    Finished,

    #[error("Workflow was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_from_validation() {
        let err: StepError = ValidationError::MissingField("email".to_string()).into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Field 'email' is required");
    }

    #[test]
    fn test_service_error_displays_message() {
        let err = StepError::service_with_status("Invalid code", 401);
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "Invalid code");
    }

    #[test]
    fn test_workflow_error_wraps_concurrency() {
        let err: WorkflowError = ConcurrencyError.into();
        assert_eq!(err, WorkflowError::Concurrency(ConcurrencyError));
        assert_eq!(err.to_string(), "An invocation is already pending");
    }
}
