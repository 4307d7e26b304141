//! OtpFlow - Stepped Verification Workflow Engine
//!
//! Drives multi-step authentication flows (credentials, then a time-boxed
//! one-time code, then completion) independently of any UI. Each step runs
//! one asynchronous action at a time; stale responses are discarded and
//! code entry is modelled as a segmented, per-cell input.
//!
//! # Architecture
//!
//! The library is organized into these modules:
//!
//! - [`input`]: Countdown timer and segmented code input
//! - [`workflow`]: Definitions, context, field rules and per-step async state
//! - [`execution`]: Step actions and the [`StepWorkflow`] state machine
//! - [`service`]: Authentication collaborator and its mock
//! - [`flows`]: Built-in login and password-reset flows
//! - [`monitoring`]: Transition timeline
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use otpflow::{login_flow, MockAuthService, StepWorkflow};
//! use otpflow::workflow::{context_update, ContextUpdate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut workflow = StepWorkflow::new(login_flow(Arc::new(MockAuthService::new())))?;
//!
//!     workflow
//!         .submit_and_wait(context_update([("identifier", "alice"), ("secret", "x")]))
//!         .await?;
//!
//!     // Enter the code cell by cell, or paste it
//!     if let Some(code) = workflow.code_input_mut() {
//!         code.paste("123456");
//!     }
//!     workflow.submit_and_wait(ContextUpdate::new()).await?;
//!
//!     if let Some(outcome) = workflow.take_outcome() {
//!         println!("Session: {:?}", otpflow::flows::session_token(&outcome));
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod execution;
pub mod flows;
pub mod input;
pub mod monitoring;
pub mod service;
pub mod workflow;

// Re-export commonly used types
pub use error::{ConcurrencyError, StepError, ValidationError, WorkflowError};
pub use execution::{Resolution, StepWorkflow};
pub use flows::{login_flow, password_reset_flow};
pub use input::{CountdownTimer, SegmentedCodeInput};
pub use service::{AuthService, MockAuthService};
pub use workflow::{load_definition, AsyncStepState, WorkflowContext, WorkflowDefinition};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "OtpFlow";

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "OtpFlow");
    }

    #[test]
    fn test_module_exports_flows() {
        let service: Arc<dyn AuthService> = Arc::new(MockAuthService::new());
        assert_eq!(login_flow(Arc::clone(&service)).len(), 3);
        assert_eq!(password_reset_flow(service).len(), 4);
    }

    #[test]
    fn test_module_exports_inputs() {
        let timer = CountdownTimer::started(flows::OTP_COUNTDOWN_SECONDS);
        assert_eq!(timer.remaining(), 120);

        let code = SegmentedCodeInput::default();
        assert_eq!(code.len(), flows::OTP_LENGTH);
    }
}
