//! Login flow: credentials, then a time-boxed one-time code.

use std::sync::Arc;

use crate::service::{AuthService, UserProfile};
use crate::workflow::{FieldRule, StepDefinition, WorkflowContext, WorkflowDefinition};

use super::actions::{Login, VerifyLoginCode};
use super::fields::{CODE, IDENTIFIER, SECRET, SESSION_TOKEN, USER};
use super::{OTP_COUNTDOWN_SECONDS, OTP_LENGTH};

/// Builds the login workflow.
///
/// Resending from the `otp` step repeats the credentials call, which is
/// what triggers a new code.
pub fn login_flow(service: Arc<dyn AuthService>) -> WorkflowDefinition {
    WorkflowDefinition::from_steps(
        "login",
        vec![
            StepDefinition::new("credentials", 0)
                .with_action(Arc::new(Login(Arc::clone(&service))))
                .with_fields([IDENTIFIER, SECRET])
                .with_rule(FieldRule::required(IDENTIFIER))
                .with_rule(FieldRule::required(SECRET)),
            StepDefinition::new("otp", 1)
                .with_action(Arc::new(VerifyLoginCode(service)))
                .with_expiry(OTP_COUNTDOWN_SECONDS)
                .with_code_input(CODE, OTP_LENGTH),
            StepDefinition::new("authenticated", 2).terminal(),
        ],
    )
}

/// Session credential from a completed login outcome.
pub fn session_token(outcome: &WorkflowContext) -> Option<&str> {
    outcome.get_str(SESSION_TOKEN)
}

/// Authenticated user from a completed login outcome.
pub fn session_user(outcome: &WorkflowContext) -> Option<UserProfile> {
    outcome
        .get(USER)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}
