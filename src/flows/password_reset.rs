//! Password-reset flow: email address, one-time code, new secret.

use std::sync::Arc;

use crate::service::AuthService;
use crate::workflow::{FieldRule, StepDefinition, WorkflowDefinition};

use super::actions::{RequestPasswordReset, ResetPassword, VerifyResetCode};
use super::fields::{ADDRESS, CODE, CONFIRM_SECRET, NEW_SECRET};
use super::{OTP_COUNTDOWN_SECONDS, OTP_LENGTH, PASSWORD_MIN_LENGTH};

/// Builds the password-reset workflow.
///
/// The code step uses the same lifetime as login codes. The confirmation
/// must equal the new secret before the reset action is contacted.
pub fn password_reset_flow(service: Arc<dyn AuthService>) -> WorkflowDefinition {
    WorkflowDefinition::from_steps(
        "password-reset",
        vec![
            StepDefinition::new("email", 0)
                .with_action(Arc::new(RequestPasswordReset(Arc::clone(&service))))
                .with_fields([ADDRESS])
                .with_rule(FieldRule::required(ADDRESS))
                .with_rule(FieldRule::email(ADDRESS)),
            StepDefinition::new("otp", 1)
                .with_action(Arc::new(VerifyResetCode(Arc::clone(&service))))
                .with_expiry(OTP_COUNTDOWN_SECONDS)
                .with_code_input(CODE, OTP_LENGTH),
            StepDefinition::new("reset", 2)
                .with_action(Arc::new(ResetPassword(service)))
                .with_fields([NEW_SECRET, CONFIRM_SECRET])
                .with_rule(FieldRule::required(NEW_SECRET))
                .with_rule(FieldRule::min_length(NEW_SECRET, PASSWORD_MIN_LENGTH))
                .with_rule(FieldRule::required(CONFIRM_SECRET))
                .with_rule(FieldRule::matches(CONFIRM_SECRET, NEW_SECRET)),
            StepDefinition::new("success", 3).terminal(),
        ],
    )
}
