//! Step actions backed by an [`AuthService`].
//!
//! Each action reads its inputs from the workflow context and returns the
//! fields it adds to it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StepError;
use crate::execution::{StepAction, StepResult};
use crate::service::AuthService;
use crate::workflow::{ContextUpdate, WorkflowContext};

use super::fields::{ADDRESS, CODE, IDENTIFIER, NEW_SECRET, SECRET, SESSION_TOKEN, USER};

/// Sends credentials; the service answers by delivering a login code.
pub struct Login(pub Arc<dyn AuthService>);

#[async_trait]
impl StepAction for Login {
    async fn run(&self, context: &WorkflowContext) -> StepResult {
        let identifier = context.require_str(IDENTIFIER)?;
        let secret = context.require_str(SECRET)?;

        self.0.login(identifier.trim(), secret).await?;
        Ok(ContextUpdate::new())
    }
}

/// Exchanges the login code for a session.
pub struct VerifyLoginCode(pub Arc<dyn AuthService>);

#[async_trait]
impl StepAction for VerifyLoginCode {
    async fn run(&self, context: &WorkflowContext) -> StepResult {
        let identifier = context.require_str(IDENTIFIER)?;
        let code = context.require_str(CODE)?;

        let session = self.0.verify_login_code(identifier.trim(), code).await?;
        let user = serde_json::to_value(&session.user)
            .map_err(|e| StepError::service(format!("Malformed session: {e}")))?;

        let mut update = ContextUpdate::new();
        update.insert(SESSION_TOKEN.to_string(), Value::String(session.token));
        update.insert(USER.to_string(), user);
        Ok(update)
    }
}

/// Sends a reset code to the address in the context.
pub struct RequestPasswordReset(pub Arc<dyn AuthService>);

#[async_trait]
impl StepAction for RequestPasswordReset {
    async fn run(&self, context: &WorkflowContext) -> StepResult {
        let address = context.require_str(ADDRESS)?;
        self.0.request_password_reset(address.trim()).await?;
        Ok(ContextUpdate::new())
    }
}

pub struct VerifyResetCode(pub Arc<dyn AuthService>);

#[async_trait]
impl StepAction for VerifyResetCode {
    async fn run(&self, context: &WorkflowContext) -> StepResult {
        let address = context.require_str(ADDRESS)?;
        let code = context.require_str(CODE)?;
        self.0.verify_reset_code(address.trim(), code).await?;
        Ok(ContextUpdate::new())
    }
}

pub struct ResetPassword(pub Arc<dyn AuthService>);

#[async_trait]
impl StepAction for ResetPassword {
    async fn run(&self, context: &WorkflowContext) -> StepResult {
        let address = context.require_str(ADDRESS)?;
        let new_secret = context.require_str(NEW_SECRET)?;
        self.0.reset_password(address.trim(), new_secret).await?;
        Ok(ContextUpdate::new())
    }
}
