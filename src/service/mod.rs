//! Authentication Service
//!
//! The collaborator the built-in flows talk to. Implementations classify
//! their own failures into [`StepError::Service`] or
//! [`StepError::Transport`]; the flows only pass them through.
//!
//! - [`mock`]: In-process implementation with simulated latency

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StepError;

pub use mock::MockAuthService;

/// Profile of an authenticated user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
}

/// Result of a verified login.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Remote endpoints behind the login and password-reset flows.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Checks credentials and triggers delivery of a login code.
    async fn login(&self, identifier: &str, secret: &str) -> Result<(), StepError>;

    /// Exchanges a login code for a session.
    async fn verify_login_code(&self, identifier: &str, code: &str) -> Result<Session, StepError>;

    /// Sends a reset code to `email`. Also used to resend it.
    async fn request_password_reset(&self, email: &str) -> Result<(), StepError>;

    async fn verify_reset_code(&self, email: &str, code: &str) -> Result<(), StepError>;

    async fn reset_password(&self, email: &str, new_secret: &str) -> Result<(), StepError>;
}
