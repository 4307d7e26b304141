//! Built-in Flows
//!
//! Login and password-reset workflows wired to an [`AuthService`].
//!
//! - [`login`]: credentials → otp → authenticated
//! - [`password_reset`]: email → otp → reset → success
//! - [`actions`]: The service-backed step actions both flows use
//!
//! [`auth_actions`] exposes the same actions by name, for flows loaded
//! from YAML.

pub mod actions;
pub mod login;
pub mod password_reset;

use std::sync::Arc;

use crate::execution::ActionRegistry;
use crate::service::AuthService;

pub use login::{login_flow, session_token, session_user};
pub use password_reset::password_reset_flow;

/// Number of cells in a one-time code.
pub const OTP_LENGTH: usize = 6;

/// Lifetime of a one-time code, in seconds.
pub const OTP_COUNTDOWN_SECONDS: u32 = 120;

pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Context field names used by the built-in flows.
pub mod fields {
    pub const IDENTIFIER: &str = "identifier";
    pub const SECRET: &str = "secret";
    pub const CODE: &str = "code";
    pub const ADDRESS: &str = "address";
    pub const NEW_SECRET: &str = "new_secret";
    pub const CONFIRM_SECRET: &str = "confirm_secret";
    pub const SESSION_TOKEN: &str = "session_token";
    pub const USER: &str = "user";
}

/// Registry of the service-backed actions, keyed by name.
pub fn auth_actions(service: Arc<dyn AuthService>) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register("login", Arc::new(actions::Login(Arc::clone(&service))));
    registry.register(
        "verify_login_code",
        Arc::new(actions::VerifyLoginCode(Arc::clone(&service))),
    );
    registry.register(
        "request_password_reset",
        Arc::new(actions::RequestPasswordReset(Arc::clone(&service))),
    );
    registry.register(
        "verify_reset_code",
        Arc::new(actions::VerifyResetCode(Arc::clone(&service))),
    );
    registry.register("reset_password", Arc::new(actions::ResetPassword(service)));
    registry
}
