//! Mock Authentication Service
//!
//! Simulates the remote endpoints with a fixed latency. Any well-formed
//! code is accepted unless a specific one is configured.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;

use crate::error::StepError;
use crate::flows::OTP_LENGTH;

use super::{AuthService, Session, UserProfile};

/// Default simulated round trip.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct MockAuthService {
    latency: Duration,
    accepted_code: Option<String>,
    calls: AtomicUsize,
}

impl Default for MockAuthService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthService {
    /// Creates a mock with the default latency that accepts any well-formed code.
    pub fn new() -> Self {
        Self {
            latency: DEFAULT_LATENCY,
            accepted_code: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sets the simulated round-trip time.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Only `code` will verify. `None` accepts any well-formed code.
    pub fn with_accepted_code(mut self, code: Option<String>) -> Self {
        self.accepted_code = code;
        self
    }

    /// Number of endpoint calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn round_trip(&self, endpoint: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!("Mock {} ({}ms)", endpoint, self.latency.as_millis());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn check_code(&self, code: &str) -> Result<(), StepError> {
        let well_formed =
            code.chars().count() == OTP_LENGTH && code.chars().all(|c| c.is_ascii_digit());
        let accepted = self.accepted_code.as_deref().map_or(true, |expected| expected == code);

        if well_formed && accepted {
            Ok(())
        } else {
            Err(StepError::service_with_status("Invalid OTP", 401))
        }
    }
}

#[async_trait]
impl AuthService for MockAuthService {
    async fn login(&self, identifier: &str, secret: &str) -> Result<(), StepError> {
        self.round_trip("login").await;
        if identifier.trim().is_empty() || secret.is_empty() {
            return Err(StepError::service_with_status("Invalid credentials", 401));
        }
        Ok(())
    }

    async fn verify_login_code(&self, identifier: &str, code: &str) -> Result<Session, StepError> {
        self.round_trip("verify-otp").await;
        self.check_code(code)?;

        let email = if identifier.contains('@') {
            identifier.to_string()
        } else {
            format!("{identifier}@example.com")
        };

        Ok(Session {
            token: format!("mock-token-{}", Utc::now().timestamp_millis()),
            user: UserProfile {
                id: "1".to_string(),
                username: identifier.to_string(),
                email,
                role: "admin".to_string(),
            },
        })
    }

    async fn request_password_reset(&self, _email: &str) -> Result<(), StepError> {
        self.round_trip("request-password-reset").await;
        Ok(())
    }

    async fn verify_reset_code(&self, _email: &str, code: &str) -> Result<(), StepError> {
        self.round_trip("verify-password-reset-otp").await;
        self.check_code(code)
    }

    async fn reset_password(&self, _email: &str, _new_secret: &str) -> Result<(), StepError> {
        self.round_trip("reset-password").await;
        Ok(())
    }
}
