//! Async Step State
//!
//! Tracks one step's asynchronous action as Idle, Pending, Succeeded or
//! Failed, with a single-flight guarantee. Each invocation is stamped with
//! an [`InvocationToken`]; a completion whose token no longer matches is
//! discarded, so a slow response cannot overwrite state the user has
//! already moved past.

use std::sync::Arc;

use log::debug;

use crate::error::{ConcurrencyError, StepError};
use crate::execution::step::{Invocation, StepAction, StepResult};

use super::context::{ContextUpdate, WorkflowContext};

/// Observable status of a step's action.
#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    /// Nothing has run yet, or the state was reset
    Idle,
    /// An invocation is in flight
    Pending,
    /// The last invocation succeeded with these fields
    Succeeded(ContextUpdate),
    /// The last invocation, or local validation, failed
    Failed(StepError),
}

/// Identifies one invocation.
///
/// `epoch` is assigned by the owning workflow and changes every time a step
/// is entered or the workflow is rewound; `sequence` changes on every
/// invocation and reset within one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvocationToken {
    pub epoch: u64,
    pub sequence: u64,
}

/// State machine around one step's action.
#[derive(Debug, Clone)]
pub struct AsyncStepState {
    status: StepStatus,
    epoch: u64,
    sequence: u64,
}

impl Default for AsyncStepState {
    fn default() -> Self {
        Self::new(0)
    }
}

impl AsyncStepState {
    /// Creates an idle state for the given workflow epoch.
    pub fn new(epoch: u64) -> Self {
        Self {
            status: StepStatus::Idle,
            epoch,
            sequence: 0,
        }
    }

    /// Returns the current status.
    pub fn status(&self) -> &StepStatus {
        &self.status
    }

    /// True while an invocation is in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self.status, StepStatus::Pending)
    }

    /// True if nothing has run since the last reset.
    pub fn is_idle(&self) -> bool {
        matches!(self.status, StepStatus::Idle)
    }

    /// The error to display, if the last attempt failed.
    pub fn error(&self) -> Option<&StepError> {
        match &self.status {
            StepStatus::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Token of the current (or next) invocation.
    pub fn current_token(&self) -> InvocationToken {
        InvocationToken {
            epoch: self.epoch,
            sequence: self.sequence,
        }
    }

    /// Starts `action` against `context`.
    ///
    /// Fails without touching the state if an invocation is already pending.
    /// The returned [`Invocation`] owns everything it needs, so the host can
    /// await it anywhere and report back through [`complete`](Self::complete).
    pub fn invoke(
        &mut self,
        action: Arc<dyn StepAction>,
        context: WorkflowContext,
    ) -> Result<Invocation, ConcurrencyError> {
        if self.is_pending() {
            return Err(ConcurrencyError);
        }

        self.sequence += 1;
        self.status = StepStatus::Pending;
        let token = self.current_token();
        debug!("Invocation {:?} started", token);

        let future = Box::pin(async move { action.run(&context).await });
        Ok(Invocation::new(token, future))
    }

    /// Applies a finished outcome if `token` still names the pending invocation.
    ///
    /// Returns false (and changes nothing) for stale tokens.
    pub fn complete(&mut self, token: InvocationToken, outcome: StepResult) -> bool {
        if !self.accepts(token) {
            debug!(
                "Discarding completion {:?} (current {:?})",
                token,
                self.current_token()
            );
            return false;
        }

        self.status = match outcome {
            Ok(update) => StepStatus::Succeeded(update),
            Err(err) => StepStatus::Failed(err),
        };
        true
    }

    /// Returns true if a completion with `token` would be applied.
    pub fn accepts(&self, token: InvocationToken) -> bool {
        self.is_pending() && token == self.current_token()
    }

    /// Records a failure that never reached the action (local validation).
    pub fn fail_locally(&mut self, err: StepError) -> Result<(), ConcurrencyError> {
        if self.is_pending() {
            return Err(ConcurrencyError);
        }
        self.status = StepStatus::Failed(err);
        Ok(())
    }

    /// Forces the state back to Idle.
    ///
    /// An in-flight action keeps running, but its completion will be
    /// discarded because the sequence has moved on.
    pub fn reset(&mut self) {
        self.sequence += 1;
        self.status = StepStatus::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::execution::step::action_fn;
    use crate::workflow::context::context_update;

    fn echo_action() -> Arc<dyn StepAction> {
        action_fn(|ctx: WorkflowContext| async move {
            let email = ctx.require_str("email")?.to_string();
            StepResult::Ok(context_update([("sent_to", email)]))
        })
    }

    fn context() -> WorkflowContext {
        let mut ctx = WorkflowContext::new();
        ctx.insert("email", "alice@example.com");
        ctx
    }

    #[test]
    fn test_new_state_is_idle() {
        let state = AsyncStepState::new(3);
        assert!(state.is_idle());
        assert_eq!(state.current_token().epoch, 3);
        assert!(state.error().is_none());
    }

    #[tokio::test]
    async fn test_invoke_and_complete_success() {
        let mut state = AsyncStepState::new(0);
        let invocation = state.invoke(echo_action(), context()).unwrap();
        assert!(state.is_pending());

        let completion = invocation.run().await;
        assert!(state.complete(completion.token, completion.outcome));

        assert_eq!(
            state.status(),
            &StepStatus::Succeeded(context_update([("sent_to", "alice@example.com")]))
        );
    }

    #[tokio::test]
    async fn test_invoke_and_complete_failure() {
        let mut state = AsyncStepState::new(0);
        let invocation = state.invoke(echo_action(), WorkflowContext::new()).unwrap();

        let completion = invocation.run().await;
        state.complete(completion.token, completion.outcome);

        assert_eq!(
            state.error(),
            Some(&StepError::Validation(ValidationError::MissingField(
                "email".to_string()
            )))
        );
    }

    #[test]
    fn test_second_invoke_while_pending_is_rejected() {
        let mut state = AsyncStepState::new(0);
        let first = state.invoke(echo_action(), context()).unwrap();

        let second = state.invoke(echo_action(), context());
        assert_eq!(second.err(), Some(ConcurrencyError));
        assert!(state.is_pending());
        assert_eq!(state.current_token(), first.token());
    }

    #[tokio::test]
    async fn test_completion_after_reset_is_discarded() {
        let mut state = AsyncStepState::new(0);
        let invocation = state.invoke(echo_action(), context()).unwrap();

        state.reset();
        let completion = invocation.run().await;

        assert!(!state.complete(completion.token, completion.outcome));
        assert!(state.is_idle());
    }

    #[tokio::test]
    async fn test_completion_for_older_invocation_is_discarded() {
        let mut state = AsyncStepState::new(0);
        let old = state.invoke(echo_action(), context()).unwrap();
        state.reset();
        let current = state.invoke(echo_action(), context()).unwrap();

        let stale = old.run().await;
        assert!(!state.complete(stale.token, stale.outcome));
        assert!(state.is_pending());

        let fresh = current.run().await;
        assert!(state.complete(fresh.token, fresh.outcome));
    }

    #[test]
    fn test_reset_clears_failure() {
        let mut state = AsyncStepState::new(0);
        state.fail_locally(StepError::service("Invalid code")).unwrap();
        assert!(state.error().is_some());

        state.reset();
        assert!(state.is_idle());
    }

    #[test]
    fn test_fail_locally_while_pending_is_rejected() {
        let mut state = AsyncStepState::new(0);
        let _invocation = state.invoke(echo_action(), context()).unwrap();

        assert_eq!(
            state.fail_locally(StepError::service("late")),
            Err(ConcurrencyError)
        );
        assert!(state.is_pending());
    }
}
