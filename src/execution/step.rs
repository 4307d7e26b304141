//! Step Actions
//!
//! The asynchronous operation bound to a step, and the handles used to run
//! one invocation of it outside the workflow:
//! - [`StepAction`]: the injected async action
//! - [`Invocation`]: a pending run, owned by the host until it completes
//! - [`Completion`]: the result fed back into the workflow
//! - [`ActionRegistry`]: named actions for flows loaded from YAML

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StepError;
use crate::workflow::context::{ContextUpdate, WorkflowContext};
use crate::workflow::state::InvocationToken;

/// What a step action yields: fields to merge, or a classified error.
pub type StepResult = Result<ContextUpdate, StepError>;

/// A boxed action future that the host may await or spawn.
pub type ActionFuture = Pin<Box<dyn Future<Output = StepResult> + Send + 'static>>;

/// The external operation a step performs (a request to the auth service).
///
/// Receives the accumulated context including the step's own input, and
/// returns the fields to merge on success. Retries, if any, belong to the
/// implementation.
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self, context: &WorkflowContext) -> StepResult;
}

/// Adapter that turns an async closure into a [`StepAction`].
pub struct FnAction<F>(F);

#[async_trait]
impl<F, Fut> StepAction for FnAction<F>
where
    F: Fn(WorkflowContext) -> Fut + Send + Sync,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    async fn run(&self, context: &WorkflowContext) -> StepResult {
        (self.0)(context.clone()).await
    }
}

/// Wraps an async closure as a shareable action.
///
/// ```
/// use otpflow::execution::{action_fn, StepResult};
/// use otpflow::workflow::ContextUpdate;
///
/// let action = action_fn(|_ctx| async { StepResult::Ok(ContextUpdate::new()) });
/// ```
pub fn action_fn<F, Fut>(f: F) -> Arc<dyn StepAction>
where
    F: Fn(WorkflowContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    Arc::new(FnAction(f))
}

/// One started run of a step action.
///
/// The workflow stays responsive while the host awaits this; the outcome
/// only takes effect once it is passed back as a [`Completion`].
#[must_use = "an invocation does nothing until it is awaited and completed"]
pub struct Invocation {
    token: InvocationToken,
    future: ActionFuture,
}

impl Invocation {
    /// Wraps a started action future with its token.
    pub(crate) fn new(token: InvocationToken, future: ActionFuture) -> Self {
        Self { token, future }
    }

    /// Token identifying this invocation.
    pub fn token(&self) -> InvocationToken {
        self.token
    }

    /// Drives the action to completion.
    pub async fn run(self) -> Completion {
        let outcome = self.future.await;
        Completion {
            token: self.token,
            outcome,
        }
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// The finished outcome of an [`Invocation`], tagged with its token.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub token: InvocationToken,
    pub outcome: StepResult,
}

/// Named actions that YAML flow definitions refer to.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn StepAction>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, action: Arc<dyn StepAction>) {
        self.actions.insert(name.into(), action);
    }

    /// Looks up an action by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn StepAction>> {
        self.actions.get(name).cloned()
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}
