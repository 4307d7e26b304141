//! Step Workflow Engine
//!
//! The state machine that sequences a workflow's steps:
//! - Single-flight submission of the active step through its action
//! - Advancement in ascending position order on success
//! - Countdown gating of time-boxed steps, with resend through the previous step
//! - Go-back, cancel and restart, with stale completions discarded by token
//!
//! Every operation runs to completion synchronously. Only the action runs
//! asynchronously: the host awaits the returned [`Invocation`] and hands the
//! [`Completion`] back through [`StepWorkflow::complete`].

use std::mem;

use log::{debug, info, warn};
use serde_json::Value;

use crate::error::{ConcurrencyError, StepError, ValidationError, WorkflowError};
use crate::input::{CountdownTimer, SegmentedCodeInput};
use crate::monitoring::{EventType, WorkflowTimeline};
use crate::workflow::rules::check_rules;
use crate::workflow::{
    validate_definition, AsyncStepState, CodeInputConfig, ContextUpdate, DefinitionError,
    InvocationToken, StepDefinition, StepStatus, WorkflowContext, WorkflowDefinition,
};

use super::step::{Completion, Invocation};

/// What applying a [`Completion`] did to the workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Moved on to this (non-terminal) step
    Advanced { step: String },
    /// Reached the terminal step; the outcome is ready to take
    Completed { step: String },
    /// Action failed; the workflow stays on the same step
    Failed(StepError),
    /// Resend succeeded; countdown and code input were reset
    Resent,
    /// Completion belonged to an invocation that is no longer current
    Discarded,
}

/// Why the active step has an invocation in flight.
#[derive(Debug, Clone)]
enum PendingKind {
    /// The step's own action, with the input to commit on success
    Submit { staged: ContextUpdate },
    /// The previous step's action, re-issuing a code
    Resend,
}

/// Per-step resources, recreated every time a step becomes active.
#[derive(Debug, Clone)]
struct ActiveStep {
    index: usize,
    state: AsyncStepState,
    countdown: Option<CountdownTimer>,
    code: Option<SegmentedCodeInput>,
    pending: Option<PendingKind>,
}

#[derive(Debug, Clone)]
enum Phase {
    Active(ActiveStep),
    Cancelled,
}

/// Drives one attempt through a [`WorkflowDefinition`].
///
/// A cancelled workflow is not reused; create a new one for the next attempt.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use otpflow::execution::StepWorkflow;
/// use otpflow::flows::login_flow;
/// use otpflow::service::MockAuthService;
/// use otpflow::workflow::context_update;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut workflow = StepWorkflow::new(login_flow(Arc::new(MockAuthService::new())))?;
///
///     let credentials = context_update([("identifier", "alice"), ("secret", "x")]);
///     let invocation = workflow.submit_step(credentials)?;
///     let completion = invocation.run().await;
///     workflow.complete(completion);
///
///     assert_eq!(workflow.current_step_id(), Some("otp"));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct StepWorkflow {
    definition: WorkflowDefinition,
    context: WorkflowContext,
    phase: Phase,
    epoch: u64,
    outcome: Option<WorkflowContext>,
    timeline: WorkflowTimeline,
}

impl StepWorkflow {
    /// Validates the definition and activates its first step.
    pub fn new(mut definition: WorkflowDefinition) -> Result<Self, DefinitionError> {
        validate_definition(&mut definition)?;

        let mut workflow = Self {
            definition,
            context: WorkflowContext::new(),
            phase: Phase::Cancelled,
            epoch: 0,
            outcome: None,
            timeline: WorkflowTimeline::new(),
        };
        workflow.enter(0);
        Ok(workflow)
    }

    /// Returns the workflow's name.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Returns the validated definition.
    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// Returns the context accumulated so far.
    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    /// Returns the recorded transitions.
    pub fn timeline(&self) -> &WorkflowTimeline {
        &self.timeline
    }

    fn active(&self) -> Option<&ActiveStep> {
        match &self.phase {
            Phase::Active(active) => Some(active),
            Phase::Cancelled => None,
        }
    }

    /// Index of the active step; `None` once cancelled.
    pub fn current_index(&self) -> Option<usize> {
        self.active().map(|a| a.index)
    }

    /// Returns the active step's definition.
    pub fn current_step(&self) -> Option<&StepDefinition> {
        self.current_index().map(|i| &self.definition.steps[i])
    }

    /// Returns the active step's ID.
    pub fn current_step_id(&self) -> Option<&str> {
        self.current_step().map(|s| s.id.as_str())
    }

    /// Status of the active step's action.
    pub fn status(&self) -> Option<&StepStatus> {
        self.active().map(|a| a.state.status())
    }

    /// Error to display on the active step.
    pub fn error(&self) -> Option<&StepError> {
        self.active().and_then(|a| a.state.error())
    }

    /// Token of the in-flight invocation, if any.
    pub fn pending_token(&self) -> Option<InvocationToken> {
        self.active()
            .filter(|a| a.state.is_pending())
            .map(|a| a.state.current_token())
    }

    /// Countdown of the active step, if it is time-boxed.
    pub fn countdown(&self) -> Option<&CountdownTimer> {
        self.active().and_then(|a| a.countdown.as_ref())
    }

    /// Code cells of the active step, if it collects a code.
    pub fn code_input(&self) -> Option<&SegmentedCodeInput> {
        self.active().and_then(|a| a.code.as_ref())
    }

    /// Code cells of the active step, for the host to forward edits into.
    pub fn code_input_mut(&mut self) -> Option<&mut SegmentedCodeInput> {
        match &mut self.phase {
            Phase::Active(active) => active.code.as_mut(),
            Phase::Cancelled => None,
        }
    }

    /// True while the active step has an invocation in flight.
    pub fn is_pending(&self) -> bool {
        self.active().is_some_and(|a| a.state.is_pending())
    }

    /// True if the active step's countdown has run out.
    pub fn is_expired(&self) -> bool {
        self.countdown().is_some_and(CountdownTimer::is_expired)
    }

    /// True once the workflow has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.phase, Phase::Cancelled)
    }

    /// True once the terminal step is active.
    pub fn is_complete(&self) -> bool {
        self.current_step().is_some_and(|s| s.terminal)
    }

    /// True once the workflow is done or cancelled.
    pub fn is_finished(&self) -> bool {
        self.is_cancelled() || self.is_complete()
    }

    /// Whether a submission would currently be accepted for invocation.
    pub fn can_submit(&self) -> bool {
        !self.is_finished() && !self.is_pending() && !self.is_expired()
    }

    /// Whether there is a previous step to return to.
    pub fn can_go_back(&self) -> bool {
        !self.is_complete() && self.current_index().is_some_and(|i| i > 0)
    }

    /// Whether a new code can be requested for the active step.
    pub fn can_resend(&self) -> bool {
        !self.is_finished()
            && !self.is_pending()
            && self.current_index().is_some_and(|i| i > 0)
            && self.current_step().is_some_and(StepDefinition::is_time_boxed)
    }

    /// Hands over the accumulated context once the terminal step is reached.
    pub fn take_outcome(&mut self) -> Option<WorkflowContext> {
        self.outcome.take()
    }

    /// Submits input for the active step.
    ///
    /// The input is checked locally first; on failure the error is shown on
    /// the step and no action runs. Otherwise the step's action is started
    /// against the context merged with the input. Nothing is committed to
    /// the context until the action succeeds.
    pub fn submit_step(&mut self, input: ContextUpdate) -> Result<Invocation, WorkflowError> {
        let Phase::Active(active) = &mut self.phase else {
            return Err(WorkflowError::Cancelled);
        };
        let step = &self.definition.steps[active.index];

        if step.terminal {
            return Err(WorkflowError::Finished);
        }

        if active.state.is_pending() {
            warn!("Submit on step '{}' while an invocation is pending", step.id);
            return Err(ConcurrencyError.into());
        }

        if active.countdown.as_ref().is_some_and(CountdownTimer::is_expired) {
            return Err(WorkflowError::Expired {
                step: step.id.clone(),
            });
        }

        let mut staged = input;
        if let (Some(config), Some(code)) = (&step.code_input, &active.code) {
            staged
                .entry(config.field.clone())
                .or_insert_with(|| Value::String(code.value()));
        }

        let candidate = self.context.merged_with(&staged);
        if let Err(err) = validate_input(step, &candidate) {
            info!("Step '{}' input rejected: {}", step.id, err);
            active.state.fail_locally(StepError::Validation(err.clone()))?;
            self.timeline.add_event(step.id.clone(), EventType::Rejected);
            return Err(err.into());
        }

        let Some(action) = step.action.clone() else {
            return Err(WorkflowError::Finished);
        };

        let invocation = active.state.invoke(action, candidate)?;
        active.pending = Some(PendingKind::Submit { staged });

        debug!("Step '{}' submitted as {:?}", step.id, invocation.token());
        self.timeline.add_event(step.id.clone(), EventType::Submitted);
        Ok(invocation)
    }

    /// Re-issues the code for a time-boxed step by re-invoking the previous
    /// step's action. Allowed before or after expiry.
    pub fn resend(&mut self) -> Result<Invocation, WorkflowError> {
        let Phase::Active(active) = &mut self.phase else {
            return Err(WorkflowError::Cancelled);
        };
        let index = active.index;
        let step = &self.definition.steps[index];

        if step.terminal {
            return Err(WorkflowError::Finished);
        }

        let previous_action = index
            .checked_sub(1)
            .filter(|_| step.is_time_boxed())
            .and_then(|prev| self.definition.steps[prev].action.clone());

        let Some(action) = previous_action else {
            return Err(WorkflowError::ResendUnavailable {
                step: step.id.clone(),
            });
        };

        if active.state.is_pending() {
            warn!("Resend on step '{}' while an invocation is pending", step.id);
            return Err(ConcurrencyError.into());
        }

        let invocation = active.state.invoke(action, self.context.clone())?;
        active.pending = Some(PendingKind::Resend);

        info!("Requesting a new code for step '{}'", step.id);
        self.timeline
            .add_event(step.id.clone(), EventType::ResendRequested);
        Ok(invocation)
    }

    /// Applies the outcome of an invocation.
    ///
    /// Completions whose token no longer matches the active step (after a
    /// go-back, cancel, restart or reset) are discarded without any change.
    pub fn complete(&mut self, completion: Completion) -> Resolution {
        let Completion { token, outcome } = completion;

        let Phase::Active(active) = &mut self.phase else {
            debug!("Discarding completion {:?}: workflow cancelled", token);
            return Resolution::Discarded;
        };
        let step = &self.definition.steps[active.index];

        if !active.state.accepts(token) {
            debug!("Discarding stale completion {:?} for step '{}'", token, step.id);
            self.timeline.add_event(step.id.clone(), EventType::Discarded);
            return Resolution::Discarded;
        }

        let Some(kind) = active.pending.take() else {
            warn!("Completion {:?} has no pending submission on step '{}'", token, step.id);
            return Resolution::Discarded;
        };

        active.state.complete(token, outcome.clone());

        match (kind, outcome) {
            (_, Err(err)) => {
                info!("Step '{}' failed: {}", step.id, err);
                self.timeline.add_event(step.id.clone(), EventType::Failed);
                Resolution::Failed(err)
            }
            (PendingKind::Resend, Ok(update)) => {
                self.context.merge(update);
                // A new code re-enters the step: fresh state under a new epoch.
                self.epoch += 1;
                active.state = AsyncStepState::new(self.epoch);
                if let Some(seconds) = step.expiry_seconds {
                    active.countdown = Some(CountdownTimer::started(seconds));
                }
                if let Some(code) = active.code.as_mut() {
                    code.reset();
                }
                info!("New code issued for step '{}'", step.id);
                self.timeline.add_event(step.id.clone(), EventType::Resent);
                Resolution::Resent
            }
            (PendingKind::Submit { staged }, Ok(update)) => {
                self.context.merge(staged);
                self.context.merge(update);
                self.timeline.add_event(step.id.clone(), EventType::Succeeded);
                self.advance()
            }
        }
    }

    /// Submits and awaits in one call, for hosts that do not interleave events.
    pub async fn submit_and_wait(
        &mut self,
        input: ContextUpdate,
    ) -> Result<Resolution, WorkflowError> {
        let invocation = self.submit_step(input)?;
        let completion = invocation.run().await;
        Ok(self.complete(completion))
    }

    /// Resends and awaits in one call.
    pub async fn resend_and_wait(&mut self) -> Result<Resolution, WorkflowError> {
        let invocation = self.resend()?;
        let completion = invocation.run().await;
        Ok(self.complete(completion))
    }

    /// Returns to the previous step with a fresh, idle state.
    ///
    /// A pending invocation on the current step is abandoned.
    pub fn go_back(&mut self) -> Result<(), WorkflowError> {
        let index = self.current_index().ok_or(WorkflowError::Cancelled)?;
        let step = &self.definition.steps[index];

        if step.terminal {
            return Err(WorkflowError::Finished);
        }
        if index == 0 {
            return Err(WorkflowError::NoPreviousStep {
                step: step.id.clone(),
            });
        }

        info!("Going back from step '{}'", step.id);
        self.timeline.add_event(step.id.clone(), EventType::WentBack);
        self.enter(index - 1);
        Ok(())
    }

    /// Abandons the attempt and clears the context.
    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        let index = self.current_index().ok_or(WorkflowError::Cancelled)?;
        let step = &self.definition.steps[index];

        if step.terminal {
            return Err(WorkflowError::Finished);
        }

        info!("Workflow '{}' cancelled at step '{}'", self.definition.name, step.id);
        self.timeline.add_event(step.id.clone(), EventType::Cancelled);

        self.epoch += 1;
        self.context.clear();
        self.phase = Phase::Cancelled;
        Ok(())
    }

    /// Returns to the first step with an empty context.
    pub fn restart(&mut self) -> Result<(), WorkflowError> {
        let index = self.current_index().ok_or(WorkflowError::Cancelled)?;
        let step_id = self.definition.steps[index].id.clone();

        info!("Workflow '{}' restarted from step '{}'", self.definition.name, step_id);
        self.timeline.add_event(step_id, EventType::Restarted);

        self.context.clear();
        self.outcome = None;
        self.enter(0);
        Ok(())
    }

    /// Advances the active step's countdown by one second.
    ///
    /// Returns true on the tick that expires it. From then on submissions
    /// are refused until a resend succeeds.
    pub fn tick(&mut self) -> bool {
        let Phase::Active(active) = &mut self.phase else {
            return false;
        };
        let Some(countdown) = active.countdown.as_mut() else {
            return false;
        };
        if !countdown.tick() {
            return false;
        }

        let step_id = &self.definition.steps[active.index].id;
        info!("Step '{}' expired; a new code is required", step_id);
        self.timeline.add_event(step_id.clone(), EventType::Expired);
        true
    }

    /// Moves to the step after the active one.
    fn advance(&mut self) -> Resolution {
        let Some(index) = self.current_index() else {
            return Resolution::Discarded;
        };

        // Validation guarantees a terminal step after every non-terminal one.
        let next = index + 1;
        self.enter(next);

        let step = &self.definition.steps[next];
        if step.terminal {
            self.outcome = Some(mem::take(&mut self.context));
            info!(
                "Workflow '{}' completed at step '{}'",
                self.definition.name, step.id
            );
            self.timeline.add_event(step.id.clone(), EventType::Completed);
            Resolution::Completed {
                step: step.id.clone(),
            }
        } else {
            Resolution::Advanced {
                step: step.id.clone(),
            }
        }
    }

    /// Activates a step with fresh state, countdown and code input.
    fn enter(&mut self, index: usize) {
        self.epoch += 1;
        let step = &self.definition.steps[index];

        self.phase = Phase::Active(ActiveStep {
            index,
            state: AsyncStepState::new(self.epoch),
            countdown: step.expiry_seconds.map(CountdownTimer::started),
            code: step.code_input.as_ref().map(CodeInputConfig::build),
            pending: None,
        });

        info!(
            "Step '{}' active ({}/{})",
            step.id,
            index + 1,
            self.definition.steps.len()
        );
        self.timeline.add_event(step.id.clone(), EventType::Entered);
    }
}

/// Runs the step's code check and field rules against the candidate context.
fn validate_input(
    step: &StepDefinition,
    candidate: &WorkflowContext,
) -> Result<(), ValidationError> {
    if let Some(config) = &step.code_input {
        validate_code(config, candidate)?;
    }
    check_rules(&step.rules, candidate)
}

fn validate_code(
    config: &CodeInputConfig,
    candidate: &WorkflowContext,
) -> Result<(), ValidationError> {
    let code = candidate
        .get_str(&config.field)
        .ok_or_else(|| ValidationError::MissingField(config.field.clone()))?;

    let actual = code.chars().count();
    if actual != config.length {
        return Err(ValidationError::CodeLength {
            expected: config.length,
            actual,
        });
    }

    if !config.class.accepts_all(code) {
        return Err(ValidationError::CodeCharacters);
    }
    Ok(())
}
