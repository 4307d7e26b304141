//! Workflow Execution Module
//!
//! Runs workflow definitions: step actions, single-flight invocations and
//! the state machine that sequences steps.
//!
//! # Architecture
//!
//! - [`engine`]: [`StepWorkflow`], the step sequencer
//! - [`step`]: Step actions, invocations and the action registry

pub mod engine;
pub mod step;

pub use engine::{Resolution, StepWorkflow};
pub use step::{
    action_fn, ActionFuture, ActionRegistry, Completion, Invocation, StepAction, StepResult,
};
