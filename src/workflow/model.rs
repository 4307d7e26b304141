//! Workflow Data Model
//!
//! A workflow is an ordered list of [`StepDefinition`]s. Exactly one step
//! is terminal and comes last; every other step carries the action that
//! confirms it.
//!
//! # Example
//!
//! ```
//! use otpflow::execution::{action_fn, StepResult};
//! use otpflow::workflow::{ContextUpdate, StepDefinition, WorkflowDefinition};
//!
//! let send = action_fn(|_ctx| async { StepResult::Ok(ContextUpdate::new()) });
//! let verify = action_fn(|_ctx| async { StepResult::Ok(ContextUpdate::new()) });
//!
//! let mut flow = WorkflowDefinition::new("verify-email");
//! flow.add_step(StepDefinition::new("email", 0).with_action(send).with_fields(["email"]))
//!     .unwrap();
//! flow.add_step(
//!     StepDefinition::new("otp", 1)
//!         .with_action(verify)
//!         .with_expiry(120)
//!         .with_code_input("code", 6),
//! )
//! .unwrap();
//! flow.add_step(StepDefinition::new("done", 2).terminal()).unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::execution::step::StepAction;
use crate::input::{CharClass, SegmentedCodeInput, DEFAULT_CODE_LENGTH};

use super::rules::FieldRule;
use super::validator::DefinitionError;

/// How a step collects a segmented code.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CodeInputConfig {
    /// Context field the code is submitted under
    pub field: String,

    /// Number of cells
    #[serde(default = "default_code_length")]
    pub length: usize,

    /// Characters accepted in each cell
    #[serde(default)]
    pub class: CharClass,
}

fn default_code_length() -> usize {
    DEFAULT_CODE_LENGTH
}

impl CodeInputConfig {
    /// Creates a digit-only code input of `length` cells for `field`.
    pub fn new(field: impl Into<String>, length: usize) -> Self {
        Self {
            field: field.into(),
            length,
            class: CharClass::Digit,
        }
    }

    /// Creates an empty input matching this configuration.
    pub fn build(&self) -> SegmentedCodeInput {
        SegmentedCodeInput::with_class(self.length, self.class)
    }
}

/// One node in a workflow.
#[derive(Clone)]
pub struct StepDefinition {
    /// Unique identifier
    pub id: String,

    /// Order within the workflow (ascending)
    pub position: usize,

    /// Action that confirms this step; absent only on the terminal step
    pub action: Option<Arc<dyn StepAction>>,

    /// Field names the host should collect for this step
    pub fields: Vec<String>,

    /// Seconds before submissions stop being accepted
    pub expiry_seconds: Option<u32>,

    /// Segmented code collected on this step
    pub code_input: Option<CodeInputConfig>,

    /// Local checks applied before the action runs
    pub rules: Vec<FieldRule>,

    /// Marks the "done" state
    pub terminal: bool,
}

impl StepDefinition {
    /// Creates a step with the given ID and position.
    pub fn new(id: impl Into<String>, position: usize) -> Self {
        Self {
            id: id.into().trim().to_string(),
            position,
            action: None,
            fields: Vec::new(),
            expiry_seconds: None,
            code_input: None,
            rules: Vec::new(),
            terminal: false,
        }
    }

    /// Sets the action that confirms this step.
    pub fn with_action(mut self, action: Arc<dyn StepAction>) -> Self {
        self.action = Some(action);
        self
    }

    /// Sets the fields the host collects for this step.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Time-boxes the step; a countdown is armed each time it becomes active.
    pub fn with_expiry(mut self, seconds: u32) -> Self {
        self.expiry_seconds = Some(seconds);
        self
    }

    /// Collects a digit code of `length` cells under `field`.
    pub fn with_code_input(mut self, field: impl Into<String>, length: usize) -> Self {
        self.code_input = Some(CodeInputConfig::new(field, length));
        self
    }

    /// Sets the code input from a full configuration.
    pub fn with_code_config(mut self, config: CodeInputConfig) -> Self {
        self.code_input = Some(config);
        self
    }

    /// Adds a local input rule.
    pub fn with_rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Marks this step as the terminal (done) step.
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    /// True if submissions require a non-expired countdown.
    pub fn is_time_boxed(&self) -> bool {
        self.expiry_seconds.is_some()
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("has_action", &self.action.is_some())
            .field("fields", &self.fields)
            .field("expiry_seconds", &self.expiry_seconds)
            .field("code_input", &self.code_input)
            .field("rules", &self.rules)
            .field("terminal", &self.terminal)
            .finish()
    }
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, Default)]
pub struct WorkflowDefinition {
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

impl WorkflowDefinition {
    /// Creates an empty workflow.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Creates a workflow from a list of steps.
    pub fn from_steps(name: impl Into<String>, steps: Vec<StepDefinition>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Appends a step, rejecting duplicate ids.
    pub fn add_step(&mut self, step: StepDefinition) -> Result<(), DefinitionError> {
        if self.get_step(&step.id).is_some() {
            return Err(DefinitionError::DuplicateStepId(step.id));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Gets a step by ID.
    pub fn get_step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the workflow has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step ids in their current order.
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }
}
