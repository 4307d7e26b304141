//! Workflow Definition Module
//!
//! Data structures for describing stepped verification workflows and the
//! per-step state they carry.
//!
//! # Structure
//!
//! - [`model`]: Step and workflow definitions
//! - [`context`]: Accumulated field map
//! - [`rules`]: Local input checks
//! - [`state`]: Async state of a step's action
//! - [`parser`]: YAML loading
//! - [`validator`]: Structural validation

pub mod context;
pub mod model;
pub mod parser;
pub mod rules;
pub mod state;
pub mod validator;

pub use context::{context_update, ContextUpdate, WorkflowContext};
pub use model::{CodeInputConfig, StepDefinition, WorkflowDefinition};
pub use parser::{load_definition, parse_definition};
pub use rules::FieldRule;
pub use state::{AsyncStepState, InvocationToken, StepStatus};
pub use validator::{validate_definition, DefinitionError};
