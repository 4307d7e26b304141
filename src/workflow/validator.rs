//! Workflow Validation
//!
//! Checks a [`WorkflowDefinition`] before it can drive a workflow:
//! - Step ids present and unique
//! - Positions unique, steps sorted by position
//! - Exactly one terminal step, placed last, without an action or code entry
//! - Every other step has an action
//! - Expiry and code lengths are non-zero
//! - The first step is not time-boxed (resending needs a previous step)

use std::collections::HashSet;

use log::{debug, info};
use thiserror::Error;

use super::model::{StepDefinition, WorkflowDefinition};

/// Structural problems in a workflow definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Workflow has no steps")]
    EmptyWorkflow,

    #[error("Step has empty or whitespace-only ID")]
    EmptyStepId,

    #[error("Duplicate step ID: '{0}'")]
    DuplicateStepId(String),

    #[error("Steps '{first}' and '{second}' share position {position}")]
    DuplicatePosition {
        first: String,
        second: String,
        position: usize,
    },

    #[error("Workflow has no terminal step")]
    NoTerminalStep,

    #[error("Workflow has more than one terminal step: {0:?}")]
    MultipleTerminalSteps(Vec<String>),

    #[error("Terminal step '{0}' must be the last step")]
    TerminalNotLast(String),

    #[error("Terminal step '{0}' cannot have an action")]
    TerminalWithAction(String),

    #[error("Terminal step '{0}' cannot have an expiry or a code input")]
    TerminalWithInput(String),

    #[error("Step '{0}' has no action")]
    MissingAction(String),

    #[error("Step '{step}' references unknown action '{action}'")]
    UnknownAction { step: String, action: String },

    #[error("Step '{0}' has a zero expiry")]
    ZeroExpiry(String),

    #[error("Step '{0}' has a zero-length code input")]
    ZeroCodeLength(String),

    #[error("First step '{0}' cannot be time-boxed")]
    TimeBoxedFirstStep(String),

    #[error("Failed to read workflow file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse workflow YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Validates a single step's fields.
fn validate_step(step: &StepDefinition) -> Result<(), DefinitionError> {
    if step.id.trim().is_empty() {
        return Err(DefinitionError::EmptyStepId);
    }

    if step.terminal && step.action.is_some() {
        return Err(DefinitionError::TerminalWithAction(step.id.clone()));
    }

    if step.terminal && (step.expiry_seconds.is_some() || step.code_input.is_some()) {
        return Err(DefinitionError::TerminalWithInput(step.id.clone()));
    }

    if !step.terminal && step.action.is_none() {
        return Err(DefinitionError::MissingAction(step.id.clone()));
    }

    if step.expiry_seconds == Some(0) {
        return Err(DefinitionError::ZeroExpiry(step.id.clone()));
    }

    if matches!(&step.code_input, Some(code) if code.length == 0) {
        return Err(DefinitionError::ZeroCodeLength(step.id.clone()));
    }

    if step.is_time_boxed() && step.code_input.is_none() {
        debug!("Step '{}' is time-boxed without a code input", step.id);
    }

    Ok(())
}

/// Validates the entire workflow structure.
///
/// On success, the steps are reordered by ascending position.
pub fn validate_definition(definition: &mut WorkflowDefinition) -> Result<(), DefinitionError> {
    info!(
        "Validating workflow '{}' with {} steps",
        definition.name,
        definition.steps.len()
    );

    if definition.steps.is_empty() {
        return Err(DefinitionError::EmptyWorkflow);
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in &definition.steps {
        validate_step(step)?;
        if !seen_ids.insert(step.id.as_str()) {
            return Err(DefinitionError::DuplicateStepId(step.id.clone()));
        }
    }

    definition.steps.sort_by_key(|s| s.position);

    for pair in definition.steps.windows(2) {
        if pair[0].position == pair[1].position {
            return Err(DefinitionError::DuplicatePosition {
                first: pair[0].id.clone(),
                second: pair[1].id.clone(),
                position: pair[0].position,
            });
        }
    }

    let terminals: Vec<String> = definition
        .steps
        .iter()
        .filter(|s| s.terminal)
        .map(|s| s.id.clone())
        .collect();

    match terminals.as_slice() {
        [] => return Err(DefinitionError::NoTerminalStep),
        [only] => {
            let last = definition.steps.last().map(|s| s.id.as_str());
            if last != Some(only.as_str()) {
                return Err(DefinitionError::TerminalNotLast(only.clone()));
            }
        }
        _ => return Err(DefinitionError::MultipleTerminalSteps(terminals)),
    }

    if let Some(first) = definition.steps.first() {
        if first.is_time_boxed() {
            return Err(DefinitionError::TimeBoxedFirstStep(first.id.clone()));
        }
    }

    debug!("Step order: {:?}", definition.step_ids());
    info!("Workflow '{}' validated", definition.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::step::{action_fn, StepAction, StepResult};
    use crate::workflow::context::ContextUpdate;
    use std::sync::Arc;

    fn noop() -> Arc<dyn StepAction> {
        action_fn(|_ctx| async { StepResult::Ok(ContextUpdate::new()) })
    }

    fn three_step_flow() -> WorkflowDefinition {
        WorkflowDefinition::from_steps(
            "reset",
            vec![
                StepDefinition::new("email", 0).with_action(noop()),
                StepDefinition::new("otp", 1)
                    .with_action(noop())
                    .with_expiry(120)
                    .with_code_input("code", 6),
                StepDefinition::new("success", 2).terminal(),
            ],
        )
    }

    #[test]
    fn test_valid_definition() {
        let mut flow = three_step_flow();
        assert!(validate_definition(&mut flow).is_ok());
    }

    #[test]
    fn test_steps_sorted_by_position() {
        let mut flow = WorkflowDefinition::from_steps(
            "unordered",
            vec![
                StepDefinition::new("done", 9).terminal(),
                StepDefinition::new("second", 5).with_action(noop()),
                StepDefinition::new("first", 1).with_action(noop()),
            ],
        );

        validate_definition(&mut flow).unwrap();
        assert_eq!(flow.step_ids(), vec!["first", "second", "done"]);
    }

    #[test]
    fn test_empty_workflow() {
        let mut flow = WorkflowDefinition::new("empty");
        assert!(matches!(
            validate_definition(&mut flow),
            Err(DefinitionError::EmptyWorkflow)
        ));
    }

    #[test]
    fn test_duplicate_position() {
        let mut flow = three_step_flow();
        flow.steps[1].position = 0;
        assert!(matches!(
            validate_definition(&mut flow),
            Err(DefinitionError::DuplicatePosition { position: 0, .. })
        ));
    }

    #[test]
    fn test_duplicate_id() {
        let mut flow = three_step_flow();
        flow.steps[1].id = "email".to_string();
        assert!(matches!(
            validate_definition(&mut flow),
            Err(DefinitionError::DuplicateStepId(_))
        ));
    }

    #[test]
    fn test_missing_terminal() {
        let mut flow = three_step_flow();
        flow.steps.pop();
        assert!(matches!(
            validate_definition(&mut flow),
            Err(DefinitionError::NoTerminalStep)
        ));
    }

    #[test]
    fn test_terminal_must_be_last() {
        let mut flow = three_step_flow();
        flow.steps[2].position = 0;
        flow.steps[0].position = 2;
        assert!(matches!(
            validate_definition(&mut flow),
            Err(DefinitionError::TerminalNotLast(id)) if id == "success"
        ));
    }

    #[test]
    fn test_multiple_terminals() {
        let mut flow = three_step_flow();
        flow.steps.push(StepDefinition::new("also_done", 3).terminal());
        assert!(matches!(
            validate_definition(&mut flow),
            Err(DefinitionError::MultipleTerminalSteps(ids)) if ids.len() == 2
        ));
    }

    #[test]
    fn test_action_rules() {
        let mut missing = three_step_flow();
        missing.steps[0].action = None;
        assert!(matches!(
            validate_definition(&mut missing),
            Err(DefinitionError::MissingAction(_))
        ));

        let mut terminal_action = three_step_flow();
        terminal_action.steps[2].action = Some(noop());
        assert!(matches!(
            validate_definition(&mut terminal_action),
            Err(DefinitionError::TerminalWithAction(_))
        ));
    }

    #[test]
    fn test_terminal_with_code_entry_rejected() {
        let mut expiry = three_step_flow();
        expiry.steps[2].expiry_seconds = Some(5);
        assert!(matches!(
            validate_definition(&mut expiry),
            Err(DefinitionError::TerminalWithInput(id)) if id == "success"
        ));

        let mut code = three_step_flow();
        code.steps[2] = code.steps[2].clone().with_code_input("code", 6);
        assert!(matches!(
            validate_definition(&mut code),
            Err(DefinitionError::TerminalWithInput(_))
        ));
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut expiry = three_step_flow();
        expiry.steps[1].expiry_seconds = Some(0);
        assert!(matches!(
            validate_definition(&mut expiry),
            Err(DefinitionError::ZeroExpiry(_))
        ));

        let mut code = three_step_flow();
        code.steps[1] = code.steps[1].clone().with_code_input("code", 0);
        assert!(matches!(
            validate_definition(&mut code),
            Err(DefinitionError::ZeroCodeLength(_))
        ));
    }

    #[test]
    fn test_time_boxed_first_step_rejected() {
        let mut flow = three_step_flow();
        flow.steps[0].expiry_seconds = Some(60);
        assert!(matches!(
            validate_definition(&mut flow),
            Err(DefinitionError::TimeBoxedFirstStep(_))
        ));
    }
}
