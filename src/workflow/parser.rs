//! Workflow Parser
//!
//! Loads workflow definitions from YAML. Actions cannot be expressed in
//! YAML, so each step names an action that is looked up in an
//! [`ActionRegistry`].
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: login
//! steps:
//!   - id: credentials
//!     action: login
//!     fields: [identifier, secret]
//!     rules:
//!       - rule: required
//!         field: identifier
//!
//!   - id: otp
//!     action: verify_login_code
//!     expiry_seconds: 120
//!     code_input:
//!       field: code
//!       length: 6
//!
//!   - id: authenticated
//!     terminal: true
//! ```

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::execution::step::ActionRegistry;

use super::model::{CodeInputConfig, StepDefinition, WorkflowDefinition};
use super::rules::FieldRule;
use super::validator::{validate_definition, DefinitionError};

/// Serialized form of a workflow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    #[serde(default = "default_name")]
    pub name: String,

    pub steps: Vec<StepConfig>,
}

fn default_name() -> String {
    "workflow".to_string()
}

/// Serialized form of one step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepConfig {
    pub id: String,

    /// Defaults to the step's index in the list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,

    /// Registry name of the step's action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_seconds: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_input: Option<CodeInputConfig>,

    #[serde(default)]
    pub rules: Vec<FieldRule>,

    #[serde(default)]
    pub terminal: bool,
}

/// Resolves a parsed config against the registry and validates it.
pub fn build_definition(
    config: WorkflowConfig,
    registry: &ActionRegistry,
) -> Result<WorkflowDefinition, DefinitionError> {
    let mut definition = WorkflowDefinition::new(config.name);

    for (index, step) in config.steps.into_iter().enumerate() {
        let action = match &step.action {
            Some(name) => Some(registry.get(name).ok_or_else(|| {
                DefinitionError::UnknownAction {
                    step: step.id.clone(),
                    action: name.clone(),
                }
            })?),
            None => None,
        };

        let definition_step = StepDefinition {
            id: step.id.trim().to_string(),
            position: step.position.unwrap_or(index),
            action,
            fields: step.fields,
            expiry_seconds: step.expiry_seconds,
            code_input: step.code_input,
            rules: step.rules,
            terminal: step.terminal,
        };

        debug!("Parsed step '{}'", definition_step.id);
        definition.add_step(definition_step)?;
    }

    validate_definition(&mut definition)?;
    Ok(definition)
}

/// Parses a workflow from a YAML string.
pub fn parse_definition(
    yaml: &str,
    registry: &ActionRegistry,
) -> Result<WorkflowDefinition, DefinitionError> {
    let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
    info!(
        "Parsed workflow '{}' ({} steps)",
        config.name,
        config.steps.len()
    );
    build_definition(config, registry)
}

/// Loads a workflow from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use otpflow::flows::auth_actions;
/// use otpflow::service::MockAuthService;
/// use otpflow::workflow::load_definition;
/// use std::sync::Arc;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let registry = auth_actions(Arc::new(MockAuthService::new()));
///     let flow = load_definition("login.yaml", &registry)?;
///     println!("Loaded {} steps", flow.len());
///     Ok(())
/// }
/// ```
pub fn load_definition(
    path: impl AsRef<Path>,
    registry: &ActionRegistry,
) -> Result<WorkflowDefinition, DefinitionError> {
    let path = path.as_ref();
    info!("Loading workflow from: {}", path.display());

    let yaml = fs::read_to_string(path)?;
    debug!("YAML content loaded ({} bytes)", yaml.len());

    parse_definition(&yaml, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::step::{action_fn, StepResult};
    use crate::workflow::context::ContextUpdate;

    const LOGIN_YAML: &str = r#"
name: login
steps:
  - id: credentials
    action: login
    fields: [identifier, secret]
    rules:
      - rule: required
        field: identifier
  - id: otp
    action: verify
    expiry_seconds: 120
    code_input:
      field: code
      length: 6
  - id: authenticated
    terminal: true
"#;

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        let ok = || action_fn(|_ctx| async { StepResult::Ok(ContextUpdate::new()) });
        registry.register("login", ok());
        registry.register("verify", ok());
        registry
    }

    #[test]
    fn test_parse_login_flow() {
        let flow = parse_definition(LOGIN_YAML, &registry()).unwrap();

        assert_eq!(flow.name, "login");
        assert_eq!(flow.step_ids(), vec!["credentials", "otp", "authenticated"]);

        let otp = flow.get_step("otp").unwrap();
        assert_eq!(otp.position, 1);
        assert_eq!(otp.expiry_seconds, Some(120));
        assert_eq!(otp.code_input, Some(CodeInputConfig::new("code", 6)));
        assert!(otp.action.is_some());

        let credentials = flow.get_step("credentials").unwrap();
        assert_eq!(credentials.fields, vec!["identifier", "secret"]);
        assert_eq!(credentials.rules, vec![FieldRule::required("identifier")]);
    }

    #[test]
    fn test_unknown_action() {
        let result = parse_definition(LOGIN_YAML, &ActionRegistry::new());
        assert!(matches!(
            result,
            Err(DefinitionError::UnknownAction { step, action })
                if step == "credentials" && action == "login"
        ));
    }

    #[test]
    fn test_explicit_positions_reorder_steps() {
        let yaml = r#"
steps:
  - id: done
    position: 10
    terminal: true
  - id: start
    position: 0
    action: login
"#;
        let flow = parse_definition(yaml, &registry()).unwrap();
        assert_eq!(flow.name, "workflow");
        assert_eq!(flow.step_ids(), vec!["start", "done"]);
    }

    #[test]
    fn test_invalid_yaml() {
        let result = parse_definition("this is not valid yaml: [[[", &registry());
        assert!(matches!(result, Err(DefinitionError::Yaml(_))));
    }

    #[test]
    fn test_load_definition_file_not_found() {
        let result = load_definition("/nonexistent/path/flow.yaml", &registry());
        assert!(matches!(result, Err(DefinitionError::Io(_))));
    }

    #[test]
    fn test_load_definition_from_file() {
        use tempfile::tempdir;

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("login.yaml");
        std::fs::write(&path, LOGIN_YAML).unwrap();

        let flow = load_definition(&path, &registry()).unwrap();
        assert_eq!(flow.len(), 3);
    }
}
