//! Local Field Rules
//!
//! Checks that run against submitted input before a step's action is
//! contacted. A failing rule becomes a [`ValidationError`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::context::WorkflowContext;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").expect("email pattern is valid")
});

/// Returns true if `email` looks like a deliverable address.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// A single check against one or two fields.
///
/// # Example YAML Format
///
/// ```yaml
/// rules:
///   - rule: required
///     field: new_secret
///   - rule: min_length
///     field: new_secret
///     min: 8
///   - rule: matches
///     field: confirm_secret
///     other: new_secret
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FieldRule {
    /// Field must be a non-blank string
    Required { field: String },
    /// Field must be an email address
    Email { field: String },
    /// Field must have at least `min` characters
    MinLength { field: String, min: usize },
    /// Field must equal `other`
    Matches { field: String, other: String },
}

impl FieldRule {
    /// The field must be present and not blank.
    pub fn required(field: impl Into<String>) -> Self {
        Self::Required {
            field: field.into(),
        }
    }

    /// The field, if present, must be an email address.
    pub fn email(field: impl Into<String>) -> Self {
        Self::Email {
            field: field.into(),
        }
    }

    /// The field, if present, must have at least `min` characters.
    pub fn min_length(field: impl Into<String>, min: usize) -> Self {
        Self::MinLength {
            field: field.into(),
            min,
        }
    }

    /// The field must equal `other`.
    pub fn matches(field: impl Into<String>, other: impl Into<String>) -> Self {
        Self::Matches {
            field: field.into(),
            other: other.into(),
        }
    }

    /// Applies the rule to a candidate context.
    ///
    /// Format rules skip absent fields; pair them with `Required` when the
    /// field is mandatory.
    pub fn check(&self, candidate: &WorkflowContext) -> Result<(), ValidationError> {
        match self {
            Self::Required { field } => candidate.require_str(field).map(|_| ()),
            Self::Email { field } => match candidate.get_str(field) {
                Some(value) if !is_valid_email(value) => {
                    Err(ValidationError::InvalidEmail(value.to_string()))
                }
                _ => Ok(()),
            },
            Self::MinLength { field, min } => match candidate.get_str(field) {
                Some(value) if value.chars().count() < *min => Err(ValidationError::TooShort {
                    field: field.clone(),
                    min: *min,
                }),
                _ => Ok(()),
            },
            Self::Matches { field, other } => {
                if candidate.get(field) == candidate.get(other) {
                    Ok(())
                } else {
                    Err(ValidationError::Mismatch {
                        field: field.clone(),
                        other: other.clone(),
                    })
                }
            }
        }
    }
}

/// Applies rules in order and returns the first failure.
pub fn check_rules(
    rules: &[FieldRule],
    candidate: &WorkflowContext,
) -> Result<(), ValidationError> {
    rules.iter().try_for_each(|rule| rule.check(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::context::context_update;

    fn candidate(pairs: &[(&str, &str)]) -> WorkflowContext {
        let mut ctx = WorkflowContext::new();
        ctx.merge(context_update(pairs.iter().copied()));
        ctx
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("ALICE.B+tag@Example.CO"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("not an email"));
    }

    #[test]
    fn test_required_rule() {
        let rule = FieldRule::required("identifier");
        assert!(rule.check(&candidate(&[("identifier", "alice")])).is_ok());
        assert_eq!(
            rule.check(&candidate(&[])),
            Err(ValidationError::MissingField("identifier".to_string()))
        );
    }

    #[test]
    fn test_email_rule_skips_absent_field() {
        let rule = FieldRule::email("email");
        assert!(rule.check(&candidate(&[])).is_ok());
        assert!(rule.check(&candidate(&[("email", "bad")])).is_err());
    }

    #[test]
    fn test_min_length_counts_characters() {
        let rule = FieldRule::min_length("new_secret", 8);
        assert!(rule.check(&candidate(&[("new_secret", "ñññññññññ")])).is_ok());
        assert_eq!(
            rule.check(&candidate(&[("new_secret", "short")])),
            Err(ValidationError::TooShort {
                field: "new_secret".to_string(),
                min: 8
            })
        );
    }

    #[test]
    fn test_matches_rule() {
        let rule = FieldRule::matches("confirm_secret", "new_secret");
        let same = candidate(&[("new_secret", "password1"), ("confirm_secret", "password1")]);
        let different = candidate(&[("new_secret", "password1"), ("confirm_secret", "password2")]);

        assert!(rule.check(&same).is_ok());
        assert!(matches!(
            rule.check(&different),
            Err(ValidationError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_check_rules_returns_first_failure() {
        let rules = vec![FieldRule::required("email"), FieldRule::email("email")];
        assert_eq!(
            check_rules(&rules, &candidate(&[])),
            Err(ValidationError::MissingField("email".to_string()))
        );
    }

    #[test]
    fn test_rule_yaml_format() {
        let yaml = "- rule: min_length\n  field: new_secret\n  min: 8\n";
        let rules: Vec<FieldRule> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rules, vec![FieldRule::min_length("new_secret", 8)]);
    }
}
