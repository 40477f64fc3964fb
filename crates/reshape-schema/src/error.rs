//! Error types for schema compilation and validation

use std::fmt::{self, Display, Formatter};

/// A single validation failure reported by the validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer to the offending value (`""` for the root)
    pub path: String,
    /// Human-readable message
    pub message: String,
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Errors raised by the schema collaborator
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Schema document could not be compiled
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Schema document is not an object schema
    #[error("expected an object schema, got {0}")]
    NotAnObject(String),

    /// Record does not match the target shape
    #[error("validation failed: {}", format_violations(.violations))]
    ValidationFailed {
        /// Every reported violation, in validator order
        violations: Vec<Violation>,
    },
}

impl SchemaError {
    /// Violations carried by a validation failure (empty for other kinds)
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::ValidationFailed { violations } => violations,
            _ => &[],
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_display_root() {
        let v = Violation {
            path: String::new(),
            message: "\"name\" is a required property".to_string(),
        };
        assert_eq!(v.to_string(), "\"name\" is a required property");
    }

    #[test]
    fn validation_failed_display_joins_violations() {
        let err = SchemaError::ValidationFailed {
            violations: vec![
                Violation {
                    path: "/age".to_string(),
                    message: "not a number".to_string(),
                },
                Violation {
                    path: "/name".to_string(),
                    message: "not a string".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "validation failed: /age: not a number; /name: not a string"
        );
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn other_errors_have_no_violations() {
        let err = SchemaError::InvalidSchema("bad".to_string());
        assert!(err.violations().is_empty());
    }
}
