//! Error types for pipeline construction and replay
//!
//! Everything here is a build-time or configuration error. Transforming a
//! record never fails; invalid shapes surface through the validator as
//! [`SchemaError`].

use reshape_schema::SchemaError;

/// Errors raised while building or querying a pipeline
#[derive(Debug, thiserror::Error)]
pub enum EvolveError {
    /// Operation references a field the pipeline does not know
    #[error("Path {path} not found")]
    PathNotFound {
        /// Field name as declared in the operation
        path: String,
    },

    /// Operation would redeclare an existing field
    #[error("Path {path} already exists")]
    DuplicatePath {
        /// Field name as declared in the operation
        path: String,
    },

    /// A multi-field add declared a key without a default value
    #[error("no default value declared for {path}")]
    MissingDefault {
        /// Field name without a default
        path: String,
    },

    /// Version released out of order
    #[error("Please use a version greater than {max} (got {requested})")]
    NonMonotonicVersion {
        /// Version passed to `release_version`
        requested: u64,
        /// Highest version released so far
        max: u64,
    },

    /// Version was never released
    #[error("version {0} was never released")]
    UnknownVersion(u64),

    /// `build_validator` called without an ending schema
    #[error("cannot create a validator unless an ending schema is provided")]
    MissingEndingSchema,

    /// Declarative step references an undefined nested pipeline
    #[error("no nested pipeline named '{0}'")]
    UnknownNestedDefinition(String),

    /// Declarative pipeline document could not be read
    #[error("invalid {format} pipeline definition: {message}")]
    Definition {
        /// Document format (`json`, `yaml`, `toml`)
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// Schema collaborator failure
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl EvolveError {
    /// Create path-not-found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    /// Create duplicate-path error
    pub fn duplicate_path(path: impl Into<String>) -> Self {
        Self::DuplicatePath { path: path.into() }
    }

    /// Create definition error
    pub fn definition(format: &'static str, message: impl ToString) -> Self {
        Self::Definition {
            format,
            message: message.to_string(),
        }
    }
}

/// Result type alias for pipeline operations
pub type EvolveResult<T> = Result<T, EvolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_not_found_display() {
        let err = EvolveError::path_not_found("name");
        assert_eq!(err.to_string(), "Path name not found");
    }

    #[test]
    fn duplicate_path_display() {
        let err = EvolveError::duplicate_path("age");
        assert_eq!(err.to_string(), "Path age already exists");
    }

    #[test]
    fn non_monotonic_display() {
        let err = EvolveError::NonMonotonicVersion {
            requested: 1,
            max: 3,
        };
        assert_eq!(err.to_string(), "Please use a version greater than 3 (got 1)");
    }

    #[test]
    fn schema_error_converts() {
        let err: EvolveError = SchemaError::InvalidSchema("bad".to_string()).into();
        assert!(matches!(err, EvolveError::Schema(_)));
    }
}
