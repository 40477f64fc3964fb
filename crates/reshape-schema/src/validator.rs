//! Passthrough validation of migrated records
//!
//! Compiles an [`ObjectSchema`] with `jsonschema` after forcing the root into
//! passthrough mode, so keys the target shape does not mention never fail a
//! record that is otherwise valid.

use crate::error::{SchemaError, Violation};
use crate::schema::ObjectSchema;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::fmt;

/// Compiled validator for a target object shape
pub struct PassthroughValidator {
    compiled: JSONSchema,
    document: Value,
}

impl PassthroughValidator {
    /// Compile a validator for `schema`
    ///
    /// # Errors
    /// Returns [`SchemaError::InvalidSchema`] if a field fragment is not valid JSON Schema
    pub fn compile(schema: &ObjectSchema) -> Result<Self, SchemaError> {
        let document = schema.passthrough().to_json_schema();
        let compiled = JSONSchema::compile(&document)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Ok(Self { compiled, document })
    }

    /// Validate a record
    ///
    /// # Errors
    /// Returns [`SchemaError::ValidationFailed`] listing every violation
    pub fn validate(&self, record: &Value) -> Result<(), SchemaError> {
        self.compiled.validate(record).map_err(|errors| {
            let violations = errors
                .map(|e| Violation {
                    path: e.instance_path.to_string(),
                    message: e.to_string(),
                })
                .collect();
            SchemaError::ValidationFailed { violations }
        })
    }

    /// Check a record without collecting violations
    #[inline]
    #[must_use]
    pub fn is_valid(&self, record: &Value) -> bool {
        self.compiled.is_valid(record)
    }

    /// The compiled JSON-Schema document
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }
}

impl fmt::Debug for PassthroughValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassthroughValidator")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}
