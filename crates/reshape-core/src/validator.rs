//! Migrate-then-validate
//!
//! [`SafeValidator`] accepts a record in any historical shape, migrates it,
//! and checks the result against the ending schema in passthrough mode.
//! Validation failures come back as the schema crate's own error.

use crate::error::EvolveResult;
use crate::pipeline::{MigrationPipeline, TransformOptions};
use reshape_schema::{ObjectSchema, PassthroughValidator, SchemaError};
use serde_json::Value;
use std::sync::Arc;

/// Migrating validator for a pipeline's ending schema
#[derive(Debug, Clone)]
pub struct SafeValidator {
    pipeline: Arc<MigrationPipeline>,
    validator: Arc<PassthroughValidator>,
    options: TransformOptions,
}

impl SafeValidator {
    /// Compile a validator for `ending`
    ///
    /// # Errors
    /// Returns the schema error if `ending` does not compile
    pub fn new(pipeline: Arc<MigrationPipeline>, ending: &ObjectSchema) -> EvolveResult<Self> {
        let validator = PassthroughValidator::compile(ending)?;
        Ok(Self {
            pipeline,
            validator: Arc::new(validator),
            options: TransformOptions::default(),
        })
    }

    /// Same validator using `options` for the migration step
    #[must_use]
    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    /// Migrate and validate
    ///
    /// # Errors
    /// Returns [`SchemaError::NotAnObject`] for non-object input and
    /// [`SchemaError::ValidationFailed`] when the migrated record does not match
    pub fn parse(&self, input: Value) -> Result<Value, SchemaError> {
        if !input.is_object() {
            return Err(SchemaError::NotAnObject(type_name(&input).to_string()));
        }
        let output = self.pipeline.transform_with(input, self.options);
        self.validator.validate(&output)?;
        Ok(output)
    }

    /// Check whether `input` migrates to a valid record
    #[must_use]
    pub fn is_valid(&self, input: Value) -> bool {
        self.parse(input).is_ok()
    }

    /// The pipeline records are migrated through
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &Arc<MigrationPipeline> {
        &self.pipeline
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
