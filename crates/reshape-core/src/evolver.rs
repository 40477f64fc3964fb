//! Fluent, append-only pipeline builder
//!
//! Every append borrows the current evolver and returns a new one; the old
//! value stays valid and shares structure with the new one. Preconditions are
//! checked as each step is appended, so a pipeline that builds is consistent.
//!
//! ```
//! use reshape_core::SchemaEvolver;
//! use reshape_schema::FieldSchema;
//! use serde_json::json;
//!
//! let evolver = SchemaEvolver::new()
//!     .add("name", FieldSchema::string(), json!(""))?
//!     .rename("name", "fullName")?;
//!
//! assert_eq!(evolver.transform(json!({ "name": "Jon" })), json!({ "fullName": "Jon" }));
//! # Ok::<(), reshape_core::EvolveError>(())
//! ```

use crate::error::{EvolveError, EvolveResult};
use crate::mutator::{AddNestedArray, AddNestedObject, Mutator, Record};
use crate::pipeline::{MigrationPipeline, TransformOptions};
use crate::renames::RenamePair;
use crate::validator::SafeValidator;
use reshape_schema::{FieldSchema, ObjectSchema};
use serde_json::Value;
use std::sync::Arc;

/// Append-only builder over a [`MigrationPipeline`]
#[derive(Debug, Clone, Default)]
pub struct SchemaEvolver {
    pipeline: Arc<MigrationPipeline>,
}

impl SchemaEvolver {
    /// Evolver over records starting as `{}`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evolver whose records start as `starting` and should end as `ending`
    #[must_use]
    pub fn with_schemas(starting: ObjectSchema, ending: ObjectSchema) -> Self {
        Self::from_pipeline(MigrationPipeline::starting_from(starting).with_ending_schema(ending))
    }

    /// Attach the target shape used by [`SchemaEvolver::build_validator`]
    #[must_use]
    pub fn with_ending_schema(&self, ending: ObjectSchema) -> Self {
        Self::from_pipeline(self.pipeline.with_ending_schema(ending))
    }

    fn from_pipeline(pipeline: MigrationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Register a mutator
    ///
    /// # Errors
    /// Returns the mutator's precondition failure
    pub fn register(&self, mutator: Mutator) -> EvolveResult<Self> {
        tracing::trace!(kind = %mutator.kind(), "registering mutator");
        self.pipeline.with_mutator(mutator).map(Self::from_pipeline)
    }

    /// Add a field with a default value
    ///
    /// # Errors
    /// Returns [`EvolveError::DuplicatePath`] if `path` already exists
    pub fn add(&self, path: impl Into<String>, schema: FieldSchema, default: Value) -> EvolveResult<Self> {
        self.register(Mutator::add(path, schema, default))
    }

    /// Add every key of `schema`, taking defaults from `defaults`
    ///
    /// # Errors
    /// Returns [`EvolveError::DuplicatePath`] or [`EvolveError::MissingDefault`]
    pub fn add_many(&self, schema: ObjectSchema, defaults: Record) -> EvolveResult<Self> {
        self.register(Mutator::add_many(schema, defaults))
    }

    /// Add an embedded record with its own pipeline
    ///
    /// # Errors
    /// Returns [`EvolveError::DuplicatePath`] if the field already exists
    pub fn add_nested(&self, nested: AddNestedObject) -> EvolveResult<Self> {
        self.register(nested.into())
    }

    /// Add an array of embedded records with their own pipeline
    ///
    /// # Errors
    /// Returns [`EvolveError::DuplicatePath`] if the field already exists
    pub fn add_nested_array(&self, nested: AddNestedArray) -> EvolveResult<Self> {
        self.register(nested.into())
    }

    /// Rename a field
    ///
    /// # Errors
    /// Returns [`EvolveError::PathNotFound`] or [`EvolveError::DuplicatePath`]
    pub fn rename(&self, source: impl Into<String>, destination: impl Into<String>) -> EvolveResult<Self> {
        self.register(Mutator::rename(source, destination))
    }

    /// Rename several fields at once
    ///
    /// # Errors
    /// Returns [`EvolveError::PathNotFound`] or [`EvolveError::DuplicatePath`]
    pub fn rename_many<I, P>(&self, renames: I) -> EvolveResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<RenamePair>,
    {
        self.register(Mutator::rename_many(renames))
    }

    /// Remove a field
    ///
    /// # Errors
    /// Returns [`EvolveError::PathNotFound`] if `path` is unknown
    pub fn remove(&self, path: impl Into<String>) -> EvolveResult<Self> {
        self.register(Mutator::remove(path))
    }

    /// Remove several fields
    ///
    /// # Errors
    /// Returns [`EvolveError::PathNotFound`] if any path is unknown
    pub fn remove_many<I, S>(&self, paths: I) -> EvolveResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register(Mutator::remove_many(paths))
    }

    /// Record `version` at the current evolution count
    ///
    /// # Errors
    /// Returns [`EvolveError::NonMonotonicVersion`] if `version` does not increase
    pub fn release_version(&self, version: u64) -> EvolveResult<Self> {
        self.pipeline.with_release(version).map(Self::from_pipeline)
    }

    /// Checkpoint; registers nothing
    #[must_use]
    pub fn consolidate(&self) -> Self {
        self.clone()
    }

    /// Migrate a record to the current shape, stripping markers
    #[must_use]
    pub fn transform(&self, input: Value) -> Value {
        self.pipeline.transform(input)
    }

    /// Migrate a record to the current shape
    #[must_use]
    pub fn transform_with(&self, input: Value, options: TransformOptions) -> Value {
        self.pipeline.transform_with(input, options)
    }

    /// Stamp a record for storage
    #[must_use]
    pub fn prepare_for_persistence(&self, record: &Value) -> Value {
        self.pipeline.prepare_for_persistence(record)
    }

    /// Validator that migrates then checks against the ending schema
    ///
    /// # Errors
    /// - [`EvolveError::MissingEndingSchema`] if no ending schema was declared
    /// - [`EvolveError::Schema`] if the ending schema does not compile
    pub fn build_validator(&self) -> EvolveResult<SafeValidator> {
        let ending = self
            .pipeline
            .ending_schema()
            .ok_or(EvolveError::MissingEndingSchema)?;
        SafeValidator::new(Arc::clone(&self.pipeline), ending)
    }

    /// The built pipeline
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &Arc<MigrationPipeline> {
        &self.pipeline
    }

    /// Number of registered mutators
    #[inline]
    #[must_use]
    pub fn evolution_count(&self) -> usize {
        self.pipeline.evolution_count()
    }
}

impl From<SchemaEvolver> for Arc<MigrationPipeline> {
    fn from(evolver: SchemaEvolver) -> Self {
        evolver.pipeline
    }
}

impl From<&SchemaEvolver> for Arc<MigrationPipeline> {
    fn from(evolver: &SchemaEvolver) -> Self {
        Arc::clone(&evolver.pipeline)
    }
}

impl From<MigrationPipeline> for SchemaEvolver {
    fn from(pipeline: MigrationPipeline) -> Self {
        Self::from_pipeline(pipeline)
    }
}
