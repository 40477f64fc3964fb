//! reshape core - versioned record migration
//!
//! Declare a linear history of structural edits once, then upgrade any record
//! written at any point of that history to the current shape on read.
//!
//! # Core Concepts
//!
//! - [`Mutator`]: one declared edit (add, rename, remove, nested pipeline)
//! - [`PathSet`] / [`RenameChain`]: known fields and their former names
//! - [`MigrationPipeline`]: registered mutators plus resumption logic
//! - [`SchemaEvolver`]: fluent, append-only builder
//! - [`PipelineDefinition`]: the same builder steps as a JSON/YAML/TOML document
//!
//! # Example
//!
//! ```rust
//! use reshape_core::{SchemaEvolver, SCHEMA_EVOLUTION_COUNT_TAG};
//! use reshape_schema::FieldSchema;
//! use serde_json::json;
//!
//! let evolver = SchemaEvolver::new()
//!     .add("name", FieldSchema::string(), json!(""))?
//!     .add("age", FieldSchema::number(), json!(0))?;
//!
//! let stored = evolver.prepare_for_persistence(&json!({ "name": "Jon", "age": 3 }));
//! assert_eq!(stored[SCHEMA_EVOLUTION_COUNT_TAG], json!(2));
//!
//! assert_eq!(evolver.transform(stored), json!({ "name": "Jon", "age": 3 }));
//! assert_eq!(evolver.transform(json!({})), json!({ "name": "", "age": 0 }));
//! # Ok::<(), reshape_core::EvolveError>(())
//! ```

#![warn(unreachable_pub)]

pub mod definition;
mod error;
mod evolver;
pub mod markers;
mod mutator;
mod paths;
mod pipeline;
mod renames;
mod validator;
mod versions;

pub use definition::{PipelineDefinition, StepDefinition};
pub use error::{EvolveError, EvolveResult};
pub use evolver::SchemaEvolver;
pub use markers::{SCHEMA_EVOLUTION_COUNT_TAG, VERSION_TAG};
pub use mutator::{
    AddField, AddManyFields, AddNestedArray, AddNestedObject, MutationContext, Mutator,
    MutatorKind, Record, RemoveField, RemoveManyFields, RenameField, RenameManyFields, Replay,
};
pub use paths::{NestedKind, NestedMigrator, PathEntry, PathSet};
pub use pipeline::{MigrationPipeline, ResumePoint, TransformOptions, TransformReport};
pub use renames::{RenameChain, RenamePair};
pub use validator::SafeValidator;
pub use versions::VersionLedger;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
