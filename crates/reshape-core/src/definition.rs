//! Declarative pipeline definitions
//!
//! A [`PipelineDefinition`] describes an evolver as data so pipelines can live
//! in JSON, YAML or TOML files next to the records they migrate:
//!
//! ```yaml
//! ending_schema:
//!   type: object
//!   properties:
//!     name: { type: string }
//! nested:
//!   address:
//!     steps:
//!       - { op: add, path: city, default: "" }
//! steps:
//!   - { op: add, path: name, schema: { type: string }, default: "" }
//!   - { op: add_nested, path: home, pipeline: address }
//!   - { op: release_version, version: 1 }
//! ```
//!
//! Nested steps name a pipeline from the `nested` table of the definition
//! they appear in, or of any enclosing definition.

use crate::error::{EvolveError, EvolveResult};
use crate::evolver::SchemaEvolver;
use crate::mutator::{AddNestedArray, AddNestedObject, Record};
use crate::pipeline::MigrationPipeline;
use indexmap::IndexMap;
use reshape_schema::{FieldSchema, ObjectSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

type Scope<'a> = &'a IndexMap<String, PipelineDefinition>;

/// Serializable description of a [`SchemaEvolver`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineDefinition {
    /// JSON-Schema object the first records were written in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_schema: Option<Value>,

    /// JSON-Schema object records should end up matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_schema: Option<Value>,

    /// Named pipelines for nested steps
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub nested: IndexMap<String, PipelineDefinition>,

    /// Ordered build steps
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

/// One build step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StepDefinition {
    /// See [`SchemaEvolver::add`]
    Add {
        /// Field name
        path: String,
        /// Field shape
        #[serde(default)]
        schema: FieldSchema,
        /// Value inserted when absent
        default: Value,
    },
    /// See [`SchemaEvolver::add_many`]
    AddMany {
        /// JSON-Schema object listing the new fields
        schema: Value,
        /// One default per new field
        defaults: Record,
    },
    /// See [`SchemaEvolver::add_nested`]
    AddNested {
        /// Field name
        path: String,
        /// Key into `nested`
        pipeline: String,
        /// Field shape
        #[serde(default)]
        schema: FieldSchema,
        /// Default in the nested pipeline's starting shape
        #[serde(default = "empty_object")]
        default: Value,
        /// Keep stored nulls
        #[serde(default)]
        nullable: bool,
        /// Keep the field absent
        #[serde(default)]
        optional: bool,
    },
    /// See [`SchemaEvolver::add_nested_array`]
    AddNestedArray {
        /// Field name
        path: String,
        /// Key into `nested`
        pipeline: String,
        /// Item shape
        #[serde(default)]
        schema: FieldSchema,
        /// Items inserted when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Vec<Value>>,
    },
    /// See [`SchemaEvolver::rename`]
    Rename {
        /// Current name
        from: String,
        /// New name
        to: String,
    },
    /// See [`SchemaEvolver::rename_many`]
    RenameMany {
        /// Current name to new name
        renames: IndexMap<String, String>,
    },
    /// See [`SchemaEvolver::remove`]
    Remove {
        /// Field name
        path: String,
    },
    /// See [`SchemaEvolver::remove_many`]
    RemoveMany {
        /// Field names
        paths: Vec<String>,
    },
    /// See [`SchemaEvolver::release_version`]
    ReleaseVersion {
        /// Version number
        version: u64,
    },
    /// See [`SchemaEvolver::consolidate`]
    Consolidate,
}

fn empty_object() -> Value {
    Value::Object(Record::new())
}

impl PipelineDefinition {
    /// Parse a JSON document
    ///
    /// # Errors
    /// Returns [`EvolveError::Definition`] on malformed input
    pub fn from_json_str(text: &str) -> EvolveResult<Self> {
        serde_json::from_str(text).map_err(|e| EvolveError::definition("json", e))
    }

    /// Parse a YAML document
    ///
    /// # Errors
    /// Returns [`EvolveError::Definition`] on malformed input
    pub fn from_yaml_str(text: &str) -> EvolveResult<Self> {
        serde_yaml::from_str(text).map_err(|e| EvolveError::definition("yaml", e))
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns [`EvolveError::Definition`] on malformed input
    pub fn from_toml_str(text: &str) -> EvolveResult<Self> {
        toml::from_str(text).map_err(|e| EvolveError::definition("toml", e))
    }

    /// Load a definition, choosing the format from the file extension
    ///
    /// # Errors
    /// Returns [`EvolveError::Definition`] if the file cannot be read, has an
    /// unsupported extension or is malformed
    pub fn from_path(path: impl AsRef<Path>) -> EvolveResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let format = match extension.as_str() {
            "json" => "json",
            "yaml" | "yml" => "yaml",
            "toml" => "toml",
            _ => {
                return Err(EvolveError::definition(
                    "unknown",
                    format!("unsupported extension for {}", path.display()),
                ))
            }
        };

        let text = std::fs::read_to_string(path)
            .map_err(|e| EvolveError::definition(format, format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), format, "loading pipeline definition");

        match format {
            "json" => Self::from_json_str(&text),
            "yaml" => Self::from_yaml_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    /// Replay the steps through a fresh evolver
    ///
    /// # Errors
    /// Returns the first build-time error, [`EvolveError::UnknownNestedDefinition`]
    /// for unresolved nested names, or [`EvolveError::Definition`] for a nested
    /// pipeline that includes itself
    pub fn build(&self) -> EvolveResult<SchemaEvolver> {
        self.build_in(&[], &mut Vec::new())
    }

    fn build_in(&self, outer: &[Scope<'_>], building: &mut Vec<String>) -> EvolveResult<SchemaEvolver> {
        let mut scopes = outer.to_vec();
        scopes.push(&self.nested);

        let mut evolver = match &self.starting_schema {
            Some(starting) => SchemaEvolver::from(MigrationPipeline::starting_from(
                ObjectSchema::from_json_schema(starting)?,
            )),
            None => SchemaEvolver::new(),
        };
        if let Some(ending) = &self.ending_schema {
            evolver = evolver.with_ending_schema(ObjectSchema::from_json_schema(ending)?);
        }

        for step in &self.steps {
            evolver = step.apply(&evolver, &scopes, building)?;
        }
        Ok(evolver)
    }
}

impl StepDefinition {
    fn apply(
        &self,
        evolver: &SchemaEvolver,
        scopes: &[Scope<'_>],
        building: &mut Vec<String>,
    ) -> EvolveResult<SchemaEvolver> {
        match self {
            Self::Add {
                path,
                schema,
                default,
            } => evolver.add(path, schema.clone(), default.clone()),
            Self::AddMany { schema, defaults } => {
                evolver.add_many(ObjectSchema::from_json_schema(schema)?, defaults.clone())
            }
            Self::AddNested {
                path,
                pipeline,
                schema,
                default,
                nullable,
                optional,
            } => {
                let nested = resolve(pipeline, scopes, building)?;
                let mut step = AddNestedObject::new(path, schema.clone(), default.clone(), nested);
                if *nullable {
                    step = step.nullable();
                }
                if *optional {
                    step = step.optional();
                }
                evolver.add_nested(step)
            }
            Self::AddNestedArray {
                path,
                pipeline,
                schema,
                default,
            } => {
                let nested = resolve(pipeline, scopes, building)?;
                let mut step = AddNestedArray::new(path, schema.clone(), nested);
                if let Some(items) = default {
                    step = step.with_default(items.clone());
                }
                evolver.add_nested_array(step)
            }
            Self::Rename { from, to } => evolver.rename(from, to),
            Self::RenameMany { renames } => {
                evolver.rename_many(renames.iter().map(|(old, new)| (old.as_str(), new.as_str())))
            }
            Self::Remove { path } => evolver.remove(path),
            Self::RemoveMany { paths } => evolver.remove_many(paths),
            Self::ReleaseVersion { version } => evolver.release_version(*version),
            Self::Consolidate => Ok(evolver.consolidate()),
        }
    }
}

/// Build the innermost nested definition called `name`
fn resolve(name: &str, scopes: &[Scope<'_>], building: &mut Vec<String>) -> EvolveResult<SchemaEvolver> {
    let depth = scopes
        .iter()
        .rposition(|scope| scope.contains_key(name))
        .ok_or_else(|| EvolveError::UnknownNestedDefinition(name.to_string()))?;
    if building.iter().any(|n| n == name) {
        return Err(EvolveError::definition(
            "nested",
            format!("pipeline '{name}' includes itself"),
        ));
    }
    let Some(definition) = scopes[depth].get(name) else {
        return Err(EvolveError::UnknownNestedDefinition(name.to_string()));
    };

    building.push(name.to_string());
    let built = definition.build_in(&scopes[..=depth], building);
    building.pop();
    built
}
