//! Subcommand bodies
//!
//! Each command works on decoded records and returns the encoded output, so
//! the binary only deals with argument parsing and stdio.

use anyhow::{Context, Result};
use reshape_codec::{decode_with_shape, CodecRegistry, DocumentShape, RecordCodec};
use reshape_core::{
    NestedKind, PipelineDefinition, SchemaEvolver, TransformOptions,
};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Flags for `reshape migrate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrateOptions {
    /// Remove marker keys from the output
    pub strip_markers: bool,
    /// Validate every record against the ending schema
    pub validate: bool,
}

/// Build the evolver described by a pipeline definition file
///
/// # Errors
/// Fails if the file cannot be loaded or the steps do not build
pub fn load_evolver(path: &Path) -> Result<SchemaEvolver> {
    let definition = PipelineDefinition::from_path(path)
        .with_context(|| format!("loading pipeline {}", path.display()))?;
    let evolver = definition
        .build()
        .with_context(|| format!("building pipeline {}", path.display()))?;
    info!(
        path = %path.display(),
        evolution_count = evolver.evolution_count(),
        "pipeline loaded"
    );
    Ok(evolver)
}

/// Pick the codec for `input`, falling back to `default_format` for stdin
///
/// # Errors
/// Fails if no codec is registered for the extension or format
pub fn select_codec<'r>(
    registry: &'r CodecRegistry,
    input: Option<&Path>,
    default_format: &str,
) -> Result<&'r dyn RecordCodec> {
    let codec = match input {
        Some(path) => registry.require_for_path(path)?,
        None => registry.require_format(default_format)?,
    };
    Ok(codec)
}

/// Read records from `input`, or from stdin when no file is given
///
/// # Errors
/// Fails on IO or decode errors
pub fn read_records(
    input: Option<&Path>,
    codec: &dyn RecordCodec,
) -> Result<(Vec<Value>, DocumentShape)> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            text
        }
    };
    Ok(decode_with_shape(&text, codec)?)
}

/// Migrate every record
///
/// # Errors
/// With `validate`, fails on the first record that does not match the ending
/// schema
pub fn migrate_records(
    evolver: &SchemaEvolver,
    records: Vec<Value>,
    options: MigrateOptions,
) -> Result<Vec<Value>> {
    let transform = TransformOptions {
        strip_markers: options.strip_markers,
    };

    if options.validate {
        let validator = evolver.build_validator()?.with_options(transform);
        return records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                validator
                    .parse(record)
                    .with_context(|| format!("record {index} failed validation"))
            })
            .collect();
    }

    Ok(records
        .into_iter()
        .map(|record| evolver.transform_with(record, transform))
        .collect())
}

/// Stamp every record for storage
#[must_use]
pub fn stamp_records(evolver: &SchemaEvolver, records: &[Value]) -> Vec<Value> {
    records
        .iter()
        .map(|record| evolver.prepare_for_persistence(record))
        .collect()
}

/// Encode records in the shape their input document had
///
/// # Errors
/// Fails if the codec cannot encode the output
pub fn encode_records(
    records: Vec<Value>,
    shape: DocumentShape,
    codec: &dyn RecordCodec,
) -> Result<String> {
    Ok(codec.encode(&shape.assemble(records))?)
}

/// Known field as reported by `reshape inspect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathSummary {
    /// Field name
    pub name: String,
    /// `object` or `array` for nested fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<&'static str>,
}

/// Output of `reshape inspect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    /// Registered mutators
    pub evolution_count: usize,
    /// Mutator kinds in order
    pub mutators: Vec<String>,
    /// Known fields after the last mutator
    pub paths: Vec<PathSummary>,
    /// Rename history as `[old, new]`
    pub renames: Vec<(String, String)>,
    /// Released versions as `[version, evolution_count]`
    pub versions: Vec<(u64, usize)>,
}

/// Summarize a pipeline
#[must_use]
pub fn inspect(evolver: &SchemaEvolver) -> InspectReport {
    let pipeline = evolver.pipeline();
    InspectReport {
        evolution_count: pipeline.evolution_count(),
        mutators: pipeline.mutators().map(|m| m.kind().to_string()).collect(),
        paths: pipeline
            .paths()
            .iter()
            .map(|entry| PathSummary {
                name: entry.name().to_string(),
                nested: entry.nested_migrator().map(|nested| match nested.kind() {
                    NestedKind::Object => "object",
                    NestedKind::Array => "array",
                }),
            })
            .collect(),
        renames: pipeline
            .renames()
            .pairs()
            .map(|pair| (pair.old().to_string(), pair.new_name().to_string()))
            .collect(),
        versions: pipeline.versions().iter().collect(),
    }
}
