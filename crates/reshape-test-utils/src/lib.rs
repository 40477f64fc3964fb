//! Testing utilities for reshape workspace
//!
//! Shared fixtures, prefix replay helpers and the all-versions audit.

#![allow(missing_docs)]

use pretty_assertions::assert_eq;
use reshape_core::{MigrationPipeline, Record, SchemaEvolver};
use reshape_schema::{FieldSchema, ObjectSchema};
use serde_json::{json, Value};
use std::fmt;

pub fn base_person_schema() -> ObjectSchema {
    ObjectSchema::new()
        .field("name", FieldSchema::string())
        .field("age", FieldSchema::number())
}

/// `{}` -> add `name: ""` -> add `age: 0`, ending at the person schema
pub fn create_test_evolver() -> SchemaEvolver {
    SchemaEvolver::new()
        .with_ending_schema(base_person_schema())
        .add("name", FieldSchema::string(), json!(""))
        .unwrap()
        .add("age", FieldSchema::number(), json!(0))
        .unwrap()
}

/// Two-step address pipeline used as a nested migrator
pub fn create_address_evolver() -> SchemaEvolver {
    SchemaEvolver::new()
        .add("street", FieldSchema::string(), json!(""))
        .unwrap()
        .add("city", FieldSchema::string(), json!(""))
        .unwrap()
}

pub fn as_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object record, got {other}"),
    }
}

/// Record produced by the first `len` mutators applied to `start`
pub fn replay_prefix(pipeline: &MigrationPipeline, len: usize, start: &Value) -> Value {
    pipeline.prefix(len).unwrap().transform(start.clone())
}

/// Same as [`replay_prefix`], stamped by the prefix pipeline
pub fn stamped_prefix(pipeline: &MigrationPipeline, len: usize, start: &Value) -> Value {
    let prefix = pipeline.prefix(len).unwrap();
    prefix.prepare_for_persistence(&prefix.transform(start.clone()))
}

/// How an intermediate record was resumed during the audit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resumption {
    Marker,
    Inferred,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuditFailure {
    /// Replaying an intermediate record did not reach the from-scratch result
    Diverged {
        prefix: usize,
        resumption: Resumption,
        expected: Value,
        actual: Value,
    },
    /// The migrated record does not match the ending schema
    Invalid { prefix: usize, message: String },
}

impl fmt::Display for AuditFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diverged {
                prefix,
                resumption,
                expected,
                actual,
            } => write!(
                f,
                "prefix {prefix} ({resumption:?}): expected {expected}, got {actual}"
            ),
            Self::Invalid { prefix, message } => write!(f, "prefix {prefix}: {message}"),
        }
    }
}

/// Replay every prefix of `evolver` from `start` and check each intermediate
/// record migrates to the same result as `start` itself
///
/// Intermediate records are resumed both through a stamped marker and by
/// inference. When the evolver has an ending schema every result is also
/// validated against it.
pub fn replay_all_versions(evolver: &SchemaEvolver, start: &Value) -> Vec<AuditFailure> {
    let pipeline = evolver.pipeline();
    let expected = pipeline.transform(start.clone());
    let validator = evolver.build_validator().ok();
    let mut failures = Vec::new();

    for prefix in 0..=pipeline.evolution_count() {
        let attempts = [
            (Resumption::Marker, stamped_prefix(pipeline, prefix, start)),
            (Resumption::Inferred, replay_prefix(pipeline, prefix, start)),
        ];
        for (resumption, intermediate) in attempts {
            let actual = pipeline.transform(intermediate.clone());
            if actual != expected {
                failures.push(AuditFailure::Diverged {
                    prefix,
                    resumption,
                    expected: expected.clone(),
                    actual,
                });
            }
            if let Some(validator) = &validator {
                if let Err(e) = validator.parse(intermediate) {
                    failures.push(AuditFailure::Invalid {
                        prefix,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
    failures
}

/// Panic with every audit failure
pub fn assert_replays_cleanly(evolver: &SchemaEvolver, start: &Value) {
    let failures = replay_all_versions(evolver, start);
    assert!(
        failures.is_empty(),
        "replay audit failed:\n{}",
        failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Check `input -> output` pairs against `evolver`
pub fn assert_cases(evolver: &SchemaEvolver, cases: &[(Value, Value)]) {
    for (input, output) in cases {
        assert_eq!(&evolver.transform(input.clone()), output, "input: {input}");
    }
}
