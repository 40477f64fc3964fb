//! Ordered mutator pipeline and resumption
//!
//! [`MigrationPipeline`] owns the registered mutators together with the path
//! and rename snapshots after the last one. Replaying a record:
//!
//! 1. A record carrying an evolution-count marker resumes at that count.
//! 2. Otherwise mutators are scanned in order and replay resumes at the first
//!    one whose effect is not visible yet. If none is found the record is
//!    returned unchanged.
//! 3. Mutators from the resume point onwards run in full. Earlier mutators that
//!    own a nested pipeline still run in refresh mode, because embedded records
//!    evolve on their own timeline.

use crate::error::{EvolveError, EvolveResult};
use crate::markers::{self, SCHEMA_EVOLUTION_COUNT_TAG, VERSION_TAG};
use crate::mutator::{MutationContext, Mutator, Record, Replay};
use crate::paths::PathSet;
use crate::renames::RenameChain;
use crate::versions::VersionLedger;
use im::Vector;
use reshape_schema::ObjectSchema;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Options for [`MigrationPipeline::transform_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOptions {
    /// Remove marker keys from the output (default: true)
    pub strip_markers: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            strip_markers: true,
        }
    }
}

impl TransformOptions {
    /// Keep marker keys in the output
    #[inline]
    #[must_use]
    pub fn keep_markers() -> Self {
        Self {
            strip_markers: false,
        }
    }
}

/// Where replay started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    /// Taken from the record's evolution-count marker
    Marker(usize),
    /// First mutator whose effect was missing
    Inferred(usize),
    /// Nothing to do
    Complete,
}

/// Result of [`MigrationPipeline::transform_with_report`]
#[derive(Debug, Clone, PartialEq)]
pub struct TransformReport {
    /// Migrated record
    pub output: Value,
    /// Where replay started
    pub resume: ResumePoint,
    /// Number of mutators applied in full
    pub applied: usize,
}

/// Registered mutators plus the state they leave behind
#[derive(Debug, Clone, Default)]
pub struct MigrationPipeline {
    mutators: Vector<Arc<Mutator>>,
    paths: PathSet,
    renames: RenameChain,
    versions: VersionLedger,
    starting_schema: Option<ObjectSchema>,
    ending_schema: Option<ObjectSchema>,
}

impl MigrationPipeline {
    /// Empty pipeline over records starting as `{}`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty pipeline whose known fields come from `starting`
    #[must_use]
    pub fn starting_from(starting: ObjectSchema) -> Self {
        Self {
            paths: PathSet::from_schema(&starting),
            starting_schema: Some(starting),
            ..Self::default()
        }
    }

    /// Pipeline with `mutator` registered
    ///
    /// # Errors
    /// Returns the mutator's precondition failure
    pub fn with_mutator(&self, mutator: Mutator) -> EvolveResult<Self> {
        mutator.before_mutate(&self.paths)?;
        let paths = mutator.rewrite_paths(&self.paths);
        let renames = mutator.rewrite_renames(&self.renames, self.evolution_count());
        let mut mutators = self.mutators.clone();
        mutators.push_back(Arc::new(mutator));
        Ok(Self {
            mutators,
            paths,
            renames,
            ..self.clone()
        })
    }

    /// Pipeline with `version` released at the current evolution count
    ///
    /// # Errors
    /// Returns [`EvolveError::NonMonotonicVersion`] if `version` does not increase
    pub fn with_release(&self, version: u64) -> EvolveResult<Self> {
        let versions = self.versions.release(version, self.evolution_count())?;
        Ok(Self {
            versions,
            ..self.clone()
        })
    }

    /// Pipeline with `ending` as the target shape
    #[must_use]
    pub fn with_ending_schema(&self, ending: ObjectSchema) -> Self {
        Self {
            ending_schema: Some(ending),
            ..self.clone()
        }
    }

    /// Number of registered mutators
    #[inline]
    #[must_use]
    pub fn evolution_count(&self) -> usize {
        self.mutators.len()
    }

    /// Registered mutators in order
    pub fn mutators(&self) -> impl Iterator<Item = &Mutator> {
        self.mutators.iter().map(|mutator| &**mutator)
    }

    /// Known fields after the last mutator
    #[inline]
    #[must_use]
    pub fn paths(&self) -> &PathSet {
        &self.paths
    }

    /// Rename history after the last mutator
    #[inline]
    #[must_use]
    pub fn renames(&self) -> &RenameChain {
        &self.renames
    }

    /// Released versions
    #[inline]
    #[must_use]
    pub fn versions(&self) -> &VersionLedger {
        &self.versions
    }

    /// Starting shape, if one was declared
    #[inline]
    #[must_use]
    pub fn starting_schema(&self) -> Option<&ObjectSchema> {
        self.starting_schema.as_ref()
    }

    /// Target shape, if one was declared
    #[inline]
    #[must_use]
    pub fn ending_schema(&self) -> Option<&ObjectSchema> {
        self.ending_schema.as_ref()
    }

    /// Pipeline holding only the first `len` mutators
    ///
    /// Versions released after that point are dropped.
    ///
    /// # Errors
    /// Propagates precondition failures while re-registering, which only
    /// happens if the pipeline was assembled inconsistently
    pub fn prefix(&self, len: usize) -> EvolveResult<Self> {
        let base = match &self.starting_schema {
            Some(starting) => Self::starting_from(starting.clone()),
            None => Self::new(),
        };
        let base = Self {
            ending_schema: self.ending_schema.clone(),
            ..base
        };

        let mut releases = self.versions.iter().peekable();
        let mut prefix = base;
        for (index, mutator) in self.mutators.iter().take(len).enumerate() {
            while let Some((version, _)) = releases.next_if(|(_, count)| *count == index) {
                prefix = prefix.with_release(version)?;
            }
            prefix = prefix.with_mutator(Mutator::clone(mutator))?;
        }
        while let Some((version, _)) = releases.next_if(|(_, count)| *count <= len) {
            prefix = prefix.with_release(version)?;
        }
        Ok(prefix)
    }

    /// Migrate a record to the current shape, stripping markers
    #[must_use]
    pub fn transform(&self, input: Value) -> Value {
        self.transform_with(input, TransformOptions::default())
    }

    /// Migrate a record to the current shape
    #[must_use]
    pub fn transform_with(&self, input: Value, options: TransformOptions) -> Value {
        self.transform_with_report(input, options).output
    }

    /// Migrate a record and report where replay started
    #[must_use]
    pub fn transform_with_report(&self, input: Value, options: TransformOptions) -> TransformReport {
        let Value::Object(mut record) = input else {
            warn!("input is not an object; returning it unchanged");
            return TransformReport {
                output: input,
                resume: ResumePoint::Complete,
                applied: 0,
            };
        };

        let marker = markers::read_evolution_count(&record);
        if options.strip_markers {
            markers::strip_markers(&mut record);
        }

        let resume = self.resume_point(marker, &record);
        let start = match resume {
            ResumePoint::Marker(count) => count.min(self.evolution_count()),
            ResumePoint::Inferred(index) => index,
            ResumePoint::Complete => {
                debug!(
                    evolution_count = self.evolution_count(),
                    "record already reflects every mutator"
                );
                return TransformReport {
                    output: Value::Object(record),
                    resume,
                    applied: 0,
                };
            }
        };
        debug!(?resume, start, evolution_count = self.evolution_count(), "resuming replay");

        let record = self.replay(record, start);

        TransformReport {
            output: Value::Object(record),
            resume,
            applied: self.evolution_count() - start,
        }
    }

    /// Migrate a record as if it had been written at evolution count `start`
    ///
    /// Markers on the record are ignored and stripped.
    #[must_use]
    pub fn transform_from(&self, input: Value, start: usize) -> Value {
        let Value::Object(mut record) = input else {
            warn!("input is not an object; returning it unchanged");
            return input;
        };
        markers::strip_markers(&mut record);
        let start = start.min(self.evolution_count());
        Value::Object(self.replay(record, start))
    }

    /// Migrate a record written by released version `version`
    ///
    /// # Errors
    /// Returns [`EvolveError::UnknownVersion`] if `version` was never released
    pub fn transform_from_version(&self, input: Value, version: u64) -> EvolveResult<Value> {
        let start = self
            .versions
            .evolution_count_for(version)
            .ok_or(EvolveError::UnknownVersion(version))?;
        Ok(self.transform_from(input, start))
    }

    /// Check whether replaying `record` would change it
    #[must_use]
    pub fn needs_migration(&self, record: &Record) -> bool {
        match markers::read_evolution_count(record) {
            Some(count) if count < self.evolution_count() => true,
            Some(_) => {
                let ctx = self.context();
                self.mutators
                    .iter()
                    .enumerate()
                    .any(|(index, m)| m.nested_stale(record, &ctx.at(index)))
            }
            None => self.first_invalid(record).is_some(),
        }
    }

    /// Index of the first mutator whose effect `record` does not show
    #[must_use]
    pub fn first_invalid(&self, record: &Record) -> Option<usize> {
        let ctx = self.context();
        self.mutators
            .iter()
            .enumerate()
            .position(|(index, mutator)| !mutator.is_valid(record, &ctx.at(index)))
    }

    /// Deep copy of `record` stamped with this pipeline's position
    ///
    /// Embedded records owned by nested mutators are stamped by their own
    /// pipelines. Non-object input is copied unchanged.
    #[must_use]
    pub fn prepare_for_persistence(&self, record: &Value) -> Value {
        let Value::Object(source) = record else {
            return record.clone();
        };
        let mut stamped = source.clone();
        stamped.insert(
            SCHEMA_EVOLUTION_COUNT_TAG.to_string(),
            Value::from(self.evolution_count()),
        );
        match self.versions.version_at(self.evolution_count()) {
            Some(version) => {
                stamped.insert(VERSION_TAG.to_string(), Value::from(version));
            }
            None => {
                stamped.shift_remove(VERSION_TAG);
            }
        }

        let ctx = self.context();
        for (index, mutator) in self.mutators.iter().enumerate() {
            if mutator.nested().is_some() {
                mutator.stamp_nested(&mut stamped, &ctx.at(index));
            }
        }
        Value::Object(stamped)
    }

    fn context(&self) -> MutationContext<'_> {
        MutationContext::new(&self.paths, &self.renames)
    }

    fn resume_point(&self, marker: Option<usize>, record: &Record) -> ResumePoint {
        if let Some(count) = marker {
            return ResumePoint::Marker(count);
        }
        match self.first_invalid(record) {
            Some(index) => ResumePoint::Inferred(index),
            None => ResumePoint::Complete,
        }
    }

    fn replay(&self, mut record: Record, start: usize) -> Record {
        let ctx = self.context();
        for (index, mutator) in self.mutators.iter().enumerate() {
            let replay = if index >= start {
                Replay::Fresh
            } else if mutator.nested().is_some() {
                Replay::Refresh
            } else {
                continue;
            };
            trace!(index, kind = %mutator.kind(), ?replay, "applying mutator");
            record = mutator.up(record, &ctx.with_replay(replay).at(index));
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reshape_schema::FieldSchema;
    use serde_json::json;

    fn person() -> MigrationPipeline {
        MigrationPipeline::new()
            .with_mutator(Mutator::add("name", FieldSchema::string(), json!("")))
            .unwrap()
            .with_mutator(Mutator::add("age", FieldSchema::number(), json!(0)))
            .unwrap()
    }

    #[test]
    fn evolution_count_tracks_mutators() {
        let pipeline = person();
        assert_eq!(pipeline.evolution_count(), 2);
        assert_eq!(pipeline.mutators().count(), 2);
        assert_eq!(pipeline.paths().names().collect::<Vec<_>>(), vec!["name", "age"]);
    }

    #[test]
    fn with_mutator_keeps_previous_state() {
        let before = person();
        let after = before.with_mutator(Mutator::remove("age")).unwrap();
        assert_eq!(before.evolution_count(), 2);
        assert!(before.paths().contains("age"));
        assert!(!after.paths().contains("age"));
    }

    #[test]
    fn with_mutator_rejects_bad_precondition() {
        let err = person().with_mutator(Mutator::remove("cheese")).unwrap_err();
        assert_eq!(err.to_string(), "Path cheese not found");
    }

    #[test]
    fn transform_fills_defaults() {
        assert_eq!(person().transform(json!({})), json!({ "name": "", "age": 0 }));
    }

    #[test]
    fn transform_passes_non_objects_through() {
        assert_eq!(person().transform(json!([1, 2])), json!([1, 2]));
        assert_eq!(person().transform(Value::Null), Value::Null);
    }

    #[test]
    fn marker_resumes_without_scanning() {
        let record = json!({ SCHEMA_EVOLUTION_COUNT_TAG: 1 });
        let report = person().transform_with_report(record, TransformOptions::default());
        assert_eq!(report.resume, ResumePoint::Marker(1));
        assert_eq!(report.applied, 1);
        assert_eq!(report.output, json!({ "age": 0 }));
    }

    #[test]
    fn zero_marker_replays_everything() {
        let record = json!({ SCHEMA_EVOLUTION_COUNT_TAG: 0, "name": "Jon" });
        let report = person().transform_with_report(record, TransformOptions::default());
        assert_eq!(report.resume, ResumePoint::Marker(0));
        assert_eq!(report.applied, 2);
        assert_eq!(report.output, json!({ "name": "Jon", "age": 0 }));
    }

    #[test]
    fn marker_beyond_count_applies_nothing() {
        let record = json!({ SCHEMA_EVOLUTION_COUNT_TAG: 9, "name": "Jon" });
        let report = person().transform_with_report(record, TransformOptions::default());
        assert_eq!(report.applied, 0);
        assert_eq!(report.output, json!({ "name": "Jon" }));
    }

    #[test]
    fn complete_record_loses_version_marker() {
        let record = json!({ VERSION_TAG: 1, "name": "Jon", "age": 3 });
        let report = person().transform_with_report(record, TransformOptions::default());
        assert_eq!(report.resume, ResumePoint::Complete);
        assert_eq!(report.output, json!({ "name": "Jon", "age": 3 }));
    }

    #[test]
    fn complete_record_loses_malformed_count_marker() {
        let record = json!({ SCHEMA_EVOLUTION_COUNT_TAG: "2", "name": "Jon", "age": 3 });
        let report = person().transform_with_report(record, TransformOptions::default());
        assert_eq!(report.resume, ResumePoint::Complete);
        assert_eq!(report.output, json!({ "name": "Jon", "age": 3 }));
    }

    #[test]
    fn complete_record_keeps_markers_on_request() {
        let record = json!({ VERSION_TAG: 1, "name": "Jon", "age": 3 });
        let output = person().transform_with(record.clone(), TransformOptions::keep_markers());
        assert_eq!(output, record);
    }

    #[test]
    fn name_declared_again_after_rename_gets_its_default() {
        let pipeline = person()
            .with_mutator(Mutator::rename("name", "fullName"))
            .unwrap()
            .with_mutator(Mutator::add("name", FieldSchema::string(), json!("nick")))
            .unwrap();
        let current = json!({ "age": 0, "fullName": "", "name": "nick" });

        assert_eq!(pipeline.transform(json!({})), current);
        assert_eq!(pipeline.transform(current.clone()), current);
        assert_eq!(
            pipeline.transform(json!({ SCHEMA_EVOLUTION_COUNT_TAG: 3, "fullName": "Jon", "age": 1 })),
            json!({ "fullName": "Jon", "age": 1, "name": "nick" })
        );
        assert_eq!(
            pipeline.transform(json!({ "name": "Jon", "age": 1 })),
            json!({ "age": 1, "fullName": "Jon", "name": "nick" })
        );
        assert_eq!(
            pipeline.first_invalid(json!({ "fullName": "Jon", "age": 1 }).as_object().unwrap()),
            Some(3)
        );
    }

    #[test]
    fn inferred_resume_point() {
        let report =
            person().transform_with_report(json!({ "name": "Jon" }), TransformOptions::default());
        assert_eq!(report.resume, ResumePoint::Inferred(1));
        assert_eq!(report.output, json!({ "name": "Jon", "age": 0 }));
    }

    #[test]
    fn complete_record_is_returned_unchanged() {
        let record = json!({ "name": "Jon", "age": 3, "extra": true });
        let report = person().transform_with_report(record.clone(), TransformOptions::default());
        assert_eq!(report.resume, ResumePoint::Complete);
        assert_eq!(report.applied, 0);
        assert_eq!(report.output, record);
    }

    #[test]
    fn keep_markers_leaves_tags() {
        let record = json!({ SCHEMA_EVOLUTION_COUNT_TAG: 2, "name": "", "age": 0 });
        let output = person().transform_with(record.clone(), TransformOptions::keep_markers());
        assert_eq!(output, record);
        assert_eq!(
            person().transform(record),
            json!({ "name": "", "age": 0 })
        );
    }

    #[test]
    fn prepare_stamps_count_and_version() {
        let pipeline = person().with_release(1).unwrap();
        let stamped = pipeline.prepare_for_persistence(&json!({ "name": "", "age": 0 }));
        assert_eq!(stamped[SCHEMA_EVOLUTION_COUNT_TAG], json!(2));
        assert_eq!(stamped[VERSION_TAG], json!(1));

        let later = pipeline.with_mutator(Mutator::remove("age")).unwrap();
        let stamped = later.prepare_for_persistence(&json!({ "name": "" }));
        assert_eq!(stamped[SCHEMA_EVOLUTION_COUNT_TAG], json!(3));
        assert!(stamped.get(VERSION_TAG).is_none());
    }

    #[test]
    fn prepare_does_not_touch_input() {
        let record = json!({ "name": "" });
        let _ = person().prepare_for_persistence(&record);
        assert_eq!(record, json!({ "name": "" }));
    }

    #[test]
    fn transform_from_version_uses_ledger() {
        let pipeline = MigrationPipeline::new()
            .with_mutator(Mutator::add("name", FieldSchema::string(), json!("")))
            .unwrap()
            .with_release(1)
            .unwrap()
            .with_mutator(Mutator::add("age", FieldSchema::number(), json!(0)))
            .unwrap();

        let output = pipeline.transform_from_version(json!({}), 1).unwrap();
        assert_eq!(output, json!({ "age": 0 }));
        assert!(matches!(
            pipeline.transform_from_version(json!({}), 7),
            Err(EvolveError::UnknownVersion(7))
        ));
    }

    #[test]
    fn needs_migration_by_marker_and_scan() {
        let pipeline = person();
        let stale = json!({ SCHEMA_EVOLUTION_COUNT_TAG: 1, "name": "", "age": 0 });
        let current = json!({ SCHEMA_EVOLUTION_COUNT_TAG: 2 });
        let unmarked = json!({ "name": "" });

        assert!(pipeline.needs_migration(stale.as_object().unwrap()));
        assert!(!pipeline.needs_migration(current.as_object().unwrap()));
        assert!(pipeline.needs_migration(unmarked.as_object().unwrap()));
        assert_eq!(pipeline.first_invalid(unmarked.as_object().unwrap()), Some(1));
    }

    #[test]
    fn prefix_replays_first_mutators_and_versions() {
        let pipeline = person()
            .with_release(1)
            .unwrap()
            .with_mutator(Mutator::remove("age"))
            .unwrap()
            .with_release(2)
            .unwrap();

        let prefix = pipeline.prefix(2).unwrap();
        assert_eq!(prefix.evolution_count(), 2);
        assert_eq!(prefix.versions().max_version(), Some(1));
        assert!(prefix.paths().contains("age"));

        let empty = pipeline.prefix(0).unwrap();
        assert_eq!(empty.evolution_count(), 0);
        assert!(empty.versions().is_empty());
    }
}
