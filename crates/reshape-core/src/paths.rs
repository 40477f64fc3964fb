//! Known top-level fields at a point in pipeline history
//!
//! Provides [`PathSet`], the rolling model each mutator checks against at build
//! time and rewrites to describe the world after it has run.

use crate::pipeline::MigrationPipeline;
use crate::renames::RenamePair;
use im::Vector;
use reshape_schema::{FieldSchema, ObjectSchema};
use std::sync::Arc;

/// Shape of a field that owns its own pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedKind {
    /// A single embedded record
    Object,
    /// An array of embedded records
    Array,
}

/// Independently evolving pipeline embedded at a field
#[derive(Debug, Clone)]
pub struct NestedMigrator {
    kind: NestedKind,
    pipeline: Arc<MigrationPipeline>,
}

impl NestedMigrator {
    /// Create nested migrator
    #[inline]
    #[must_use]
    pub fn new(kind: NestedKind, pipeline: Arc<MigrationPipeline>) -> Self {
        Self { kind, pipeline }
    }

    /// Object or array
    #[inline]
    #[must_use]
    pub fn kind(&self) -> NestedKind {
        self.kind
    }

    /// The embedded pipeline
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &Arc<MigrationPipeline> {
        &self.pipeline
    }

    /// Check whether two handles embed the very same pipeline value
    #[inline]
    #[must_use]
    pub fn same_pipeline(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pipeline, &other.pipeline)
    }
}

/// One field known to exist at a given point in pipeline history
#[derive(Debug, Clone)]
pub struct PathEntry {
    name: String,
    schema: FieldSchema,
    nested: Option<NestedMigrator>,
}

impl PathEntry {
    /// Plain field
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, schema: FieldSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            nested: None,
        }
    }

    /// Field owning a nested pipeline
    #[inline]
    #[must_use]
    pub fn nested(name: impl Into<String>, schema: FieldSchema, nested: NestedMigrator) -> Self {
        Self {
            name: name.into(),
            schema,
            nested: Some(nested),
        }
    }

    /// Current field name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared shape
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Nested pipeline, if the field was added by a nested mutator
    #[inline]
    #[must_use]
    pub fn nested_migrator(&self) -> Option<&NestedMigrator> {
        self.nested.as_ref()
    }
}

/// Ordered set of known top-level fields
///
/// Persistent: every rewrite returns a new set sharing structure with the old one.
#[derive(Debug, Clone, Default)]
pub struct PathSet(Vector<PathEntry>);

impl PathSet {
    /// Empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Vector::new())
    }

    /// One entry per key of an object shape
    #[must_use]
    pub fn from_schema(schema: &ObjectSchema) -> Self {
        schema
            .keys()
            .map(|key| {
                let field = schema.get(key).cloned().unwrap_or_default();
                PathEntry::new(key, field)
            })
            .collect()
    }

    /// Check if a field is known
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|entry| entry.name == name)
    }

    /// Look up a field
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PathEntry> {
        self.0.iter().find(|entry| entry.name == name)
    }

    /// Set with `entry` appended
    #[must_use]
    pub fn with_entry(&self, entry: PathEntry) -> Self {
        let mut entries = self.0.clone();
        entries.push_back(entry);
        Self(entries)
    }

    /// Set without `name`
    #[must_use]
    pub fn without(&self, name: &str) -> Self {
        self.0
            .iter()
            .filter(|entry| entry.name != name)
            .cloned()
            .collect()
    }

    /// Set with `from` renamed to `to` in place
    ///
    /// Position and nested migrator of the entry are preserved.
    #[must_use]
    pub fn renamed(&self, from: &str, to: &str) -> Self {
        let mut entries = self.0.clone();
        if let Some(index) = entries.iter().position(|entry| entry.name == from) {
            if let Some(entry) = entries.get_mut(index) {
                entry.name = to.to_string();
            }
        }
        Self(entries)
    }

    /// Set with every `old -> new` pair applied at once
    ///
    /// Pairs do not see each other's results, so `{a: b, b: a}` swaps.
    #[must_use]
    pub fn renamed_many(&self, pairs: &[RenamePair]) -> Self {
        self.0
            .iter()
            .map(|entry| {
                match pairs.iter().find(|pair| pair.old() == entry.name) {
                    Some(pair) => PathEntry {
                        name: pair.new_name().to_string(),
                        ..entry.clone()
                    },
                    None => entry.clone(),
                }
            })
            .collect()
    }

    /// Field names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|entry| entry.name.as_str())
    }

    /// Entries in order
    pub fn iter(&self) -> impl Iterator<Item = &PathEntry> {
        self.0.iter()
    }

    /// Number of known fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no fields are known
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<PathEntry> for PathSet {
    fn from_iter<I: IntoIterator<Item = PathEntry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
