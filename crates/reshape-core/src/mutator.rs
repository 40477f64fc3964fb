//! Declared structural edits
//!
//! A [`Mutator`] is one atomic edit to a record shape. The set of edits is
//! closed, so it is a plain enum with one struct per kind and a single `match`
//! for each of the five operations:
//!
//! | operation         | when                     | purpose                                   |
//! |-------------------|--------------------------|-------------------------------------------|
//! | `before_mutate`   | build time, once         | reject edits to unknown / existing fields |
//! | `rewrite_paths`   | build time, once         | known fields after this edit              |
//! | `rewrite_renames` | build time, once         | rename history after this edit            |
//! | `is_valid`        | replay without a marker  | "this edit is already reflected"          |
//! | `up`              | replay                   | apply the edit                            |
//!
//! Every `up` is idempotent on records that already have the target shape.

use crate::error::{EvolveError, EvolveResult};
use crate::paths::{NestedKind, NestedMigrator, PathEntry, PathSet};
use crate::pipeline::MigrationPipeline;
use crate::renames::{RenameChain, RenamePair};
use reshape_schema::{FieldSchema, ObjectSchema};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Record object as seen by mutators
pub type Record = Map<String, Value>;

/// Why a mutator is being applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    /// The record has not seen this edit yet
    Fresh,
    /// The record already saw this edit; only embedded records are refreshed
    Refresh,
}

/// Pipeline state a mutator consults while replaying
///
/// Always the state after the *last* registered mutator, so renames declared
/// later in the pipeline are visible to earlier edits. With a position set,
/// only renames declared after that position count as aliases.
#[derive(Debug, Clone, Copy)]
pub struct MutationContext<'a> {
    paths: &'a PathSet,
    renames: &'a RenameChain,
    replay: Replay,
    position: Option<usize>,
}

impl<'a> MutationContext<'a> {
    /// Context for a fresh application
    #[inline]
    #[must_use]
    pub fn new(paths: &'a PathSet, renames: &'a RenameChain) -> Self {
        Self {
            paths,
            renames,
            replay: Replay::Fresh,
            position: None,
        }
    }

    /// Same context, for the mutator registered at `position`
    #[inline]
    #[must_use]
    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// Same context, switched to `replay`
    #[inline]
    #[must_use]
    pub fn with_replay(mut self, replay: Replay) -> Self {
        self.replay = replay;
        self
    }

    /// Known fields
    #[inline]
    #[must_use]
    pub fn paths(&self) -> &'a PathSet {
        self.paths
    }

    /// Rename history
    #[inline]
    #[must_use]
    pub fn renames(&self) -> &'a RenameChain {
        self.renames
    }

    /// Replay mode
    #[inline]
    #[must_use]
    pub fn replay(&self) -> Replay {
        self.replay
    }

    /// Position of the mutator being applied, if set
    #[inline]
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    fn aliases(&self, name: &str) -> Vec<String> {
        match self.position {
            Some(position) => self.renames.aliases_after(name, position),
            None => self.renames.forward_aliases(name),
        }
    }

    fn present_under_alias(&self, input: &Record, name: &str) -> bool {
        self.aliases(name)
            .iter()
            .any(|alias| input.contains_key(alias))
    }

    fn is_known(&self, name: &str) -> bool {
        self.aliases(name)
            .iter()
            .any(|alias| self.paths.contains(alias))
    }

    fn find_alias(&self, input: &Record, name: &str) -> Option<String> {
        let candidates = match self.position {
            Some(_) => {
                let mut aliases = self.aliases(name);
                aliases.reverse();
                aliases
            }
            None => self.renames.lineage(name),
        };
        candidates.into_iter().find(|alias| input.contains_key(alias))
    }

    fn owns_nested(&self, name: &str, nested: &NestedMigrator) -> bool {
        self.aliases(name).iter().any(|alias| {
            self.paths
                .get(alias)
                .and_then(PathEntry::nested_migrator)
                .is_some_and(|current| current.same_pipeline(nested))
        })
    }
}

/// Mutator tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutatorKind {
    /// Single field with a default
    Add,
    /// Several fields with defaults
    AddMany,
    /// Embedded record with its own pipeline
    AddNested,
    /// Array of embedded records with their own pipeline
    AddNestedArray,
    /// Single field renamed
    Rename,
    /// Several fields renamed at once
    RenameMany,
    /// Single field removed
    Remove,
    /// Several fields removed
    RemoveMany,
}

impl Display for MutatorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Add => "add",
            Self::AddMany => "add_many",
            Self::AddNested => "add_nested",
            Self::AddNestedArray => "add_nested_array",
            Self::Rename => "rename",
            Self::RenameMany => "rename_many",
            Self::Remove => "remove",
            Self::RemoveMany => "remove_many",
        };
        f.write_str(tag)
    }
}

/// Add one field
#[derive(Debug, Clone)]
pub struct AddField {
    path: String,
    schema: FieldSchema,
    default: Value,
}

/// Add every key of an object shape
#[derive(Debug, Clone)]
pub struct AddManyFields {
    schema: ObjectSchema,
    defaults: Record,
}

/// Add an embedded record evolved by its own pipeline
#[derive(Debug, Clone)]
pub struct AddNestedObject {
    path: String,
    schema: FieldSchema,
    default_start: Value,
    nested: NestedMigrator,
    nullable: bool,
    optional: bool,
}

impl AddNestedObject {
    /// Nested object at `path`
    ///
    /// `default_start` is in the nested pipeline's *starting* shape; it is
    /// migrated through the nested pipeline before being inserted.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        schema: FieldSchema,
        default_start: Value,
        nested: impl Into<Arc<MigrationPipeline>>,
    ) -> Self {
        Self {
            path: path.into(),
            schema,
            default_start,
            nested: NestedMigrator::new(NestedKind::Object, nested.into()),
            nullable: false,
            optional: false,
        }
    }

    /// Keep stored `null` instead of defaulting it
    #[inline]
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Keep the field absent instead of defaulting it
    #[inline]
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn default_value(&self) -> Value {
        self.nested
            .pipeline()
            .transform_from(self.default_start.clone(), 0)
    }

    fn entry_schema(&self) -> FieldSchema {
        if self.nullable {
            self.schema.clone().nullable()
        } else {
            self.schema.clone()
        }
    }
}

/// Add an array of embedded records evolved by their own pipeline
#[derive(Debug, Clone)]
pub struct AddNestedArray {
    path: String,
    item_schema: FieldSchema,
    default_start: Option<Vec<Value>>,
    nested: NestedMigrator,
}

impl AddNestedArray {
    /// Nested array at `path`; absent arrays stay absent
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        item_schema: FieldSchema,
        nested: impl Into<Arc<MigrationPipeline>>,
    ) -> Self {
        Self {
            path: path.into(),
            item_schema,
            default_start: None,
            nested: NestedMigrator::new(NestedKind::Array, nested.into()),
        }
    }

    /// Insert `items` (starting shape) when the field is absent
    #[inline]
    #[must_use]
    pub fn with_default(mut self, items: Vec<Value>) -> Self {
        self.default_start = Some(items);
        self
    }

    fn default_value(&self) -> Option<Value> {
        let items = self.default_start.as_ref()?;
        let pipeline = self.nested.pipeline();
        Some(Value::Array(
            items
                .iter()
                .map(|item| pipeline.transform_from(item.clone(), 0))
                .collect(),
        ))
    }
}

/// Rename one field
#[derive(Debug, Clone)]
pub struct RenameField {
    source: String,
    destination: String,
}

/// Rename several fields at once
#[derive(Debug, Clone)]
pub struct RenameManyFields {
    renames: Vec<RenamePair>,
}

/// Remove one field
#[derive(Debug, Clone)]
pub struct RemoveField {
    path: String,
}

/// Remove several fields
#[derive(Debug, Clone)]
pub struct RemoveManyFields {
    paths: Vec<String>,
}

/// One declared structural edit
#[derive(Debug, Clone)]
pub enum Mutator {
    /// See [`AddField`]
    Add(AddField),
    /// See [`AddManyFields`]
    AddMany(AddManyFields),
    /// See [`AddNestedObject`]
    AddNested(AddNestedObject),
    /// See [`AddNestedArray`]
    AddNestedArray(AddNestedArray),
    /// See [`RenameField`]
    Rename(RenameField),
    /// See [`RenameManyFields`]
    RenameMany(RenameManyFields),
    /// See [`RemoveField`]
    Remove(RemoveField),
    /// See [`RemoveManyFields`]
    RemoveMany(RemoveManyFields),
}

impl Mutator {
    /// Add `path` with `default`
    #[must_use]
    pub fn add(path: impl Into<String>, schema: FieldSchema, default: Value) -> Self {
        Self::Add(AddField {
            path: path.into(),
            schema,
            default,
        })
    }

    /// Add every key of `schema`, taking values from `defaults`
    #[must_use]
    pub fn add_many(schema: ObjectSchema, defaults: Record) -> Self {
        Self::AddMany(AddManyFields { schema, defaults })
    }

    /// Rename `source` to `destination`
    #[must_use]
    pub fn rename(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::Rename(RenameField {
            source: source.into(),
            destination: destination.into(),
        })
    }

    /// Rename several fields at once
    #[must_use]
    pub fn rename_many<I, P>(renames: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<RenamePair>,
    {
        Self::RenameMany(RenameManyFields {
            renames: renames.into_iter().map(Into::into).collect(),
        })
    }

    /// Remove `path`
    #[must_use]
    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove(RemoveField { path: path.into() })
    }

    /// Remove several fields
    #[must_use]
    pub fn remove_many<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::RemoveMany(RemoveManyFields {
            paths: paths.into_iter().map(Into::into).collect(),
        })
    }

    /// Tag
    #[must_use]
    pub fn kind(&self) -> MutatorKind {
        match self {
            Self::Add(_) => MutatorKind::Add,
            Self::AddMany(_) => MutatorKind::AddMany,
            Self::AddNested(_) => MutatorKind::AddNested,
            Self::AddNestedArray(_) => MutatorKind::AddNestedArray,
            Self::Rename(_) => MutatorKind::Rename,
            Self::RenameMany(_) => MutatorKind::RenameMany,
            Self::Remove(_) => MutatorKind::Remove,
            Self::RemoveMany(_) => MutatorKind::RemoveMany,
        }
    }

    /// Field name as declared, for single-field kinds
    #[must_use]
    pub fn declared_path(&self) -> Option<&str> {
        match self {
            Self::Add(m) => Some(&m.path),
            Self::AddNested(m) => Some(&m.path),
            Self::AddNestedArray(m) => Some(&m.path),
            Self::Rename(m) => Some(&m.source),
            Self::Remove(m) => Some(&m.path),
            Self::AddMany(_) | Self::RenameMany(_) | Self::RemoveMany(_) => None,
        }
    }

    /// Nested pipeline owned by this edit
    #[must_use]
    pub fn nested(&self) -> Option<&NestedMigrator> {
        match self {
            Self::AddNested(m) => Some(&m.nested),
            Self::AddNestedArray(m) => Some(&m.nested),
            _ => None,
        }
    }

    /// Validate preconditions against the fields known before this edit
    ///
    /// # Errors
    /// - [`EvolveError::PathNotFound`] when renaming or removing an unknown field
    /// - [`EvolveError::DuplicatePath`] when adding (or renaming onto) an existing field,
    ///   including a field another pair of the same batch renames away
    /// - [`EvolveError::MissingDefault`] when a multi-field add lacks a default
    pub fn before_mutate(&self, paths: &PathSet) -> EvolveResult<()> {
        match self {
            Self::Add(AddField { path, .. })
            | Self::AddNested(AddNestedObject { path, .. })
            | Self::AddNestedArray(AddNestedArray { path, .. }) => require_absent(paths, path),
            Self::AddMany(m) => m.schema.keys().try_for_each(|key| {
                require_absent(paths, key)?;
                if m.defaults.contains_key(key) {
                    Ok(())
                } else {
                    Err(EvolveError::MissingDefault {
                        path: key.to_string(),
                    })
                }
            }),
            Self::Rename(m) => {
                require_present(paths, &m.source)?;
                require_absent(paths, &m.destination)
            }
            Self::RenameMany(m) => {
                let mut destinations: Vec<&str> = Vec::new();
                for pair in &m.renames {
                    require_present(paths, pair.old())?;
                    require_absent(paths, pair.new_name())?;
                    if destinations.contains(&pair.new_name()) {
                        return Err(EvolveError::duplicate_path(pair.new_name()));
                    }
                    destinations.push(pair.new_name());
                }
                Ok(())
            }
            Self::Remove(m) => require_present(paths, &m.path),
            Self::RemoveMany(m) => m.paths.iter().try_for_each(|path| require_present(paths, path)),
        }
    }

    /// Known fields after this edit
    #[must_use]
    pub fn rewrite_paths(&self, paths: &PathSet) -> PathSet {
        match self {
            Self::Add(m) => paths.with_entry(PathEntry::new(&m.path, m.schema.clone())),
            Self::AddMany(m) => m.schema.keys().fold(paths.clone(), |acc, key| {
                let field = m.schema.get(key).cloned().unwrap_or_default();
                acc.with_entry(PathEntry::new(key, field))
            }),
            Self::AddNested(m) => paths.with_entry(PathEntry::nested(
                &m.path,
                m.entry_schema(),
                m.nested.clone(),
            )),
            Self::AddNestedArray(m) => paths.with_entry(PathEntry::nested(
                &m.path,
                FieldSchema::array(m.item_schema.clone()),
                m.nested.clone(),
            )),
            Self::Rename(m) => paths.renamed(&m.source, &m.destination),
            Self::RenameMany(m) => paths.renamed_many(&m.renames),
            Self::Remove(m) => paths.without(&m.path),
            Self::RemoveMany(m) => m
                .paths
                .iter()
                .fold(paths.clone(), |acc, path| acc.without(path)),
        }
    }

    /// Rename history after this edit, registered at `position`
    #[must_use]
    pub fn rewrite_renames(&self, renames: &RenameChain, position: usize) -> RenameChain {
        match self {
            Self::Rename(m) => renames.append(&m.source, &m.destination, position),
            Self::RenameMany(m) => m.renames.iter().fold(renames.clone(), |acc, pair| {
                acc.append(pair.old(), pair.new_name(), position)
            }),
            Self::Remove(m) => renames.prune_terminating_at(&m.path),
            Self::RemoveMany(m) => m
                .paths
                .iter()
                .fold(renames.clone(), |acc, path| acc.prune_terminating_at(path)),
            Self::Add(_) | Self::AddMany(_) | Self::AddNested(_) | Self::AddNestedArray(_) => {
                renames.clone()
            }
        }
    }

    /// Check whether `input` already reflects this edit
    ///
    /// Best effort, used only when a record carries no marker. Assumes every
    /// earlier edit has been applied.
    #[must_use]
    pub fn is_valid(&self, input: &Record, ctx: &MutationContext<'_>) -> bool {
        match self {
            Self::Add(m) => field_added(input, &m.path, ctx),
            Self::AddMany(m) => m.schema.keys().all(|key| field_added(input, key, ctx)),
            Self::AddNested(m) => {
                if !ctx.owns_nested(&m.path, &m.nested) {
                    return true;
                }
                match ctx.find_alias(input, &m.path).and_then(|key| input.get(&key)) {
                    None => m.optional,
                    Some(Value::Null) => m.nullable,
                    Some(Value::Object(child)) => !m.nested.pipeline().needs_migration(child),
                    Some(_) => true,
                }
            }
            Self::AddNestedArray(m) => {
                if !ctx.owns_nested(&m.path, &m.nested) {
                    return true;
                }
                match ctx.find_alias(input, &m.path).and_then(|key| input.get(&key)) {
                    None => m.default_start.is_none(),
                    Some(Value::Array(items)) => items.iter().all(|item| match item {
                        Value::Object(child) => !m.nested.pipeline().needs_migration(child),
                        _ => true,
                    }),
                    Some(_) => true,
                }
            }
            Self::Rename(m) => field_renamed(input, &m.source, &m.destination, ctx),
            Self::RenameMany(m) => m
                .renames
                .iter()
                .all(|pair| field_renamed(input, pair.old(), pair.new_name(), ctx)),
            Self::Remove(m) => field_removed(input, &m.path, ctx),
            Self::RemoveMany(m) => m.paths.iter().all(|path| field_removed(input, path, ctx)),
        }
    }

    /// Apply this edit
    #[must_use]
    pub fn up(&self, mut input: Record, ctx: &MutationContext<'_>) -> Record {
        if ctx.replay == Replay::Refresh {
            return match self {
                Self::AddNested(m) if ctx.owns_nested(&m.path, &m.nested) => {
                    refresh_nested(input, &m.path, &m.nested, ctx)
                }
                Self::AddNestedArray(m) if ctx.owns_nested(&m.path, &m.nested) => {
                    refresh_nested(input, &m.path, &m.nested, ctx)
                }
                _ => input,
            };
        }

        match self {
            Self::Add(m) => {
                if !ctx.present_under_alias(&input, &m.path) {
                    input.insert(m.path.clone(), m.default.clone());
                }
            }
            Self::AddMany(m) => {
                for key in m.schema.keys() {
                    if ctx.present_under_alias(&input, key) {
                        continue;
                    }
                    if let Some(default) = m.defaults.get(key) {
                        input.insert(key.to_string(), default.clone());
                    }
                }
            }
            Self::AddNested(m) => {
                let key = ctx
                    .find_alias(&input, &m.path)
                    .unwrap_or_else(|| m.path.clone());
                match input.get_mut(&key) {
                    Some(Value::Null) if m.nullable => {}
                    Some(value @ Value::Null) => *value = m.default_value(),
                    Some(value @ Value::Object(_)) => migrate_in_place(value, m.nested.pipeline()),
                    Some(_) => {}
                    None if m.optional => {}
                    None => {
                        input.insert(key, m.default_value());
                    }
                }
            }
            Self::AddNestedArray(m) => {
                let key = ctx
                    .find_alias(&input, &m.path)
                    .unwrap_or_else(|| m.path.clone());
                match input.get_mut(&key) {
                    Some(Value::Array(items)) => {
                        for item in items.iter_mut().filter(|item| item.is_object()) {
                            migrate_in_place(item, m.nested.pipeline());
                        }
                    }
                    Some(_) => {}
                    None => {
                        if let Some(default) = m.default_value() {
                            input.insert(key, default);
                        }
                    }
                }
            }
            Self::Rename(m) => {
                if let Some(value) = input.shift_remove(&m.source) {
                    input.insert(m.destination.clone(), value);
                }
            }
            Self::RenameMany(m) => {
                let moved: Vec<(String, Value)> = m
                    .renames
                    .iter()
                    .filter_map(|pair| {
                        input
                            .shift_remove(pair.old())
                            .map(|value| (pair.new_name().to_string(), value))
                    })
                    .collect();
                input.extend(moved);
            }
            Self::Remove(m) => {
                input.shift_remove(&m.path);
            }
            Self::RemoveMany(m) => {
                for path in &m.paths {
                    input.shift_remove(path);
                }
            }
        }
        input
    }
}

impl Mutator {
    /// Check whether an embedded record owned by this edit needs migrating
    pub(crate) fn nested_stale(&self, input: &Record, ctx: &MutationContext<'_>) -> bool {
        let Some(nested) = self.nested() else {
            return false;
        };
        let Some(path) = self.declared_path() else {
            return false;
        };
        if !ctx.owns_nested(path, nested) {
            return false;
        }
        let pipeline = nested.pipeline();
        match ctx.find_alias(input, path).and_then(|key| input.get(&key)) {
            Some(Value::Object(child)) => pipeline.needs_migration(child),
            Some(Value::Array(items)) => items.iter().any(|item| match item {
                Value::Object(child) => pipeline.needs_migration(child),
                _ => false,
            }),
            _ => false,
        }
    }

    /// Stamp embedded records owned by this edit with their own pipeline position
    pub(crate) fn stamp_nested(&self, input: &mut Record, ctx: &MutationContext<'_>) {
        let (Some(nested), Some(path)) = (self.nested(), self.declared_path()) else {
            return;
        };
        if !ctx.owns_nested(path, nested) {
            return;
        }
        let Some(key) = ctx.find_alias(input, path) else {
            return;
        };
        let pipeline = nested.pipeline();
        match (nested.kind(), input.get_mut(&key)) {
            (NestedKind::Object, Some(value @ Value::Object(_))) => {
                *value = pipeline.prepare_for_persistence(value);
            }
            (NestedKind::Array, Some(Value::Array(items))) => {
                for item in items.iter_mut().filter(|item| item.is_object()) {
                    *item = pipeline.prepare_for_persistence(item);
                }
            }
            _ => {}
        }
    }
}

impl From<AddNestedObject> for Mutator {
    fn from(m: AddNestedObject) -> Self {
        Self::AddNested(m)
    }
}

impl From<AddNestedArray> for Mutator {
    fn from(m: AddNestedArray) -> Self {
        Self::AddNestedArray(m)
    }
}

fn require_absent(paths: &PathSet, path: &str) -> EvolveResult<()> {
    if paths.contains(path) {
        Err(EvolveError::duplicate_path(path))
    } else {
        Ok(())
    }
}

fn require_present(paths: &PathSet, path: &str) -> EvolveResult<()> {
    if paths.contains(path) {
        Ok(())
    } else {
        Err(EvolveError::path_not_found(path))
    }
}

/// Present under its name or a later one, or dropped again later in the pipeline
fn field_added(input: &Record, path: &str, ctx: &MutationContext<'_>) -> bool {
    ctx.present_under_alias(input, path) || !ctx.is_known(path)
}

/// Gone from the record, or the name belongs to a field declared later
fn field_removed(input: &Record, path: &str, ctx: &MutationContext<'_>) -> bool {
    !input.contains_key(path) || ctx.is_known(path)
}

fn field_renamed(input: &Record, source: &str, destination: &str, ctx: &MutationContext<'_>) -> bool {
    field_removed(input, source, ctx)
        && (ctx.present_under_alias(input, destination) || !ctx.is_known(destination))
}

fn migrate_in_place(value: &mut Value, pipeline: &MigrationPipeline) {
    let current = std::mem::take(value);
    *value = pipeline.transform(current);
}

fn refresh_nested(
    mut input: Record,
    path: &str,
    nested: &NestedMigrator,
    ctx: &MutationContext<'_>,
) -> Record {
    let Some(key) = ctx.find_alias(&input, path) else {
        return input;
    };
    match (nested.kind(), input.get_mut(&key)) {
        (NestedKind::Object, Some(value @ Value::Object(_))) => {
            migrate_in_place(value, nested.pipeline());
        }
        (NestedKind::Array, Some(Value::Array(items))) => {
            for item in items.iter_mut().filter(|item| item.is_object()) {
                migrate_in_place(item, nested.pipeline());
            }
        }
        _ => {}
    }
    input
}
