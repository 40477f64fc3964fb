//! Reserved marker keys stamped onto persisted records

use serde_json::{Map, Value};

/// Evolution count of the pipeline that wrote the record
pub const SCHEMA_EVOLUTION_COUNT_TAG: &str = "__reshape_schema_evolution_count";

/// Released version of the pipeline that wrote the record
pub const VERSION_TAG: &str = "__reshape_version";

/// Read the resumption marker
///
/// A marker that is not a non-negative integer is treated as absent.
#[must_use]
pub fn read_evolution_count(record: &Map<String, Value>) -> Option<usize> {
    let raw = record.get(SCHEMA_EVOLUTION_COUNT_TAG)?;
    let count = raw.as_u64().and_then(|n| usize::try_from(n).ok());
    if count.is_none() {
        tracing::warn!(marker = %raw, "ignoring malformed evolution count marker");
    }
    count
}

/// Read the release-version marker
#[must_use]
pub fn read_version(record: &Map<String, Value>) -> Option<u64> {
    record.get(VERSION_TAG).and_then(Value::as_u64)
}

/// Remove both marker keys
pub fn strip_markers(record: &mut Map<String, Value>) {
    record.shift_remove(SCHEMA_EVOLUTION_COUNT_TAG);
    record.shift_remove(VERSION_TAG);
}

/// Check whether a key is one of the reserved markers
#[inline]
#[must_use]
pub fn is_marker(key: &str) -> bool {
    key == SCHEMA_EVOLUTION_COUNT_TAG || key == VERSION_TAG
}
