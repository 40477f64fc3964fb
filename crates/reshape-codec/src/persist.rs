//! Persist-time and read-time helpers
//!
//! `stringify` stamps a record with the pipeline position before encoding;
//! `parse` decodes and migrates in one step.

use crate::codec::RecordCodec;
use crate::error::{CodecError, CodecResult};
use reshape_core::{MigrationPipeline, SafeValidator};
use serde_json::Value;
use std::path::Path;

/// Stamp `record` for storage and encode it
///
/// # Errors
/// Returns [`CodecError::Encode`] if the codec cannot write the record
pub fn stringify(pipeline: &MigrationPipeline, record: &Value, codec: &dyn RecordCodec) -> CodecResult<String> {
    let stamped = pipeline.prepare_for_persistence(record);
    codec.encode(&stamped)
}

/// Decode a stored record and migrate it to the current shape
///
/// # Errors
/// Returns [`CodecError::Decode`] on malformed text
pub fn parse(pipeline: &MigrationPipeline, text: &str, codec: &dyn RecordCodec) -> CodecResult<Value> {
    let record = codec.decode(text)?;
    Ok(pipeline.transform(record))
}

/// Decode, migrate and validate a stored record
///
/// # Errors
/// Returns [`CodecError::Decode`] on malformed text, or the validator's
/// schema error wrapped in [`CodecError::Evolve`]
pub fn parse_validated(validator: &SafeValidator, text: &str, codec: &dyn RecordCodec) -> CodecResult<Value> {
    let record = codec.decode(text)?;
    Ok(validator.parse(record)?)
}

/// Whether a document held a bare record or an array of records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// One record at the top level
    Single,
    /// Array of records, possibly of length one
    Array,
}

impl DocumentShape {
    /// Put `records` back into a document of this shape
    ///
    /// A `Single` document only holds exactly one record; any other count is
    /// written as an array.
    #[must_use]
    pub fn assemble(self, mut records: Vec<Value>) -> Value {
        match (self, records.len()) {
            (Self::Single, 1) => records.pop().unwrap_or_default(),
            _ => Value::Array(records),
        }
    }
}

/// Decode a document holding one record or an array of records
///
/// # Errors
/// Returns [`CodecError::Decode`] on malformed text
pub fn decode_documents(text: &str, codec: &dyn RecordCodec) -> CodecResult<Vec<Value>> {
    decode_with_shape(text, codec).map(|(records, _)| records)
}

/// Same as [`decode_documents`], also reporting the document's shape
///
/// # Errors
/// Returns [`CodecError::Decode`] on malformed text
pub fn decode_with_shape(text: &str, codec: &dyn RecordCodec) -> CodecResult<(Vec<Value>, DocumentShape)> {
    match codec.decode(text)? {
        Value::Array(records) => Ok((records, DocumentShape::Array)),
        record => Ok((vec![record], DocumentShape::Single)),
    }
}

/// Read and decode a record file
///
/// # Errors
/// Returns [`CodecError::Io`] if the file cannot be read, otherwise as
/// [`decode_documents`]
pub fn read_documents(path: &Path, codec: &dyn RecordCodec) -> CodecResult<Vec<Value>> {
    let text = std::fs::read_to_string(path).map_err(|e| CodecError::io_error(path, e))?;
    tracing::debug!(path = %path.display(), format = codec.format(), "decoding records");
    decode_documents(&text, codec)
}
