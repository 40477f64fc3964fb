//! reshape codec - persisted form of migrated records
//!
//! Encodes stamped records to text and decodes stored text back into records
//! that are then migrated by a [`reshape_core::MigrationPipeline`].
//!
//! # Example
//!
//! ```rust
//! use reshape_codec::{parse, stringify, JsonCodec};
//! use reshape_core::SchemaEvolver;
//! use reshape_schema::FieldSchema;
//! use serde_json::json;
//!
//! let evolver = SchemaEvolver::new().add("name", FieldSchema::string(), json!(""))?;
//! let codec = JsonCodec::new();
//!
//! let text = stringify(evolver.pipeline(), &json!({ "name": "Jon" }), &codec)?;
//! assert_eq!(parse(evolver.pipeline(), &text, &codec)?, json!({ "name": "Jon" }));
//! # Ok::<(), reshape_codec::CodecError>(())
//! ```

#![warn(unreachable_pub)]

mod codec;
mod error;
mod persist;
mod registry;

pub use codec::{JsonCodec, RecordCodec, YamlCodec};
pub use error::{CodecError, CodecResult};
pub use persist::{
    decode_documents, decode_with_shape, parse, parse_validated, read_documents, stringify,
    DocumentShape,
};
pub use registry::{default_codecs, CodecRegistry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
