//! Error types for record encoding and decoding

use reshape_core::EvolveError;
use reshape_schema::SchemaError;
use std::path::PathBuf;

/// Errors while turning records into text and back
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Record could not be serialized
    #[error("failed to encode record as {format}: {message}")]
    Encode {
        /// Codec format name
        format: &'static str,
        /// Serializer message
        message: String,
    },

    /// Text is not a valid document
    #[error("failed to decode {format} record: {message}")]
    Decode {
        /// Codec format name
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// No codec registered for a file extension
    #[error("no codec registered for extension: '{0}'")]
    NoCodecForExtension(String),

    /// No codec registered under a format name
    #[error("no codec registered for format: '{0}'")]
    UnknownFormat(String),

    /// IO error while reading or writing a record file
    #[error("io error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Pipeline failure
    #[error(transparent)]
    Evolve(#[from] EvolveError),
}

impl CodecError {
    /// Create encode error
    pub fn encode(format: &'static str, message: impl ToString) -> Self {
        Self::Encode {
            format,
            message: message.to_string(),
        }
    }

    /// Create decode error
    pub fn decode(format: &'static str, message: impl ToString) -> Self {
        Self::Decode {
            format,
            message: message.to_string(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<SchemaError> for CodecError {
    fn from(err: SchemaError) -> Self {
        Self::Evolve(EvolveError::Schema(err))
    }
}

/// Result type alias for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
