//! Codec lookup by file extension or format name

use crate::codec::{JsonCodec, RecordCodec, YamlCodec};
use crate::error::{CodecError, CodecResult};
use std::fmt;
use std::path::Path;

/// Registered codecs, searched in registration order
pub struct CodecRegistry {
    codecs: Vec<Box<dyn RecordCodec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        default_codecs()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("formats", &self.formats())
            .field("extensions", &self.all_extensions())
            .finish()
    }
}

impl CodecRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { codecs: Vec::new() }
    }

    /// Register a codec; a later codec replaces an earlier one with the same format
    pub fn register<C: RecordCodec>(&mut self, codec: C) {
        self.codecs.retain(|c| c.format() != codec.format());
        self.codecs.push(Box::new(codec));
    }

    /// Find codec for path
    #[must_use]
    pub fn find_for_path(&self, path: &Path) -> Option<&dyn RecordCodec> {
        self.codecs.iter().find(|c| c.can_handle(path)).map(|c| &**c)
    }

    /// Find codec by format name
    #[must_use]
    pub fn find_by_format(&self, format: &str) -> Option<&dyn RecordCodec> {
        self.codecs
            .iter()
            .find(|c| c.format().eq_ignore_ascii_case(format))
            .map(|c| &**c)
    }

    /// Codec for path
    ///
    /// # Errors
    /// Returns [`CodecError::NoCodecForExtension`] if nothing handles the path
    pub fn require_for_path(&self, path: &Path) -> CodecResult<&dyn RecordCodec> {
        self.find_for_path(path).ok_or_else(|| {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            CodecError::NoCodecForExtension(ext.to_string())
        })
    }

    /// Codec by format name
    ///
    /// # Errors
    /// Returns [`CodecError::UnknownFormat`] if no codec has that name
    pub fn require_format(&self, format: &str) -> CodecResult<&dyn RecordCodec> {
        self.find_by_format(format)
            .ok_or_else(|| CodecError::UnknownFormat(format.to_string()))
    }

    /// Registered format names
    #[must_use]
    pub fn formats(&self) -> Vec<&'static str> {
        self.codecs.iter().map(|c| c.format()).collect()
    }

    /// Get all registered extensions
    #[must_use]
    pub fn all_extensions(&self) -> Vec<&str> {
        self.codecs
            .iter()
            .flat_map(|c| c.extensions())
            .copied()
            .collect()
    }
}

/// Registry with pretty JSON and YAML
#[must_use]
pub fn default_codecs() -> CodecRegistry {
    let mut registry = CodecRegistry::new();
    registry.register(JsonCodec::pretty());
    registry.register(YamlCodec);
    registry
}
