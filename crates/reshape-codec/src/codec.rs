//! Text codecs for records
//!
//! Implement [`RecordCodec`] to add a format. Codecs are stateless apart from
//! output options and are shared behind `&dyn RecordCodec`.

use crate::error::{CodecError, CodecResult};
use serde_json::Value;
use std::path::Path;

/// Encoder/decoder for one text format
pub trait RecordCodec: Send + Sync + 'static {
    /// Format name (`json`, `yaml`)
    fn format(&self) -> &'static str;

    /// Supported file extensions (without dot)
    fn extensions(&self) -> &[&str];

    /// Serialize a record
    ///
    /// # Errors
    /// Returns [`CodecError::Encode`] if the value cannot be written
    fn encode(&self, record: &Value) -> CodecResult<String>;

    /// Parse a record
    ///
    /// # Errors
    /// Returns [`CodecError::Decode`] on malformed text
    fn decode(&self, text: &str) -> CodecResult<Value>;

    /// Check if this codec handles the given path
    fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions().iter().any(|known| known.eq_ignore_ascii_case(ext)))
    }
}

impl std::fmt::Debug for dyn RecordCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCodec").field("format", &self.format()).finish()
    }
}

/// JSON codec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    /// Compact output
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output
    #[inline]
    #[must_use]
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl RecordCodec for JsonCodec {
    fn format(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }

    fn encode(&self, record: &Value) -> CodecResult<String> {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(record)
        } else {
            serde_json::to_string(record)
        };
        encoded.map_err(|e| CodecError::encode("json", e))
    }

    fn decode(&self, text: &str) -> CodecResult<Value> {
        serde_json::from_str(text).map_err(|e| CodecError::decode("json", e))
    }
}

/// YAML codec
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl RecordCodec for YamlCodec {
    fn format(&self) -> &'static str {
        "yaml"
    }

    fn extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }

    fn encode(&self, record: &Value) -> CodecResult<String> {
        serde_yaml::to_string(record).map_err(|e| CodecError::encode("yaml", e))
    }

    fn decode(&self, text: &str) -> CodecResult<Value> {
        serde_yaml::from_str(text).map_err(|e| CodecError::decode("yaml", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn json_encodes_compact_and_pretty() {
        let record = json!({ "name": "Jon", "age": 3 });
        assert_eq!(JsonCodec::new().encode(&record).unwrap(), r#"{"name":"Jon","age":3}"#);
        assert!(JsonCodec::pretty().encode(&record).unwrap().contains("\n  \"name\""));
    }

    #[test]
    fn json_decode_reports_format() {
        let err = JsonCodec::new().decode("{").unwrap_err();
        assert!(matches!(err, CodecError::Decode { format: "json", .. }));
    }

    #[test]
    fn yaml_round_trips_record() {
        let record = json!({ "name": "Jon", "tags": ["a", "b"], "home": null });
        let text = YamlCodec.encode(&record).unwrap();
        assert_eq!(YamlCodec.decode(&text).unwrap(), record);
    }

    #[test]
    fn can_handle_by_extension() {
        assert!(YamlCodec.can_handle(Path::new("records/person.yml")));
        assert!(YamlCodec.can_handle(Path::new("person.YAML")));
        assert!(!YamlCodec.can_handle(Path::new("person.json")));
        assert!(!JsonCodec::new().can_handle(Path::new("person")));
    }
}
