//! Field and object shape descriptors
//!
//! Uses JSON Schema as the canonical representation so that any schema the
//! caller already has can be handed to the engine unchanged.

use crate::error::SchemaError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Shape descriptor for a single field
///
/// A thin wrapper over a JSON-Schema fragment. The migration engine treats it
/// as opaque; only the validator looks inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema(Value);

impl FieldSchema {
    /// Any string
    #[inline]
    #[must_use]
    pub fn string() -> Self {
        Self(json!({ "type": "string" }))
    }

    /// Any JSON number
    #[inline]
    #[must_use]
    pub fn number() -> Self {
        Self(json!({ "type": "number" }))
    }

    /// Integral JSON number
    #[inline]
    #[must_use]
    pub fn integer() -> Self {
        Self(json!({ "type": "integer" }))
    }

    /// `true` or `false`
    #[inline]
    #[must_use]
    pub fn boolean() -> Self {
        Self(json!({ "type": "boolean" }))
    }

    /// Accepts every value
    #[inline]
    #[must_use]
    pub fn any() -> Self {
        Self(json!({}))
    }

    /// Homogeneous array of `items`
    #[inline]
    #[must_use]
    pub fn array(items: Self) -> Self {
        Self(json!({ "type": "array", "items": items.0 }))
    }

    /// Nested object
    #[inline]
    #[must_use]
    pub fn object(schema: &ObjectSchema) -> Self {
        Self(schema.to_json_schema())
    }

    /// Wrap an existing JSON-Schema fragment
    #[inline]
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        Self(value)
    }

    /// Same shape, but `null` is also accepted
    #[must_use]
    pub fn nullable(self) -> Self {
        if self.is_nullable() {
            return self;
        }
        Self(json!({ "anyOf": [self.0, { "type": "null" }] }))
    }

    /// Check whether `null` is an accepted value
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        let accepts_null = |schema: &Value| match schema.get("type") {
            Some(Value::String(t)) => t == "null",
            Some(Value::Array(types)) => types.iter().any(|t| t == "null"),
            _ => false,
        };

        if accepts_null(&self.0) {
            return true;
        }
        self.0
            .get("anyOf")
            .and_then(Value::as_array)
            .is_some_and(|variants| variants.iter().any(accepts_null))
    }

    /// Borrow the JSON-Schema fragment
    #[inline]
    #[must_use]
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// Take the JSON-Schema fragment
    #[inline]
    #[must_use]
    pub fn into_json(self) -> Value {
        self.0
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::any()
    }
}

impl From<Value> for FieldSchema {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// How an object schema treats keys it does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectMode {
    /// Unknown keys are tolerated and kept
    #[default]
    Passthrough,
    /// Unknown keys are a validation failure
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
struct Property {
    schema: FieldSchema,
    required: bool,
}

/// Ordered object shape
///
/// # Invariants
/// - Property order is declaration order (kept through `to_json_schema`)
/// - A property name appears at most once; redeclaring replaces it in place
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    properties: IndexMap<String, Property>,
    mode: ObjectMode,
}

impl ObjectSchema {
    /// Empty object shape (`{}`)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, schema: FieldSchema) -> Self {
        self.properties.insert(
            name.into(),
            Property {
                schema,
                required: true,
            },
        );
        self
    }

    /// Add a field that may be absent
    #[must_use]
    pub fn optional_field(mut self, name: impl Into<String>, schema: FieldSchema) -> Self {
        self.properties.insert(
            name.into(),
            Property {
                schema,
                required: false,
            },
        );
        self
    }

    /// Drop a field
    #[must_use]
    pub fn omit(mut self, name: &str) -> Self {
        self.properties.shift_remove(name);
        self
    }

    /// Reject undeclared keys
    #[inline]
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.mode = ObjectMode::Strict;
        self
    }

    /// Tolerate undeclared keys
    #[inline]
    #[must_use]
    pub fn passthrough(&self) -> Self {
        Self {
            properties: self.properties.clone(),
            mode: ObjectMode::Passthrough,
        }
    }

    /// Current unknown-key mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> ObjectMode {
        self.mode
    }

    /// Declared field names, in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Schema of a declared field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.properties.get(name).map(|p| &p.schema)
    }

    /// Check whether a field must be present
    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.properties.get(name).is_some_and(|p| p.required)
    }

    /// Number of declared fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if no fields are declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Render as a JSON-Schema object document
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, property) in &self.properties {
            properties.insert(name.clone(), property.schema.as_json().clone());
            if property.required {
                required.push(Value::String(name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("required".to_string(), Value::Array(required));
        if self.mode == ObjectMode::Strict {
            schema.insert("additionalProperties".to_string(), Value::Bool(false));
        }
        Value::Object(schema)
    }

    /// Read a JSON-Schema object document
    ///
    /// Accepts `type`, `properties`, `required` and `additionalProperties: false`;
    /// other keywords on the root are ignored.
    ///
    /// # Errors
    /// Returns [`SchemaError::NotAnObject`] if the document is not an object schema
    pub fn from_json_schema(value: &Value) -> Result<Self, SchemaError> {
        let Value::Object(root) = value else {
            return Err(SchemaError::NotAnObject(kind_of(value).to_string()));
        };

        match root.get("type") {
            None => {}
            Some(Value::String(t)) if t == "object" => {}
            Some(other) => return Err(SchemaError::NotAnObject(other.to_string())),
        }

        let required: Vec<&str> = root
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut schema = Self::new();
        if let Some(properties) = root.get("properties") {
            let Value::Object(properties) = properties else {
                return Err(SchemaError::InvalidSchema(
                    "\"properties\" must be an object".to_string(),
                ));
            };
            for (name, field) in properties {
                let field = FieldSchema::from_json(field.clone());
                schema = if required.contains(&name.as_str()) {
                    schema.field(name.clone(), field)
                } else {
                    schema.optional_field(name.clone(), field)
                };
            }
        }

        if root.get("additionalProperties") == Some(&Value::Bool(false)) {
            schema = schema.strict();
        }
        Ok(schema)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
