//! reshape schema collaborator
//!
//! Shape descriptors handed to the migration engine when a field is declared,
//! and the validation pass run after a record has been migrated.
//!
//! # Core Concepts
//!
//! - [`FieldSchema`]: JSON-Schema fragment describing one field
//! - [`ObjectSchema`]: ordered set of named fields with required/optional flags
//! - [`PassthroughValidator`]: compiled validator that tolerates unknown keys
//!
//! # Example
//!
//! ```rust
//! use reshape_schema::{FieldSchema, ObjectSchema, PassthroughValidator};
//! use serde_json::json;
//!
//! let person = ObjectSchema::new()
//!     .field("name", FieldSchema::string())
//!     .field("age", FieldSchema::number());
//!
//! let validator = PassthroughValidator::compile(&person).unwrap();
//! assert!(validator.is_valid(&json!({"name": "Jon", "age": 3, "extra": true})));
//! assert!(!validator.is_valid(&json!({"name": "Jon"})));
//! ```

#![warn(unreachable_pub)]

mod error;
mod schema;
mod validator;

pub use error::{SchemaError, Violation};
pub use schema::{FieldSchema, ObjectMode, ObjectSchema};
pub use validator::PassthroughValidator;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
