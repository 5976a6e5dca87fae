//! attr_mapper - schema-driven attribute mapping and coercion
//!
//! Raw keyed data goes in (string or `:symbol` keys, nested objects,
//! mismatched names); a typed attribute set comes out, with every value
//! renamed, defaulted, coerced and validated by rules declared once on a
//! shared `AttributeSchema`.
//!
//! ## Pipeline
//! For each attribute, in declaration order:
//! Key Resolver -> Coercion Gate -> stored typed value
//!
//! ## Quick Start
//!
//! ```rust
//! use attr_mapper::{AttributeDefinition, AttributeSchema, AttributeType, Mapper};
//! use serde_json::json;
//!
//! let person = AttributeSchema::builder("Person")
//!     .attribute(
//!         AttributeDefinition::new("id", AttributeType::Integer)
//!             .from("person_id")
//!             .required()
//!             .strict(),
//!     )
//!     .attribute(AttributeDefinition::new("last_name", AttributeType::String).from("surname"))
//!     .build()
//!     .unwrap();
//!
//! let mapper = Mapper::from_json(&person, json!({ "person_id": "1", ":surname": "Doe" })).unwrap();
//! assert_eq!(mapper.get("id"), Some(&json!(1)));
//! assert_eq!(mapper.get("last_name"), Some(&json!("Doe")));
//! ```

// Core error handling
pub mod error;

// Mapping engine, leaves first
pub mod store;
pub mod resolver;
pub mod coercion;
pub mod schema;
pub mod mapper;

// Configuration and YAML schema loading
pub mod config;
pub mod registry;

pub use coercion::{CoercionGate, CoercionProvider, StandardCoercion};
pub use config::MapperConfig;
pub use error::{CoercionFailure, LookupError, SchemaViolation};
pub use mapper::Mapper;
pub use registry::SchemaRegistry;
pub use resolver::{path_lookup, KeyResolver, Resolution};
pub use schema::{
    AttributeDefinition, AttributeSchema, AttributeType, DefaultValue, InstanceAttributeSet,
    SchemaBuilder, SourceKey,
};
pub use store::{AttrKey, IndifferentStore, KeyForm, RawData};
