//! Schema registry
//!
//! Loads attribute schemas from YAML documents. A document maps schema
//! names to attribute lists:
//!
//! ```yaml
//! Address:
//!   - name: street
//!     type: string
//! Person:
//!   - name: id
//!     type: integer
//!     from: person_id
//!     required: true
//!     strict: true
//!   - name: home
//!     type: { nested: Address }
//!   - name: city
//!     path: address.city
//!     default: ""
//! ```
//!
//! `nested` must name a schema defined earlier in the same document or
//! already registered.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::MapperConfig;
use crate::resolver::path_lookup;
use crate::schema::{AttributeDefinition, AttributeSchema, AttributeType, SourceKey};

/// One attribute entry of a YAML schema document
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeDoc {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: TypeDoc,
    #[serde(default)]
    pub from: Option<String>,
    /// Dotted path for a computed lookup into nested data
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub strict: Option<bool>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// Declared type as written in YAML
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeDoc {
    Simple(SimpleType),
    List { list: Box<TypeDoc> },
    Nested { nested: String },
}

impl Default for TypeDoc {
    fn default() -> Self {
        TypeDoc::Simple(SimpleType::Any)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimpleType {
    Any,
    String,
    Integer,
    Float,
    Boolean,
}

/// Named schemas loaded from YAML or registered directly
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    config: MapperConfig,
    schemas: IndexMap<String, Arc<AttributeSchema>>,
}

impl SchemaRegistry {
    /// Create an empty registry with default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry using `config` for loaded schemas
    pub fn with_config(config: MapperConfig) -> Self {
        Self {
            config,
            schemas: IndexMap::new(),
        }
    }

    /// Registry populated from `config.schema_dir`, if one is set
    pub fn from_config(config: MapperConfig) -> Result<Self> {
        let mut registry = Self::with_config(config);
        if let Some(dir) = registry.config.schema_dir.clone() {
            registry.load_from_dir(&dir)?;
        }
        Ok(registry)
    }

    /// Config applied to loaded schemas
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Load every `*.yaml`/`*.yml` file below `dir`, in path order.
    /// Unreadable or invalid files are skipped with a warning.
    pub fn load_from_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            warn!("Schema directory does not exist: {:?}", dir);
            return Ok(0);
        }

        let before = self.schemas.len();
        self.load_dir_recursive(dir)?;

        info!("Loaded {} schemas from {:?}", self.schemas.len() - before, dir);
        Ok(self.schemas.len() - before)
    }

    fn load_dir_recursive(&mut self, dir: &Path) -> Result<()> {
        let mut entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read {:?}", dir))?
            .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, file_type) in entries {
            // Symlinked directories are never followed
            if file_type.is_symlink() && path.is_dir() {
                debug!("Skipping symlinked directory {:?}", path);
            } else if file_type.is_dir() {
                self.load_dir_recursive(&path)?;
            } else if path
                .extension()
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false)
            {
                match self.load_file(&path) {
                    Ok(count) => debug!("Loaded {} schemas from {:?}", count, path),
                    Err(e) => warn!("Failed to load schemas from {:?}: {:#}", path, e),
                }
            }
        }

        Ok(())
    }

    /// Load every schema in one YAML file
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        self.load_str(&content)
            .with_context(|| format!("Failed to load {:?}", path))
    }

    /// Parse one YAML document. Either every schema in it is registered or
    /// none is.
    pub fn load_str(&mut self, content: &str) -> Result<usize> {
        let docs: IndexMap<String, Vec<AttributeDoc>> =
            serde_yaml::from_str(content).context("Failed to parse schema document")?;

        let mut staged: IndexMap<String, Arc<AttributeSchema>> = IndexMap::new();
        for (name, attributes) in docs {
            let schema = self
                .build_schema(&name, attributes, &staged)
                .with_context(|| format!("Invalid schema '{}'", name))?;
            staged.insert(name, Arc::new(schema));
        }

        let count = staged.len();
        for (_, schema) in staged {
            self.register_shared(schema);
        }
        Ok(count)
    }

    fn build_schema(
        &self,
        name: &str,
        attributes: Vec<AttributeDoc>,
        staged: &IndexMap<String, Arc<AttributeSchema>>,
    ) -> Result<AttributeSchema> {
        let mut schema = AttributeSchema::new(name);
        for doc in attributes {
            let definition = self.build_definition(doc, staged)?;
            schema.define(definition)?;
        }
        Ok(schema)
    }

    fn build_definition(
        &self,
        doc: AttributeDoc,
        staged: &IndexMap<String, Arc<AttributeSchema>>,
    ) -> Result<AttributeDefinition> {
        let declared_type = self
            .build_type(&doc.ty, staged)
            .with_context(|| format!("Attribute '{}'", doc.name))?;

        let source = match (doc.from, doc.path) {
            (Some(_), Some(_)) => bail!(
                "Attribute '{}' declares both `from` and `path`",
                doc.name
            ),
            (Some(key), None) => SourceKey::Renamed(key),
            (None, Some(path)) => SourceKey::Computed(path_lookup(path)),
            (None, None) => SourceKey::Name,
        };

        let mut definition = AttributeDefinition::new(doc.name, declared_type)
            .source(source)
            .with_required(doc.required)
            .with_strict(doc.strict.unwrap_or(self.config.strict_by_default));

        if let Some(value) = doc.default {
            definition = definition.default(value);
        }

        Ok(definition)
    }

    fn build_type(
        &self,
        doc: &TypeDoc,
        staged: &IndexMap<String, Arc<AttributeSchema>>,
    ) -> Result<AttributeType> {
        Ok(match doc {
            TypeDoc::Simple(SimpleType::Any) => AttributeType::Any,
            TypeDoc::Simple(SimpleType::String) => AttributeType::String,
            TypeDoc::Simple(SimpleType::Integer) => AttributeType::Integer,
            TypeDoc::Simple(SimpleType::Float) => AttributeType::Float,
            TypeDoc::Simple(SimpleType::Boolean) => AttributeType::Boolean,
            TypeDoc::List { list } => AttributeType::list(self.build_type(list, staged)?),
            TypeDoc::Nested { nested } => {
                let schema = staged
                    .get(nested)
                    .or_else(|| self.schemas.get(nested))
                    .with_context(|| format!("Unknown nested schema '{}'", nested))?;
                AttributeType::Nested(Arc::clone(schema))
            }
        })
    }

    /// Register a schema, replacing any schema with the same name
    pub fn register(&mut self, schema: AttributeSchema) {
        self.register_shared(Arc::new(schema));
    }

    fn register_shared(&mut self, schema: Arc<AttributeSchema>) {
        let name = schema.name().to_string();
        if self.schemas.insert(name.clone(), schema).is_some() {
            warn!("Schema '{}' redefined, replacing earlier definition", name);
        }
    }

    /// Get a schema by name
    pub fn get(&self, name: &str) -> Option<Arc<AttributeSchema>> {
        self.schemas.get(name).cloned()
    }

    /// Check if a schema is registered
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Number of registered schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Registered schema names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.schemas.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mapper;
    use serde_json::json;

    const PEOPLE: &str = r#"
Address:
  - name: street
    type: string
  - name: zip
    type: integer
Person:
  - name: id
    type: integer
    from: person_id
    required: true
    strict: true
  - name: last_name
    type: string
    from: surname
  - name: street
    type: string
    path: address.street
    default: ""
  - name: home
    type: { nested: Address }
  - name: tags
    type: { list: string }
"#;

    #[test]
    fn test_load_str() {
        let mut registry = SchemaRegistry::new();
        assert_eq!(registry.load_str(PEOPLE).unwrap(), 2);
        assert_eq!(registry.names(), vec!["Address", "Person"]);

        let person = registry.get("Person").unwrap();
        assert_eq!(person.names(), vec!["id", "last_name", "street", "home", "tags"]);

        let id = person.get("id").unwrap();
        assert!(id.is_required());
        assert!(id.is_strict());
        assert!(matches!(id.source_key(), SourceKey::Renamed(key) if key == "person_id"));
        assert!(matches!(
            person.get("street").unwrap().source_key(),
            SourceKey::Computed(_)
        ));
        assert_eq!(person.get("home").unwrap().declared_type().to_string(), "Address");
        assert_eq!(
            person.get("tags").unwrap().declared_type().to_string(),
            "list<string>"
        );
    }

    #[test]
    fn test_loaded_schema_maps_data() {
        let mut registry = SchemaRegistry::new();
        registry.load_str(PEOPLE).unwrap();
        let person = registry.get("Person").unwrap();

        let mapper = Mapper::from_json(
            &person,
            json!({
                "person_id": "3",
                "surname": "Doe",
                "address": { "street": "Main" },
                "home": { "street": "Elm", "zip": "12345" },
                "tags": [1, "a"],
            }),
        )
        .unwrap();

        assert_eq!(mapper.get("id"), Some(&json!(3)));
        assert_eq!(mapper.get("street"), Some(&json!("Main")));
        assert_eq!(mapper.get("home"), Some(&json!({ "street": "Elm", "zip": 12345 })));
        assert_eq!(mapper.get("tags"), Some(&json!(["1", "a"])));
    }

    #[test]
    fn test_strict_by_default_from_config() {
        let config = MapperConfig::new().with_strict_by_default(true);
        let mut registry = SchemaRegistry::with_config(config);
        registry
            .load_str("Dog:\n  - name: age\n    type: integer\n  - name: name\n    strict: false\n")
            .unwrap();

        let dog = registry.get("Dog").unwrap();
        assert!(dog.get("age").unwrap().is_strict());
        assert!(!dog.get("name").unwrap().is_strict());
    }

    #[test]
    fn test_unknown_nested_schema_rejected() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .load_str("Person:\n  - name: home\n    type: { nested: Address }\n")
            .unwrap_err();

        assert!(format!("{:#}", err).contains("Unknown nested schema 'Address'"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_from_and_path_conflict() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .load_str("Person:\n  - name: street\n    from: road\n    path: address.street\n")
            .unwrap_err();

        assert!(format!("{:#}", err).contains("both `from` and `path`"));
    }

    #[test]
    fn test_duplicate_attribute_rejects_whole_document() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .load_str("Ok:\n  - name: a\nBad:\n  - name: id\n  - name: id\n")
            .unwrap_err();

        assert!(format!("{:#}", err).contains("already defined"));
        assert!(!registry.contains("Ok"));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = SchemaRegistry::new();
        registry.register(AttributeSchema::new("Dog"));
        registry.register(
            AttributeSchema::builder("Dog")
                .field("name", AttributeType::String)
                .build()
                .unwrap(),
        );

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Dog").unwrap().len(), 1);
    }
}
