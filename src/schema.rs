//! Attribute schemas and per-instance attribute sets
//!
//! An `AttributeSchema` is authored once and then shared read-only by every
//! mapper built from it. Each mapper works on an `InstanceAttributeSet`, an
//! independent ordered index over the same `Arc<AttributeDefinition>`s, so
//! extending one instance never touches the schema or any other instance.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{LookupError, SchemaViolation};
use crate::store::RawData;

/// Computed source lookup, invoked with the entire raw mapping
pub type Lookup = Arc<dyn Fn(&RawData) -> Result<Value, LookupError> + Send + Sync>;

/// Default value producer
pub type Producer = Arc<dyn Fn() -> Value + Send + Sync>;

/// Coercion target of an attribute
#[derive(Debug, Clone, Default)]
pub enum AttributeType {
    /// Raw value is kept as-is
    #[default]
    Any,
    String,
    Integer,
    Float,
    Boolean,
    List(Box<AttributeType>),
    /// Object materialized through another schema
    Nested(Arc<AttributeSchema>),
}

impl AttributeType {
    /// List of `inner`
    pub fn list(inner: AttributeType) -> Self {
        AttributeType::List(Box::new(inner))
    }

    /// Object materialized through `schema`
    pub fn nested(schema: impl Into<Arc<AttributeSchema>>) -> Self {
        AttributeType::Nested(schema.into())
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Any => write!(f, "any"),
            AttributeType::String => write!(f, "string"),
            AttributeType::Integer => write!(f, "integer"),
            AttributeType::Float => write!(f, "float"),
            AttributeType::Boolean => write!(f, "boolean"),
            AttributeType::List(inner) => write!(f, "list<{}>", inner),
            AttributeType::Nested(schema) => write!(f, "{}", schema.name()),
        }
    }
}

/// Where an attribute's raw value comes from
#[derive(Clone, Default)]
pub enum SourceKey {
    /// The attribute's own name
    #[default]
    Name,
    /// A differently named key in the raw data
    Renamed(String),
    /// Arbitrary lookup over the whole raw mapping
    Computed(Lookup),
}

impl fmt::Debug for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKey::Name => write!(f, "Name"),
            SourceKey::Renamed(key) => f.debug_tuple("Renamed").field(key).finish(),
            SourceKey::Computed(_) => write!(f, "Computed(<fn>)"),
        }
    }
}

/// Value used when nothing is found for an attribute
#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    Producer(Producer),
}

impl DefaultValue {
    /// Yield the default value, invoking the producer if there is one
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Producer(producer) => producer(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultValue::Producer(_) => write!(f, "Producer(<fn>)"),
        }
    }
}

/// Immutable descriptor of one named, typed attribute
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    name: String,
    declared_type: AttributeType,
    source: SourceKey,
    required: bool,
    strict: bool,
    default: Option<DefaultValue>,
}

impl AttributeDefinition {
    /// Create a definition read from its own name, optional and lenient
    pub fn new(name: impl Into<String>, declared_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            declared_type,
            source: SourceKey::Name,
            required: false,
            strict: false,
            default: None,
        }
    }

    /// Read the value from a renamed key
    pub fn from(mut self, key: impl Into<String>) -> Self {
        self.source = SourceKey::Renamed(key.into());
        self
    }

    /// Compute the value from the whole raw mapping
    pub fn lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&RawData) -> Result<Value, LookupError> + Send + Sync + 'static,
    {
        self.source = SourceKey::Computed(Arc::new(lookup));
        self
    }

    /// Set the source key directly
    pub fn source(mut self, source: SourceKey) -> Self {
        self.source = source;
        self
    }

    /// Fail construction when nothing is found
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Fail construction when coercion fails
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Set the required flag
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Set the strict flag
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Static value used when nothing is found
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Producer invoked each time nothing is found
    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Producer(Arc::new(producer)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coercion target
    pub fn declared_type(&self) -> &AttributeType {
        &self.declared_type
    }

    /// Where the raw value comes from
    pub fn source_key(&self) -> &SourceKey {
        &self.source
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Default applied when nothing is found, if any
    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }
}

/// Shared, ordered set of attribute definitions keyed by name
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    name: String,
    definitions: IndexMap<String, Arc<AttributeDefinition>>,
}

impl AttributeSchema {
    /// Create an empty schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definitions: IndexMap::new(),
        }
    }

    /// Start a fluent schema declaration
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Append a definition; a name already present is a violation
    pub fn define(&mut self, definition: AttributeDefinition) -> Result<(), SchemaViolation> {
        if self.definitions.contains_key(definition.name()) {
            return Err(SchemaViolation::DuplicateAttribute {
                schema: self.name.clone(),
                attribute: definition.name().to_string(),
            });
        }
        self.definitions
            .insert(definition.name().to_string(), Arc::new(definition));
        Ok(())
    }

    /// Add every definition of `other` to this schema. Nothing is added if
    /// any name collides.
    pub fn extend(&mut self, other: &AttributeSchema) -> Result<(), SchemaViolation> {
        if let Some(name) = other
            .definitions
            .keys()
            .find(|name| self.definitions.contains_key(*name))
        {
            return Err(SchemaViolation::DuplicateAttribute {
                schema: self.name.clone(),
                attribute: name.clone(),
            });
        }
        for (name, definition) in &other.definitions {
            self.definitions.insert(name.clone(), Arc::clone(definition));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Get a definition by name
    pub fn get(&self, name: &str) -> Option<&AttributeDefinition> {
        self.definitions.get(name).map(|d| d.as_ref())
    }

    /// Check if a definition exists
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Definition names in order
    pub fn names(&self) -> Vec<&str> {
        self.definitions.keys().map(|s| s.as_str()).collect()
    }

    /// Iterate over definitions in order
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDefinition> + '_ {
        self.definitions.values().map(|d| d.as_ref())
    }

    /// Shared handles to the definitions, in declaration order
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<AttributeDefinition>> + '_ {
        self.definitions.values()
    }

    /// Independent copy of the ordered definition index
    pub fn instance_set(&self) -> InstanceAttributeSet {
        InstanceAttributeSet {
            definitions: self.definitions.clone(),
        }
    }
}

/// Fluent authoring surface for schemas
///
/// Duplicate names are reported by `build`, so a schema can be declared in
/// one expression.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    definitions: Vec<AttributeDefinition>,
}

impl SchemaBuilder {
    /// Create an empty builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definitions: Vec::new(),
        }
    }

    /// Add a definition
    pub fn attribute(mut self, definition: AttributeDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Shorthand for an attribute read from its own name
    pub fn field(self, name: impl Into<String>, declared_type: AttributeType) -> Self {
        self.attribute(AttributeDefinition::new(name, declared_type))
    }

    /// Build the schema, rejecting duplicate names
    pub fn build(self) -> Result<AttributeSchema, SchemaViolation> {
        let mut schema = AttributeSchema::new(self.name);
        for definition in self.definitions {
            schema.define(definition)?;
        }
        Ok(schema)
    }
}

/// Per-instance ordered copy of a schema's definitions
#[derive(Debug, Clone, Default)]
pub struct InstanceAttributeSet {
    definitions: IndexMap<String, Arc<AttributeDefinition>>,
}

impl InstanceAttributeSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append definitions in order. A name already present is replaced in
    /// place and keeps its position. Returns the appended or replaced
    /// definitions.
    pub fn append<I>(&mut self, definitions: I) -> Vec<Arc<AttributeDefinition>>
    where
        I: IntoIterator<Item = Arc<AttributeDefinition>>,
    {
        let mut touched = Vec::new();
        for definition in definitions {
            self.definitions
                .insert(definition.name().to_string(), Arc::clone(&definition));
            touched.push(definition);
        }
        touched
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Get a definition by name
    pub fn get(&self, name: &str) -> Option<&AttributeDefinition> {
        self.definitions.get(name).map(|d| d.as_ref())
    }

    /// Check if a definition exists
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Definition names in order
    pub fn names(&self) -> Vec<&str> {
        self.definitions.keys().map(|s| s.as_str()).collect()
    }

    /// Iterate over definitions in order
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDefinition> + '_ {
        self.definitions.values().map(|d| d.as_ref())
    }

    pub(crate) fn definitions(&self) -> impl Iterator<Item = &Arc<AttributeDefinition>> + '_ {
        self.definitions.values()
    }
}
