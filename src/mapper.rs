//! Mapper Instance
//!
//! A `Mapper` is built from a schema and raw data. Construction clones the
//! schema's definitions into an instance-owned set, then resolves, coerces
//! and stores every attribute in declaration order. `add_attributes` runs
//! the same pipeline for another schema's definitions against the stored raw
//! data merged with any newly supplied data, affecting only this instance.

use std::iter;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::coercion::{CoercionGate, CoercionProvider, StandardCoercion};
use crate::error::{json_kind, SchemaViolation};
use crate::resolver::KeyResolver;
use crate::schema::{AttributeDefinition, AttributeSchema, InstanceAttributeSet};
use crate::store::{merge_raw, IndifferentStore, RawData};

/// Typed view over raw data, shaped by an attribute schema
#[derive(Debug, Clone)]
pub struct Mapper {
    schema_name: String,
    attributes: InstanceAttributeSet,
    raw: RawData,
    store: IndifferentStore,
    values: IndexMap<String, Value>,
    provider: Arc<dyn CoercionProvider>,
}

impl Mapper {
    /// Build a mapper with the standard coercion provider. `None` raw data
    /// behaves like an empty mapping.
    pub fn new(schema: &AttributeSchema, raw: Option<RawData>) -> Result<Self, SchemaViolation> {
        Self::with_provider(schema, raw, Arc::new(StandardCoercion))
    }

    /// Build a mapper from a JSON value, which must be an object or null
    pub fn from_json(schema: &AttributeSchema, raw: Value) -> Result<Self, SchemaViolation> {
        Self::new(schema, into_raw(schema, raw)?)
    }

    /// Build a mapper that coerces through `provider`, also for later extensions
    pub fn with_provider(
        schema: &AttributeSchema,
        raw: Option<RawData>,
        provider: Arc<dyn CoercionProvider>,
    ) -> Result<Self, SchemaViolation> {
        let raw = raw.unwrap_or_default();
        let store = IndifferentStore::from_raw(&raw);
        let attributes = schema.instance_set();

        debug!(
            "Materializing {} ({} attributes, {} raw keys)",
            schema.name(),
            attributes.len(),
            raw.len()
        );

        let mut values = IndexMap::with_capacity(attributes.len());
        materialize_into(
            schema.name(),
            attributes.definitions(),
            &store,
            &raw,
            provider.as_ref(),
            &mut values,
        )?;

        Ok(Self {
            schema_name: schema.name().to_string(),
            attributes,
            raw,
            store,
            values,
            provider,
        })
    }

    /// Extend this instance with another schema's attributes.
    ///
    /// `extra` is merged into the stored raw data first and wins on key
    /// conflicts. Only the added (or replaced) attributes are resolved. Each
    /// definition joins the attribute set together with its value, so on
    /// failure the attributes resolved before the failing one are kept and
    /// the failing and later ones are left out (a replaced definition stays
    /// as it was).
    pub fn add_attributes(
        &mut self,
        source: &AttributeSchema,
        extra: Option<RawData>,
    ) -> Result<(), SchemaViolation> {
        if let Some(extra) = extra {
            merge_raw(&mut self.raw, &extra);
            self.store.merge(&extra);
        }

        debug!(
            "Adding {} attributes from {} to {}",
            source.len(),
            source.name(),
            self.schema_name
        );

        let resolver = KeyResolver::new(&self.store, &self.raw);
        let gate = CoercionGate::new(&self.schema_name, self.provider.as_ref());

        for definition in source.definitions() {
            let value = materialize_one(&gate, &resolver, &self.schema_name, definition)?;
            self.attributes.append(iter::once(Arc::clone(definition)));
            self.values.insert(definition.name().to_string(), value);
        }

        Ok(())
    }

    /// Name of the schema this instance was built from
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// This instance's attribute definitions, in order
    pub fn attribute_set(&self) -> &InstanceAttributeSet {
        &self.attributes
    }

    /// Raw data as supplied, including keys no attribute maps
    pub fn raw_attributes(&self) -> &RawData {
        &self.raw
    }

    /// Typed value of an attribute. `None` if the attribute is not part of
    /// this instance, `Some(Value::Null)` if it has no value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Check if the attribute is part of this instance
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    /// Typed values in attribute order
    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Typed values as a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Deserialize the typed attributes into a caller-defined struct
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.to_json())
    }
}

fn into_raw(schema: &AttributeSchema, raw: Value) -> Result<Option<RawData>, SchemaViolation> {
    match raw {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        other => Err(SchemaViolation::InvalidInput {
            schema: schema.name().to_string(),
            found: json_kind(&other).to_string(),
        }),
    }
}

fn materialize_into<'d, I>(
    schema_name: &str,
    definitions: I,
    store: &IndifferentStore,
    raw: &RawData,
    provider: &dyn CoercionProvider,
    values: &mut IndexMap<String, Value>,
) -> Result<(), SchemaViolation>
where
    I: Iterator<Item = &'d Arc<AttributeDefinition>>,
{
    let resolver = KeyResolver::new(store, raw);
    let gate = CoercionGate::new(schema_name, provider);

    for definition in definitions {
        let value = materialize_one(&gate, &resolver, schema_name, definition)?;
        values.insert(definition.name().to_string(), value);
    }

    Ok(())
}

fn materialize_one(
    gate: &CoercionGate<'_>,
    resolver: &KeyResolver<'_>,
    schema_name: &str,
    definition: &AttributeDefinition,
) -> Result<Value, SchemaViolation> {
    let resolution = resolver.resolve(definition);
    trace!(
        "{}.{} resolved: found={}",
        schema_name,
        definition.name(),
        resolution.is_found()
    );
    gate.materialize(definition, resolution)
}

/// Materialize a nested object through `schema`, returning its typed
/// attributes as a JSON object
pub(crate) fn materialize_nested(
    schema: &AttributeSchema,
    raw: &Value,
    provider: &dyn CoercionProvider,
) -> Result<Value, SchemaViolation> {
    let raw = into_raw(schema, raw.clone())?.unwrap_or_default();
    let store = IndifferentStore::from_raw(&raw);
    let mut values = IndexMap::with_capacity(schema.len());

    materialize_into(
        schema.name(),
        schema.definitions(),
        &store,
        &raw,
        provider,
        &mut values,
    )?;

    Ok(Value::Object(values.into_iter().collect::<Map<_, _>>()))
}
