//! Key Resolver
//!
//! Picks the raw value for one attribute. Precedence, highest first:
//! computed lookup, renamed key, the attribute's own name.

use serde_json::Value;
use tracing::debug;

use crate::error::LookupError;
use crate::schema::{AttributeDefinition, Lookup, SourceKey};
use crate::store::{canonical_key, IndifferentStore, RawData};

/// Outcome of resolving one attribute against raw data
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(Value),
    NotFound,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Resolution::Found(value) => Some(value),
            Resolution::NotFound => None,
        }
    }
}

/// Resolves attribute values from one snapshot of raw data
#[derive(Debug, Clone, Copy)]
pub struct KeyResolver<'a> {
    store: &'a IndifferentStore,
    raw: &'a RawData,
}

impl<'a> KeyResolver<'a> {
    pub fn new(store: &'a IndifferentStore, raw: &'a RawData) -> Self {
        Self { store, raw }
    }

    pub fn resolve(&self, definition: &AttributeDefinition) -> Resolution {
        match definition.source_key() {
            SourceKey::Computed(lookup) => match lookup(self.raw) {
                Ok(value) => Resolution::Found(value),
                Err(e) => {
                    debug!(
                        "Computed lookup for '{}' failed, treating as not found: {}",
                        definition.name(),
                        e
                    );
                    Resolution::NotFound
                }
            },
            SourceKey::Renamed(key) => match self.store.lookup(key.as_str()) {
                Some(value) => Resolution::Found(value.clone()),
                None => self.by_name(definition),
            },
            SourceKey::Name => self.by_name(definition),
        }
    }

    fn by_name(&self, definition: &AttributeDefinition) -> Resolution {
        match self.store.lookup(definition.name()) {
            Some(value) => Resolution::Found(value.clone()),
            None => Resolution::NotFound,
        }
    }
}

/// Computed lookup that digs through nested mappings along a dotted path,
/// e.g. `address.street`. Each segment matches textual or symbolic keys.
pub fn path_lookup(path: impl Into<String>) -> Lookup {
    let path = path.into();
    std::sync::Arc::new(move |raw: &RawData| dig(raw, &path))
}

fn dig(raw: &RawData, path: &str) -> Result<Value, LookupError> {
    let mut segments = path.split('.');
    let first = segments.next().unwrap_or_default();
    let mut current = find_indifferent(raw, first)
        .ok_or_else(|| LookupError::MissingKey(first.to_string()))?;

    let mut walked = first.to_string();
    for segment in segments {
        let map = current
            .as_object()
            .ok_or_else(|| LookupError::NotAMapping(walked.clone()))?;
        walked.push('.');
        walked.push_str(segment);
        current = find_indifferent(map, segment)
            .ok_or_else(|| LookupError::MissingKey(walked.clone()))?;
    }

    Ok(current.clone())
}

/// Last entry in `map` naming `key` in either form
fn find_indifferent<'m>(map: &'m RawData, key: &str) -> Option<&'m Value> {
    let key = canonical_key(key);
    map.iter()
        .filter(|(k, _)| canonical_key(k) == key)
        .map(|(_, v)| v)
        .last()
}
