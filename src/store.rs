//! Indifferent Key Store
//!
//! Raw input may name the same logical key textually (`first_name`) or
//! symbolically (`:first_name`). Every key is canonicalized to its textual
//! form when it enters the store, so lookups never care which form was used.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

/// Raw input data as supplied by the caller, kept in insertion order
pub type RawData = Map<String, Value>;

/// How a key was written in the raw data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyForm {
    Text,
    Symbol,
}

/// A key together with the form it was written in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrKey {
    name: String,
    form: KeyForm,
}

impl AttrKey {
    /// Key written in text form
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            form: KeyForm::Text,
        }
    }

    /// Key written in symbolic form
    pub fn symbol(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            form: KeyForm::Symbol,
        }
    }

    /// Parse a raw key, treating a leading `:` as the symbolic marker
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(':') {
            Some(name) => Self::symbol(name),
            None => Self::text(raw),
        }
    }

    /// The logical key, independent of form
    pub fn canonical(&self) -> &str {
        &self.name
    }

    pub fn form(&self) -> KeyForm {
        self.form
    }
}

impl fmt::Display for AttrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.form {
            KeyForm::Text => write!(f, "{}", self.name),
            KeyForm::Symbol => write!(f, ":{}", self.name),
        }
    }
}

impl From<&str> for AttrKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// Canonical (textual) form of a raw key
pub fn canonical_key(raw: &str) -> &str {
    raw.strip_prefix(':').unwrap_or(raw)
}

/// Lookup table over raw data that ignores textual/symbolic key form
#[derive(Debug, Clone, Default)]
pub struct IndifferentStore {
    entries: HashMap<String, Value>,
}

impl IndifferentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw data; later entries win over earlier entries
    /// naming the same logical key
    pub fn from_raw(raw: &RawData) -> Self {
        let mut store = Self::new();
        store.merge(raw);
        store
    }

    /// Insert a single entry under its canonical key
    pub fn insert(&mut self, key: impl Into<AttrKey>, value: Value) {
        let key = key.into();
        self.entries.insert(key.canonical().to_string(), value);
    }

    /// `None` means not found; a stored `null` comes back as `Some(Value::Null)`
    pub fn lookup(&self, key: impl Into<AttrKey>) -> Option<&Value> {
        let key = key.into();
        self.entries.get(key.canonical())
    }

    /// Check if a logical key is present in either form
    pub fn contains(&self, key: impl Into<AttrKey>) -> bool {
        self.lookup(key).is_some()
    }

    /// Overlay another mapping; its entries win on conflict
    pub fn merge(&mut self, other: &RawData) {
        for (key, value) in other {
            self.entries
                .insert(canonical_key(key).to_string(), value.clone());
        }
    }

    /// Number of logical keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merge `extra` into stored raw data. For every extra key, stored entries
/// naming the same logical key in either form are dropped before the extra
/// entry is inserted.
pub(crate) fn merge_raw(raw: &mut RawData, extra: &RawData) {
    for (key, value) in extra {
        let canonical = canonical_key(key);
        raw.retain(|existing, _| canonical_key(existing) != canonical);
        raw.insert(key.clone(), value.clone());
    }
}
