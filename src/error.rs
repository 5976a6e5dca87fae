//! Error types for attribute mapping
//!
//! `SchemaViolation` is the only error the mapping core surfaces. The
//! narrower `LookupError` and `CoercionFailure` never escape on their own:
//! lookup failures are swallowed by the resolver and coercion failures are
//! promoted to `SchemaViolation::Coercion` only for strict attributes.

use thiserror::Error;

/// Errors raised while authoring a schema or materializing a mapper
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("{schema}: required attribute '{attribute}' has no value")]
    MissingRequired { schema: String, attribute: String },

    #[error("{schema}: attribute '{attribute}' could not be coerced to {expected}: {reason}")]
    Coercion {
        schema: String,
        attribute: String,
        expected: String,
        reason: String,
    },

    #[error("{schema}: attribute '{attribute}' is already defined")]
    DuplicateAttribute { schema: String, attribute: String },

    #[error("{schema}: raw data must be a mapping, got {found}")]
    InvalidInput { schema: String, found: String },
}

impl SchemaViolation {
    /// Name of the attribute involved, if the violation concerns one
    pub fn attribute(&self) -> Option<&str> {
        match self {
            SchemaViolation::MissingRequired { attribute, .. }
            | SchemaViolation::Coercion { attribute, .. }
            | SchemaViolation::DuplicateAttribute { attribute, .. } => Some(attribute),
            SchemaViolation::InvalidInput { .. } => None,
        }
    }
}

/// Failure raised by a computed source lookup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("key '{0}' not present")]
    MissingKey(String),

    #[error("expected a mapping at '{0}'")]
    NotAMapping(String),

    #[error("{0}")]
    Other(String),
}

/// Failure reported by a coercion provider
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot coerce {found} to {expected}: {reason}")]
pub struct CoercionFailure {
    pub expected: String,
    pub found: String,
    pub reason: String,
}

impl CoercionFailure {
    pub fn new(
        expected: impl Into<String>,
        found: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            expected: expected.into(),
            found: found.into(),
            reason: reason.into(),
        }
    }
}

/// Short JSON type name used in error messages
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_messages() {
        let err = SchemaViolation::MissingRequired {
            schema: "Person".to_string(),
            attribute: "id".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Person: required attribute 'id' has no value"
        );
        assert_eq!(err.attribute(), Some("id"));

        let err = SchemaViolation::InvalidInput {
            schema: "Person".to_string(),
            found: "array".to_string(),
        };
        assert_eq!(err.attribute(), None);
    }

    #[test]
    fn test_coercion_failure_display() {
        let failure = CoercionFailure::new("integer", "string", "invalid digit");
        assert_eq!(
            failure.to_string(),
            "cannot coerce string to integer: invalid digit"
        );
    }
}
