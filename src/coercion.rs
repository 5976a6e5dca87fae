//! Coercion Provider and Coercion Gate
//!
//! The provider converts a found raw value into its declared type. The gate
//! sits in front of it and decides what happens when nothing was found,
//! when the value is an explicit null, and when coercion fails.

use std::fmt;

use serde_json::{Number, Value};
use tracing::debug;

use crate::error::{json_kind, CoercionFailure, SchemaViolation};
use crate::mapper::materialize_nested;
use crate::resolver::Resolution;
use crate::schema::{AttributeDefinition, AttributeType};

/// Converts raw values into declared types
///
/// Implementations must be deterministic and must report failure through
/// `Err` rather than by returning a placeholder value.
pub trait CoercionProvider: fmt::Debug {
    fn coerce(&self, value: &Value, ty: &AttributeType) -> Result<Value, CoercionFailure>;
}

/// Bundled provider for the primitive, list and nested-schema types
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCoercion;

const TRUTHY: &[&str] = &["1", "true", "t", "yes", "y", "on"];
const FALSY: &[&str] = &["0", "false", "f", "no", "n", "off"];

impl CoercionProvider for StandardCoercion {
    fn coerce(&self, value: &Value, ty: &AttributeType) -> Result<Value, CoercionFailure> {
        let fail = |reason: &str| CoercionFailure::new(ty.to_string(), json_kind(value), reason);

        match ty {
            AttributeType::Any => Ok(value.clone()),
            AttributeType::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(fail("not a scalar")),
            },
            AttributeType::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f.fract() != 0.0 => Err(fail("has a fractional part")),
                    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
                    Some(f) if f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                        Ok(Value::from(f as i64))
                    }
                    _ => Err(fail("out of range for a 64-bit integer")),
                },
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|e| fail(&e.to_string())),
                _ => Err(fail("not a number")),
            },
            AttributeType::Float => match value {
                Value::Number(n) => n
                    .as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| fail("not representable")),
                Value::String(s) => {
                    let parsed = s.trim().parse::<f64>().map_err(|e| fail(&e.to_string()))?;
                    Number::from_f64(parsed)
                        .map(Value::Number)
                        .ok_or_else(|| fail("not a finite number"))
                }
                _ => Err(fail("not a number")),
            },
            AttributeType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f == 1.0 => Ok(Value::Bool(true)),
                    Some(f) if f == 0.0 => Ok(Value::Bool(false)),
                    _ => Err(fail("only 1 and 0 are boolean numbers")),
                },
                Value::String(s) => {
                    let s = s.trim().to_ascii_lowercase();
                    if TRUTHY.contains(&s.as_str()) {
                        Ok(Value::Bool(true))
                    } else if FALSY.contains(&s.as_str()) {
                        Ok(Value::Bool(false))
                    } else {
                        Err(fail("unrecognized boolean text"))
                    }
                }
                _ => Err(fail("not a boolean")),
            },
            AttributeType::List(inner) => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| self.coerce(item, inner))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                _ => Err(fail("not a list")),
            },
            AttributeType::Nested(schema) => match value {
                Value::Object(_) => {
                    materialize_nested(schema, value, self).map_err(|e| fail(&e.to_string()))
                }
                _ => Err(fail("not a mapping")),
            },
        }
    }
}

/// Applies defaults and required/strict rules around a coercion provider
#[derive(Debug, Clone, Copy)]
pub struct CoercionGate<'a> {
    schema: &'a str,
    provider: &'a dyn CoercionProvider,
}

impl<'a> CoercionGate<'a> {
    pub fn new(schema: &'a str, provider: &'a dyn CoercionProvider) -> Self {
        Self { schema, provider }
    }

    pub fn materialize(
        &self,
        definition: &AttributeDefinition,
        resolution: Resolution,
    ) -> Result<Value, SchemaViolation> {
        let value = match resolution {
            Resolution::NotFound if definition.is_required() => {
                return Err(SchemaViolation::MissingRequired {
                    schema: self.schema.to_string(),
                    attribute: definition.name().to_string(),
                });
            }
            Resolution::NotFound => {
                return Ok(definition
                    .default_value()
                    .map(|d| d.produce())
                    .unwrap_or(Value::Null));
            }
            Resolution::Found(Value::Null) => return Ok(Value::Null),
            Resolution::Found(value) => value,
        };

        match self.provider.coerce(&value, definition.declared_type()) {
            Ok(coerced) => Ok(coerced),
            Err(failure) if definition.is_strict() => Err(SchemaViolation::Coercion {
                schema: self.schema.to_string(),
                attribute: definition.name().to_string(),
                expected: failure.expected,
                reason: failure.reason,
            }),
            Err(failure) => {
                debug!(
                    "Passing '{}' through uncoerced: {}",
                    definition.name(),
                    failure
                );
                Ok(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeSchema;
    use serde_json::json;

    fn coerce(value: Value, ty: AttributeType) -> Result<Value, CoercionFailure> {
        StandardCoercion.coerce(&value, &ty)
    }

    #[test]
    fn test_boolean_like_values() {
        for truthy in [json!("1"), json!("true"), json!(" Yes "), json!(1), json!(true)] {
            assert_eq!(coerce(truthy, AttributeType::Boolean), Ok(json!(true)));
        }
        for falsy in [json!("0"), json!("off"), json!("F"), json!(0), json!(false)] {
            assert_eq!(coerce(falsy, AttributeType::Boolean), Ok(json!(false)));
        }
        assert!(coerce(json!("maybe"), AttributeType::Boolean).is_err());
        assert!(coerce(json!(2), AttributeType::Boolean).is_err());
    }

    #[test]
    fn test_integer() {
        assert_eq!(coerce(json!(1), AttributeType::Integer), Ok(json!(1)));
        assert_eq!(coerce(json!(" 42 "), AttributeType::Integer), Ok(json!(42)));
        assert_eq!(coerce(json!(3.0), AttributeType::Integer), Ok(json!(3)));
        assert!(coerce(json!(3.5), AttributeType::Integer).is_err());
        assert!(coerce(json!("abc"), AttributeType::Integer).is_err());
        assert!(coerce(json!(true), AttributeType::Integer).is_err());
    }

    #[test]
    fn test_integer_out_of_range_float() {
        let two_pow_63 = 9_223_372_036_854_775_808.0_f64;
        let err = coerce(json!(two_pow_63), AttributeType::Integer).unwrap_err();
        assert_eq!(err.reason, "out of range for a 64-bit integer");
        assert!(coerce(json!(1e300), AttributeType::Integer).is_err());

        assert_eq!(
            coerce(json!(-9_223_372_036_854_775_808.0_f64), AttributeType::Integer),
            Ok(json!(i64::MIN))
        );
        assert_eq!(
            coerce(json!(4_611_686_018_427_387_904.0_f64), AttributeType::Integer),
            Ok(json!(4_611_686_018_427_387_904_i64))
        );

        let strict = AttributeDefinition::new("id", AttributeType::Integer).strict();
        let gate = CoercionGate::new("Person", &StandardCoercion);
        assert!(gate
            .materialize(&strict, Resolution::Found(json!(two_pow_63)))
            .is_err());
    }

    #[test]
    fn test_float_and_string() {
        assert_eq!(coerce(json!("2.5"), AttributeType::Float), Ok(json!(2.5)));
        assert_eq!(coerce(json!(2), AttributeType::Float), Ok(json!(2.0)));
        assert!(coerce(json!("NaN"), AttributeType::Float).is_err());

        assert_eq!(coerce(json!(100), AttributeType::String), Ok(json!("100")));
        assert_eq!(coerce(json!(false), AttributeType::String), Ok(json!("false")));
        assert!(coerce(json!({"a": 1}), AttributeType::String).is_err());
    }

    #[test]
    fn test_list() {
        let ty = AttributeType::list(AttributeType::Integer);
        assert_eq!(coerce(json!(["1", 2]), ty.clone()), Ok(json!([1, 2])));
        assert!(coerce(json!(["1", "x"]), ty.clone()).is_err());
        assert!(coerce(json!("1"), ty).is_err());
    }

    #[test]
    fn test_nested_schema() {
        let address = AttributeSchema::builder("Address")
            .field("street", AttributeType::String)
            .field("number", AttributeType::Integer)
            .build()
            .unwrap();
        let ty = AttributeType::nested(address);

        let coerced = coerce(json!({ ":street": "Main", "number": "12", "extra": 1 }), ty.clone());
        assert_eq!(coerced, Ok(json!({ "street": "Main", "number": 12 })));
        assert!(coerce(json!("Main"), ty).is_err());
    }

    #[test]
    fn test_gate_defaults_and_absence() {
        let gate = CoercionGate::new("Dog", &StandardCoercion);

        let with_default = AttributeDefinition::new("name", AttributeType::String).default("Spot");
        assert_eq!(
            gate.materialize(&with_default, Resolution::NotFound),
            Ok(json!("Spot"))
        );
        assert_eq!(
            gate.materialize(&with_default, Resolution::Found(Value::Null)),
            Ok(Value::Null)
        );

        let plain = AttributeDefinition::new("age", AttributeType::Integer);
        assert_eq!(gate.materialize(&plain, Resolution::NotFound), Ok(Value::Null));
    }

    #[test]
    fn test_gate_required() {
        let gate = CoercionGate::new("Person", &StandardCoercion);
        let def = AttributeDefinition::new("id", AttributeType::Integer)
            .required()
            .default(0);

        assert_eq!(
            gate.materialize(&def, Resolution::NotFound),
            Err(SchemaViolation::MissingRequired {
                schema: "Person".to_string(),
                attribute: "id".to_string(),
            })
        );
    }

    #[test]
    fn test_gate_strict_and_lenient() {
        let gate = CoercionGate::new("Person", &StandardCoercion);

        let strict = AttributeDefinition::new("id", AttributeType::Integer).strict();
        let err = gate
            .materialize(&strict, Resolution::Found(json!("abc")))
            .unwrap_err();
        assert!(matches!(err, SchemaViolation::Coercion { ref expected, .. } if expected == "integer"));

        let lenient = AttributeDefinition::new("id", AttributeType::Integer);
        assert_eq!(
            gate.materialize(&lenient, Resolution::Found(json!("abc"))),
            Ok(json!("abc"))
        );
        assert_eq!(
            gate.materialize(&strict, Resolution::Found(json!("7"))),
            Ok(json!(7))
        );
    }
}
