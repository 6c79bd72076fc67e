//! Conversion between domain types and the JSON value tree.
//!
//! Every type that crosses a file boundary implements [`ToValue`] and
//! [`FromValue`] by hand. Decoding borrows the input so that union-shaped
//! values can try multiple candidates without cloning.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("expected {expected} for {field}, found {found}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("missing field {field}")]
    MissingField { field: &'static str },
    #[error("object key {key:?} is not a valid {expected}")]
    InvalidKey { key: String, expected: &'static str },
    #[error("unrecognized {what} token: {token:?}")]
    UnknownToken { what: &'static str, token: String },
    #[error("value shaped as {found} matches no form of {union}")]
    AmbiguousUnion {
        union: &'static str,
        found: &'static str,
    },
    #[error("number {value} cannot be represented in json")]
    NonFinite { value: f64 },
}

impl CodecError {
    /// Attach a field name to an error raised by a bare value decoder.
    /// Errors that already name a deeper field are left alone.
    fn named(self, name: &'static str) -> CodecError {
        match self {
            CodecError::TypeMismatch {
                field: "",
                expected,
                found,
            } => CodecError::TypeMismatch {
                field: name,
                expected,
                found,
            },
            other => other,
        }
    }
}

/// Short description of a JSON value's shape, for error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub trait ToValue {
    fn to_value(&self) -> Result<Value, CodecError>;
}

pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, CodecError>;
}

/// Map keys are always JSON strings; these traits carry the coercion in
/// both directions so numeric-keyed maps survive a round trip.
pub trait ToValueKey {
    fn to_key(&self) -> String;
}

pub trait FromValueKey: Sized {
    fn from_key(key: &str) -> Result<Self, CodecError>;
}

// ------------------------------------------------------------------------
// Decoding helpers shared by the hand-written record impls
// ------------------------------------------------------------------------

pub fn expect_object(value: &Value) -> Result<&Map<String, Value>, CodecError> {
    value.as_object().ok_or(CodecError::TypeMismatch {
        field: "",
        expected: "object",
        found: value_kind(value),
    })
}

pub fn expect_array(value: &Value) -> Result<&Vec<Value>, CodecError> {
    value.as_array().ok_or(CodecError::TypeMismatch {
        field: "",
        expected: "array",
        found: value_kind(value),
    })
}

pub fn expect_str(value: &Value) -> Result<&str, CodecError> {
    value.as_str().ok_or(CodecError::TypeMismatch {
        field: "",
        expected: "string",
        found: value_kind(value),
    })
}

/// Decode a required field of an object.
pub fn field<T: FromValue>(obj: &Map<String, Value>, name: &'static str) -> Result<T, CodecError> {
    match obj.get(name) {
        Some(value) => T::from_value(value).map_err(|e| e.named(name)),
        None => Err(CodecError::MissingField { field: name }),
    }
}

/// Decode an optional field. Absent and `null` both map to `None`, so
/// types with defaults can fall back without special cases.
pub fn opt_field<T: FromValue>(
    obj: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<T>, CodecError> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::from_value(value).map(Some).map_err(|e| e.named(name)),
    }
}

// ------------------------------------------------------------------------
// Primitive impls
// ------------------------------------------------------------------------

impl ToValue for String {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::String(self.clone()))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        expect_str(value).map(str::to_owned)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::Bool(*self))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        value.as_bool().ok_or(CodecError::TypeMismatch {
            field: "",
            expected: "bool",
            found: value_kind(value),
        })
    }
}

impl ToValue for i64 {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::from(*self))
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        value.as_i64().ok_or(CodecError::TypeMismatch {
            field: "",
            expected: "integer",
            found: value_kind(value),
        })
    }
}

impl ToValue for u32 {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::from(*self))
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(CodecError::TypeMismatch {
                field: "",
                expected: "u32",
                found: value_kind(value),
            })
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Result<Value, CodecError> {
        serde_json::Number::from_f64(*self)
            .map(Value::Number)
            .ok_or(CodecError::NonFinite { value: *self })
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        value.as_f64().ok_or(CodecError::TypeMismatch {
            field: "",
            expected: "number",
            found: value_kind(value),
        })
    }
}

// ------------------------------------------------------------------------
// Containers
// ------------------------------------------------------------------------

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Result<Value, CodecError> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(Value::Null),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Result<Value, CodecError> {
        let items = self
            .iter()
            .map(ToValue::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(items))
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        expect_array(value)?.iter().map(T::from_value).collect()
    }
}

impl<T: ToValue + Ord> ToValue for std::collections::BTreeSet<T> {
    fn to_value(&self) -> Result<Value, CodecError> {
        let items = self
            .iter()
            .map(ToValue::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(items))
    }
}

impl<T: FromValue + Ord> FromValue for std::collections::BTreeSet<T> {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        expect_array(value)?.iter().map(T::from_value).collect()
    }
}

impl<K: ToValueKey, V: ToValue> ToValue for std::collections::BTreeMap<K, V> {
    fn to_value(&self) -> Result<Value, CodecError> {
        let mut obj = Map::new();
        for (key, value) in self {
            obj.insert(key.to_key(), value.to_value()?);
        }
        Ok(Value::Object(obj))
    }
}

impl<K: FromValueKey + Ord, V: FromValue> FromValue for std::collections::BTreeMap<K, V> {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        expect_object(value)?
            .iter()
            .map(|(key, value)| Ok((K::from_key(key)?, V::from_value(value)?)))
            .collect()
    }
}

impl ToValueKey for String {
    fn to_key(&self) -> String {
        self.clone()
    }
}

impl FromValueKey for String {
    fn from_key(key: &str) -> Result<Self, CodecError> {
        Ok(key.to_owned())
    }
}

impl ToValueKey for u32 {
    fn to_key(&self) -> String {
        self.to_string()
    }
}

impl FromValueKey for u32 {
    fn from_key(key: &str) -> Result<Self, CodecError> {
        key.parse().map_err(|_| CodecError::InvalidKey {
            key: key.to_owned(),
            expected: "u32",
        })
    }
}

// ------------------------------------------------------------------------
// Unions
// ------------------------------------------------------------------------

/// A value that appears in the source data either bare or as a list.
/// Decoding discriminates on the array shape, so `T`'s own encoding must
/// never be an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item).iter(),
            OneOrMany::Many(items) => items.iter(),
        }
    }
}

impl<T: ToValue> ToValue for OneOrMany<T> {
    fn to_value(&self) -> Result<Value, CodecError> {
        match self {
            OneOrMany::One(item) => item.to_value(),
            OneOrMany::Many(items) => items.to_value(),
        }
    }
}

impl<T: FromValue> FromValue for OneOrMany<T> {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        if value.is_array() {
            Vec::from_value(value).map(OneOrMany::Many)
        } else {
            T::from_value(value).map(OneOrMany::One)
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::{BTreeMap, BTreeSet};

    use serde_json::json;

    use super::*;

    fn round_trip<T: ToValue + FromValue + PartialEq + std::fmt::Debug>(input: T) {
        let encoded = input.to_value().unwrap();
        let decoded = T::from_value(&encoded).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn primitives_round_trip() {
        round_trip(String::from("Rosy Edge"));
        round_trip(42i64);
        round_trip(7u32);
        round_trip(1.25f64);
        round_trip(true);
    }

    #[test]
    fn containers_round_trip() {
        round_trip(vec![1i64, 2, 3]);
        round_trip(BTreeSet::from([String::from("a"), String::from("b")]));
        round_trip(Some(String::from("x")));
        round_trip(Option::<String>::None);
    }

    #[test]
    fn numeric_map_keys_round_trip() {
        let tiers: BTreeMap<u32, String> =
            BTreeMap::from([(1, String::from("first")), (15, String::from("last"))]);
        let encoded = tiers.to_value().unwrap();
        assert_eq!(encoded["1"], json!("first"));
        assert_eq!(BTreeMap::<u32, String>::from_value(&encoded).unwrap(), tiers);
    }

    #[test]
    fn bad_map_key_is_rejected() {
        let err = BTreeMap::<u32, String>::from_value(&json!({"one": "x"})).unwrap_err();
        assert!(matches!(err, CodecError::InvalidKey { .. }));
    }

    #[test]
    fn missing_field_names_the_field() {
        let obj = expect_object(&json!({})).unwrap().clone();
        let err = field::<String>(&obj, "ItemName").unwrap_err();
        assert_eq!(err, CodecError::MissingField { field: "ItemName" });
    }

    #[test]
    fn type_mismatch_names_the_field() {
        let value = json!({"Count": "three"});
        let obj = expect_object(&value).unwrap();
        let err = field::<i64>(obj, "Count").unwrap_err();
        assert_eq!(
            err,
            CodecError::TypeMismatch {
                field: "Count",
                expected: "integer",
                found: "string",
            }
        );
    }

    #[test]
    fn null_and_absent_are_both_default() {
        let value = json!({"A": null});
        let obj = expect_object(&value).unwrap();
        assert_eq!(opt_field::<String>(obj, "A").unwrap(), None);
        assert_eq!(opt_field::<String>(obj, "B").unwrap(), None);
    }

    #[test]
    fn one_or_many_discriminates_on_shape() {
        let one = OneOrMany::<String>::from_value(&json!("solo")).unwrap();
        assert_eq!(one, OneOrMany::One(String::from("solo")));

        let many = OneOrMany::<String>::from_value(&json!(["a", "b"])).unwrap();
        assert_eq!(
            many,
            OneOrMany::Many(vec![String::from("a"), String::from("b")])
        );

        round_trip(OneOrMany::One(String::from("solo")));
        round_trip(OneOrMany::Many(vec![String::from("a"), String::from("b")]));
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        assert!(matches!(
            f64::NAN.to_value(),
            Err(CodecError::NonFinite { .. })
        ));
        assert_eq!(
            f64::INFINITY.to_value().unwrap_err(),
            CodecError::NonFinite {
                value: f64::INFINITY
            }
        );
    }
}
