//! Dynamic datum values.
//!
//! A [`Value`] is one Avro datum as seen by callers. Decoding yields the
//! branch value of a union directly. [`Value::Union`] tells an encoder which
//! branch to use, and carries the branch index out of
//! [`decode_tagged`](crate::codec::decode_tagged).

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value as Json};

/// An Avro datum.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    Fixed(Vec<u8>),
    /// An enum symbol.
    Enum(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Record fields by name.
    Record(BTreeMap<String, Value>),
    /// A value pinned to a union branch by index (encode only).
    Union(usize, Box<Value>),
}

impl Value {
    /// Short name of the value kind, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::Fixed(_) => "fixed",
            Value::Enum(_) => "enum",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::Union(_, _) => "union",
        }
    }

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text of a string or enum symbol.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            Value::Union(_, inner) => inner.as_str(),
            _ => None,
        }
    }

    /// Integer value of an `int` or `long`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            Value::Union(_, inner) => inner.as_i64(),
            _ => None,
        }
    }

    /// Numeric value of any number kind.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(f64::from(*v)),
            Value::Long(v) => Some(*v as f64),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::Union(_, inner) => inner.as_f64(),
            _ => None,
        }
    }

    /// Items of an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            Value::Union(_, inner) => inner.as_array(),
            _ => None,
        }
    }

    /// Entries of a record or map.
    pub fn as_record(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Record(fields) | Value::Map(fields) => Some(fields),
            Value::Union(_, inner) => inner.as_record(),
            _ => None,
        }
    }

    /// Converts schema-less JSON into a value.
    ///
    /// Integers become `Long`, other numbers `Double`, objects `Map`. The
    /// encoder coerces these to the concrete schema type.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Long(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Renders the value as JSON.
    ///
    /// Bytes become arrays of numbers; non-finite floats become `null`.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Int(v) => Json::from(*v),
            Value::Long(v) => Json::from(*v),
            Value::Float(v) => float_json(f64::from(*v)),
            Value::Double(v) => float_json(*v),
            Value::Bytes(b) | Value::Fixed(b) => Json::from(b.clone()),
            Value::String(s) | Value::Enum(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) | Value::Record(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Value::Union(_, inner) => inner.to_json(),
        }
    }
}

fn float_json(v: f64) -> Json {
    Number::from_f64(v).map(Json::Number).unwrap_or(Json::Null)
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(Value::from_json(&json!(3)), Value::Long(3));
        assert_eq!(Value::from_json(&json!(1.5)), Value::Double(1.5));
        assert_eq!(
            Value::from_json(&json!({"a": [null, true]})),
            Value::Map(BTreeMap::from([(
                "a".to_string(),
                Value::Array(vec![Value::Null, Value::Boolean(true)])
            )]))
        );
    }

    #[test]
    fn test_to_json() {
        let record = Value::Record(BTreeMap::from([
            ("age".to_string(), Value::Long(30)),
            ("role".to_string(), Value::Enum("admin".into())),
            ("score".to_string(), Value::Float(f32::NAN)),
        ]));
        assert_eq!(
            record.to_json(),
            json!({"age": 30, "role": "admin", "score": null})
        );
    }

    #[test]
    fn test_accessors_see_through_pinned_union() {
        let v = Value::Union(1, Box::new(Value::String("x".into())));
        assert_eq!(v.as_str(), Some("x"));
        assert_eq!(Value::Int(4).as_i64(), Some(4));
        assert_eq!(Value::Long(4).as_f64(), Some(4.0));
        assert!(Value::Null.as_str().is_none());
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::String("a".into()));
        assert_eq!(
            Value::from(vec!["a", "b"]),
            Value::Array(vec!["a".into(), "b".into()])
        );
    }
}
