//! Dynamically-typed field values.
//!
//! Every cell in a [`Record`](crate::Record) holds a [`Value`]. The set of
//! variants is closed so that comparison, numeric coercion and rendering can
//! match exhaustively; caller-defined payloads go through [`CustomValue`].

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A caller-defined value stored in [`Value::Custom`].
///
/// Implementations opt into equality and ordering; the defaults treat every
/// pair of distinct custom values as unequal and unordered.
pub trait CustomValue: fmt::Debug + Send + Sync + 'static {
    /// Short name of the payload type, used in diagnostics and hashing.
    fn type_name(&self) -> &'static str;

    /// Display form used by renderers and serialization.
    fn render(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    fn equals(&self, other: &dyn CustomValue) -> bool {
        let _ = other;
        false
    }

    fn compare(&self, other: &dyn CustomValue) -> Option<Ordering> {
        let _ = other;
        None
    }
}

/// Runtime type of a [`Value`].
///
/// The declaration order doubles as the cross-type sort rank: values of
/// different kinds order by kind first (`Null` lowest, `Custom` highest).
/// `Int` and `Float` share the `Number` kind so they compare numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Timestamp,
    List,
    Custom,
}

impl ValueKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Timestamp => "timestamp",
            Self::List => "list",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    List(Vec<String>),
    Custom(Arc<dyn CustomValue>),
}

impl Value {
    /// Wrap a caller-defined value.
    pub fn custom<T: CustomValue>(value: T) -> Self {
        Self::Custom(Arc::new(value))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) | Self::Float(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::List(_) => ValueKind::List,
            Self::Custom(_) => ValueKind::Custom,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value. Only `Int` and `Float` coerce; everything
    /// else (including booleans and numeric-looking strings) returns `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Timestamp(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Downcast a custom payload to its concrete type.
    pub fn downcast_custom<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Custom(v) => v.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b) || a.equals(b.as_ref()),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Timestamp(v) => f.write_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::List(v) => f.write_str(&v.join(", ")),
            Self::Custom(v) => f.write_str(&v.render()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::String(v) => serializer.serialize_str(v),
            Self::Timestamp(v) => {
                serializer.serialize_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::List(v) => v.serialize(serializer),
            Self::Custom(v) => serializer.serialize_str(&v.render()),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, a boolean, a number, a string or a list of strings")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<String>()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug)]
    struct Money(i64);

    impl CustomValue for Money {
        fn type_name(&self) -> &'static str {
            "money"
        }

        fn render(&self) -> String {
            format!("${}", self.0)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn equals(&self, other: &dyn CustomValue) -> bool {
            other
                .as_any()
                .downcast_ref::<Money>()
                .is_some_and(|o| o.0 == self.0)
        }
    }

    #[test]
    fn numeric_coercion_only_for_numbers() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::Bool(true).as_f64(), None);
        assert_eq!(Value::from("12").as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn kinds_rank_numbers_together() {
        assert_eq!(Value::Int(1).kind(), Value::Float(1.0).kind());
        assert!(ValueKind::Null < ValueKind::Bool);
        assert!(ValueKind::String < ValueKind::Timestamp);
    }

    #[test]
    fn custom_values_use_their_equality() {
        let a = Value::custom(Money(5));
        let b = Value::custom(Money(5));
        let c = Value::custom(Money(6));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.downcast_custom::<Money>().map(|m| m.0), Some(5));
        assert_eq!(a.to_string(), "$5");
    }

    #[test]
    fn serializes_to_json_natural_types() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(7),
            Value::Float(1.5),
            Value::from("x"),
            Value::Timestamp(ts),
            Value::List(vec!["a".into(), "b".into()]),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(
            json,
            r#"[null,true,7,1.5,"x","2024-01-15T08:30:00Z",["a","b"]]"#
        );
    }

    #[test]
    fn deserializes_from_json() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, false, 3, 2.25, "s", ["x"]]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(false),
                Value::Int(3),
                Value::Float(2.25),
                Value::from("s"),
                Value::List(vec!["x".into()]),
            ]
        );
    }
}
