//! Value ordering and grouping equality.
//!
//! Ordering rules:
//! - values of the same kind compare naturally (strings lexicographically,
//!   `false < true`, timestamps chronologically, lists element-wise);
//! - `Int` and `Float` compare numerically with each other and exactly, so
//!   integers past 2^53 are never rounded; `0.0` equals `-0.0` and `NaN`
//!   keeps its `total_cmp` place (positive above every number, negative
//!   below);
//! - values of different kinds order by [`ValueKind`] rank, so `Null` and
//!   absent fields sort first ascending and last descending;
//! - custom values use their own `compare`, and are treated as equal when
//!   they have none, which keeps their input order under a stable sort.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use docpipe_model::{Record, Value};

const NULL: &Value = &Value::Null;

/// Total order over values.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => compare_floats(*x, *y),
        (Value::Int(x), Value::Float(y)) => compare_int_float(*x, *y),
        (Value::Float(x), Value::Int(y)) => compare_int_float(*y, *x).reverse(),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::List(x), Value::List(y)) => x.cmp(y),
        (Value::Custom(x), Value::Custom(y)) => x.compare(y.as_ref()).unwrap_or(Ordering::Equal),
        _ => a.kind().cmp(&b.kind()),
    }
}

fn compare_floats(x: f64, y: f64) -> Ordering {
    if x == y {
        Ordering::Equal
    } else {
        x.total_cmp(&y)
    }
}

/// 2^63, exactly representable. Every `i64` lies in `[-2^63, 2^63)`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn compare_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= I64_BOUND {
        return Ordering::Less;
    }
    if f < -I64_BOUND {
        return Ordering::Greater;
    }
    // In range, so the truncation is exact.
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal),
        other => other,
    }
}

/// Compare one field of two records, reading absent fields as `Null`.
pub fn compare_field(a: &Record, b: &Record, column: &str) -> Ordering {
    compare_values(a.get(column).unwrap_or(NULL), b.get(column).unwrap_or(NULL))
}

/// A tuple of group-by values with hashable value equality.
///
/// Equality is by value and by variant: `Int(1)` and `Float(1.0)` are
/// different keys, `0.0` and `-0.0` are the same key, and absent fields are
/// stored as `Null`. NaN never equals itself as a value, so NaN keys match
/// by bit pattern instead.
#[derive(Debug, Clone)]
pub struct GroupKey(Vec<Value>);

impl GroupKey {
    pub fn from_record(record: &Record, columns: &[String]) -> Self {
        Self(
            columns
                .iter()
                .map(|column| record.get(column).cloned().unwrap_or_default())
                .collect(),
        )
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

fn key_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => {
            x == y || (x.is_nan() && x.to_bits() == y.to_bits())
        }
        (Value::Custom(x), Value::Custom(y)) => {
            Arc::ptr_eq(x, y) || (x.type_name() == y.type_name() && x.equals(y.as_ref()))
        }
        _ => a == b,
    }
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        Value::Null => {}
        Value::Bool(v) => v.hash(state),
        Value::Int(v) => v.hash(state),
        Value::Float(v) => {
            let v = if *v == 0.0 { 0.0_f64 } else { *v };
            v.to_bits().hash(state);
        }
        Value::String(v) => v.hash(state),
        Value::Timestamp(v) => v.hash(state),
        Value::List(v) => v.hash(state),
        Value::Custom(v) => v.type_name().hash(state),
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| key_eq(a, b))
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            hash_value(value, state);
        }
    }
}
