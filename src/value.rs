//! Typed cell values and type-aware comparison

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single typed cell value inside a row batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Convert a DuckDB cell into a typed value. Types without a native
    /// representation fall back to their text rendering.
    pub fn from_duckdb(value: duckdb::types::ValueRef<'_>) -> Self {
        use duckdb::types::ValueRef;

        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Boolean(b) => Value::Bool(b),
            ValueRef::TinyInt(i) => Value::Int(i as i64),
            ValueRef::SmallInt(i) => Value::Int(i as i64),
            ValueRef::Int(i) => Value::Int(i as i64),
            ValueRef::BigInt(i) => Value::Int(i),
            ValueRef::HugeInt(i) => match i64::try_from(i) {
                Ok(v) => Value::Int(v),
                Err(_) => Value::Text(i.to_string()),
            },
            ValueRef::UTinyInt(i) => Value::Int(i as i64),
            ValueRef::USmallInt(i) => Value::Int(i as i64),
            ValueRef::UInt(i) => Value::Int(i as i64),
            ValueRef::UBigInt(i) => match i64::try_from(i) {
                Ok(v) => Value::Int(v),
                Err(_) => Value::Text(i.to_string()),
            },
            ValueRef::Float(f) => Value::Float(f as f64),
            ValueRef::Double(f) => Value::Float(f),
            ValueRef::Decimal(d) => match d.to_string().parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::Text(d.to_string()),
            },
            ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).to_string()),
            ValueRef::Blob(b) => Value::Text(format!("<blob:{} bytes>", b.len())),
            ValueRef::Date32(days) => match NaiveDate::from_num_days_from_ce_opt(days + 719_163) {
                Some(date) => Value::Date(date),
                None => Value::Text(format!("<date:{}>", days)),
            },
            ValueRef::Timestamp(unit, raw) => {
                let micros = timestamp_to_micros(unit, raw);
                match chrono::DateTime::from_timestamp_micros(micros) {
                    Some(ts) => Value::Timestamp(ts.naive_utc()),
                    None => Value::Text(format!("<timestamp:{}>", raw)),
                }
            }
            other => Value::Text(format!("{:?}", other)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numeric view of the value, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Type-aware equality: numeric values compare within a relative
    /// tolerance (floored at 1.0 so near-zero values use it as absolute),
    /// dates coerce to timestamps, everything else compares exactly.
    /// Two nulls are considered equal.
    pub fn equals_with_tolerance(&self, other: &Value, tolerance: f64) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Int(a), Value::Int(b)) => a == b,
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                numeric_close(a, b, tolerance)
            }
            (Value::Date(a), Value::Timestamp(b)) => a.and_hms_opt(0, 0, 0).as_ref() == Some(b),
            (Value::Timestamp(a), Value::Date(b)) => b.and_hms_opt(0, 0, 0).as_ref() == Some(a),
            (a, b) => a == b,
        }
    }

    /// Canonical encoding used for join-key identity and deterministic
    /// ordering. Numerically equal keys of coercible types encode
    /// identically (1 and 1.0 both encode as "1").
    pub fn key_repr(&self) -> String {
        match self {
            Value::Null => "\0".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
                    format!("{}", *f as i64)
                } else {
                    f.to_string()
                }
            }
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        }
    }

    /// Human-readable rendering for report payloads.
    pub fn display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        }
    }
}

fn timestamp_to_micros(unit: duckdb::types::TimeUnit, raw: i64) -> i64 {
    use duckdb::types::TimeUnit;

    match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    }
}

/// Relative comparison with a floor of 1.0, so the tolerance acts as an
/// absolute bound for values near zero.
fn numeric_close(a: f64, b: f64, tolerance: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0)
}
