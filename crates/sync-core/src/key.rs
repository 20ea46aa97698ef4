//! Key model and key accessor.
//!
//! Records are opaque to the comparator except for one field, the key,
//! which is resolved through a [`KeyPath`] by the [`Record`] trait.

use crate::error::{SyncError, ValidationError};
use crate::types::{DuplicatePolicy, Side};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Kind of an orderable key. Keys are only ever compared within one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyKind {
    Number,
    String,
    Date,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyKind::Number => "number",
            KeyKind::String => "string",
            KeyKind::Date => "date",
        };
        f.write_str(s)
    }
}

/// A record key.
///
/// `Int`, `UInt` and `Float` are all of kind [`KeyKind::Number`] and compare
/// numerically with each other. Integers compare exactly; `UInt` holds only
/// values above `i64::MAX`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Date(DateTime<Utc>),
}

impl Key {
    pub fn kind(&self) -> KeyKind {
        match self {
            Key::Int(_) | Key::UInt(_) | Key::Float(_) => KeyKind::Number,
            Key::Text(_) => KeyKind::String,
            Key::Date(_) => KeyKind::Date,
        }
    }

    /// NaN is the only key value without a position in the order.
    pub fn is_orderable(&self) -> bool {
        !matches!(self, Key::Float(f) if f.is_nan())
    }
}

/// Exact comparison of an integer against a float, without rounding the
/// integer through `f64`.
fn cmp_integer_float(int: i128, float: f64) -> Ordering {
    // 2^127 bounds every i128
    const BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

    if float.is_nan() {
        return if float.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if float >= BOUND {
        return Ordering::Less;
    }
    if float < -BOUND {
        return Ordering::Greater;
    }

    let whole = float.trunc();
    match int.cmp(&(whole as i128)) {
        Ordering::Equal if float > whole => Ordering::Less,
        Ordering::Equal if float < whole => Ordering::Greater,
        other => other,
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            (Key::UInt(a), Key::UInt(b)) => a.cmp(b),
            (Key::Int(a), Key::UInt(b)) => i128::from(*a).cmp(&i128::from(*b)),
            (Key::UInt(a), Key::Int(b)) => i128::from(*a).cmp(&i128::from(*b)),
            (Key::Int(a), Key::Float(b)) => cmp_integer_float(i128::from(*a), *b),
            (Key::UInt(a), Key::Float(b)) => cmp_integer_float(i128::from(*a), *b),
            (Key::Float(a), Key::Int(b)) => cmp_integer_float(i128::from(*b), *a).reverse(),
            (Key::Float(a), Key::UInt(b)) => cmp_integer_float(i128::from(*b), *a).reverse(),
            (Key::Float(a), Key::Float(b)) => a.total_cmp(b),
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
            (Key::Date(a), Key::Date(b)) => a.cmp(b),
            _ => self.kind().cmp(&other.kind()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::UInt(u) => write!(f, "{u}"),
            Key::Float(x) => write!(f, "{x}"),
            Key::Text(s) => f.write_str(s),
            Key::Date(d) => f.write_str(&d.to_rfc3339()),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value as i64)
    }
}

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => Key::Int(i),
            Err(_) => Key::UInt(value),
        }
    }
}

impl From<f64> for Key {
    fn from(value: f64) -> Self {
        Key::Float(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Text(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Text(value)
    }
}

impl From<DateTime<Utc>> for Key {
    fn from(value: DateTime<Utc>) -> Self {
        Key::Date(value)
    }
}

/// A parsed, possibly nested key path such as `id` or `meta.ids.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    raw: String,
    segments: Vec<String>,
}

impl KeyPath {
    /// Parse a dotted key path. Empty paths and empty segments are rejected.
    pub fn parse(path: &str) -> Result<Self, SyncError> {
        let raw = path.trim();
        if raw.is_empty() {
            return Err(SyncError::Config("Key path must not be empty".to_string()));
        }

        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(SyncError::Config(format!(
                "Key path '{raw}' contains an empty segment"
            )));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Outcome of resolving a key path on a record.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyLookup {
    /// Nothing usable at the path (absent field or null).
    Missing,
    Found(Key),
    /// A value is present but cannot be ordered.
    Unsupported { kind: String, repr: String },
}

/// Key accessor implemented by every record type the comparator handles.
pub trait Record {
    fn lookup_key(&self, path: &KeyPath) -> KeyLookup;
}

impl Record for Value {
    fn lookup_key(&self, path: &KeyPath) -> KeyLookup {
        let mut current = self;
        for segment in path.segments() {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return KeyLookup::Missing,
            }
        }
        json_key(current)
    }
}

fn json_key(value: &Value) -> KeyLookup {
    match value {
        Value::Null => KeyLookup::Missing,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                KeyLookup::Found(Key::Int(i))
            } else if let Some(u) = n.as_u64() {
                KeyLookup::Found(Key::UInt(u))
            } else if let Some(f) = n.as_f64() {
                KeyLookup::Found(Key::Float(f))
            } else {
                KeyLookup::Unsupported {
                    kind: "number".to_string(),
                    repr: n.to_string(),
                }
            }
        }
        Value::String(s) => KeyLookup::Found(Key::Text(s.clone())),
        Value::Bool(b) => KeyLookup::Unsupported {
            kind: "boolean".to_string(),
            repr: b.to_string(),
        },
        Value::Array(_) => KeyLookup::Unsupported {
            kind: "array".to_string(),
            repr: value.to_string(),
        },
        Value::Object(_) => KeyLookup::Unsupported {
            kind: "object".to_string(),
            repr: value.to_string(),
        },
    }
}

/// Check one adjacent pair of keys on one side: same kind, ascending, and
/// equal only when `duplicates` permits it for `side`.
pub fn check_adjacent(
    side: Side,
    prev: &Key,
    next: &Key,
    duplicates: DuplicatePolicy,
) -> Result<(), SyncError> {
    if prev.kind() != next.kind() {
        return Err(ValidationError::KindMismatch {
            side,
            prev: prev.to_string(),
            prev_kind: prev.kind().to_string(),
            next: next.to_string(),
            next_kind: next.kind().to_string(),
        }
        .into());
    }

    match prev.cmp(next) {
        Ordering::Greater => Err(ValidationError::BadSort {
            side,
            prev: prev.to_string(),
            next: next.to_string(),
        }
        .into()),
        Ordering::Equal if !duplicates.permits(side) => Err(SyncError::DuplicateKey {
            side,
            key: next.to_string(),
        }),
        _ => Ok(()),
    }
}
