//! Self-describing records used to serialize versions, queries and
//! configuration. A [`SerialRepresentation`] is an ordered mapping from short
//! string fields to [`Value`]s; on the wire it is framed as a u64 big-endian
//! length prefix followed by the JSON bytes of the mapping.
//!
//! The wire framing is deliberately not the encoding the version digest is
//! computed over; digests use the deterministic byte encoding in
//! [`canonical`].

pub mod canonical;

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use byteorder::ReadBytesExt;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{DResult, Error};

/// An attribute state record: `value` plus any strategy-owned fields
/// (e.g. `updated` for the latest-attribute strategy).
pub type Record = BTreeMap<String, Value>;

/// A dynamically typed value: the primitives, ordered sequences and nested
/// string-keyed mappings that attribute state and serialized versions are
/// made of.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

/// Same-variant natural ordering, with ints and floats comparing
/// numerically. Values of unrelated variants do not compare.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(_) | Value::Map(_) => {
                write!(f, "{}", serde_json::Value::from(self))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Value {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<&crate::key::Key> for Value {
    fn from(key: &crate::key::Key) -> Value {
        Value::Str(key.as_str().to_string())
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(x) => serde_json::Value::from(*x),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), serde_json::Value::from(v))).collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(m) => {
                Value::Map(m.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_json::Value::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from(value))
    }
}

/// An opaque self-describing record: an ordered mapping from string fields
/// to values. Versions serialize through one of these.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SerialRepresentation {
    data: BTreeMap<String, Value>,
}

impl SerialRepresentation {
    pub fn new() -> SerialRepresentation {
        SerialRepresentation { data: BTreeMap::new() }
    }

    pub fn from_data(data: BTreeMap<String, Value>) -> SerialRepresentation {
        SerialRepresentation { data }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(field.into(), value.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.data.contains_key(field)
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    /// Frames the record as a u64 big-endian length prefix followed by its
    /// JSON bytes.
    pub fn encode(&self) -> DResult<Vec<u8>> {
        let json = serde_json::to_vec(&serde_json::Value::from(&Value::Map(self.data.clone())))?;

        let mut buf = BytesMut::with_capacity(8 + json.len());
        buf.put_u64(json.len() as u64);
        buf.put_slice(&json);
        Ok(buf.to_vec())
    }

    pub fn decode(bytes: &[u8]) -> DResult<SerialRepresentation> {
        let mut cursor = Cursor::new(bytes);
        let len = cursor
            .read_u64::<byteorder::BigEndian>()
            .map_err(|_| Error::Parse("record shorter than its length prefix".to_string()))?
            as usize;

        let mut json = vec![0; len];
        cursor
            .read_exact(&mut json)
            .map_err(|_| Error::Parse(format!("record truncated, expected {} bytes", len)))?;

        let value: serde_json::Value = serde_json::from_slice(&json)?;
        match Value::from(value) {
            Value::Map(data) => Ok(SerialRepresentation { data }),
            other => Err(Error::Parse(format!(
                "expected a mapping record, got {}",
                other.type_name()
            ))),
        }
    }

    /// The deterministic byte encoding the version digest is computed over.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical::encode(&Value::Map(self.data.clone()))
    }
}
