use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use sha1::{Digest, Sha1};

use crate::error::{DResult, Error};
use crate::key::Key;
use crate::serial::{canonical, Record, SerialRepresentation, Value};
use crate::time::NanoTime;

/// SHA-1 of the empty byte string; the sentinel for "no prior state". The
/// first version of every chain has this as its parent, and a blank
/// (uncommitted) version has it as its own hash.
pub const BLANK_HASH: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

/// An immutable snapshot of an entity at a point in time. Versions are
/// content-addressed: `hash` is the hex SHA-1 digest of the canonical
/// encoding of `(key, type, parent, created, committed, attributes)`, and
/// `parent` links each version to its predecessor, forming a per-entity
/// hash chain.
///
/// Committed versions are freely shared; nothing mutates one after creation.
#[derive(Clone, Debug, PartialEq)]
pub struct Version {
    key: Key,
    type_name: String,
    hash: String,
    parent: String,
    created: NanoTime,
    committed: NanoTime,
    attributes: BTreeMap<String, Record>,
}

impl Version {
    /// The blank version of an entity that has never been committed.
    pub fn blank(key: Key) -> Version {
        Version {
            key,
            type_name: String::new(),
            hash: BLANK_HASH.to_string(),
            parent: BLANK_HASH.to_string(),
            created: NanoTime::ZERO,
            committed: NanoTime::ZERO,
            attributes: BTreeMap::new(),
        }
    }

    /// Builds a version and stamps it with its computed digest.
    pub fn build(
        key: Key,
        type_name: impl Into<String>,
        parent: impl Into<String>,
        created: NanoTime,
        committed: NanoTime,
        attributes: BTreeMap<String, Record>,
    ) -> DResult<Version> {
        let type_name = type_name.into();
        let parent = parent.into();
        if !is_digest(&parent) {
            return Err(Error::Value(format!("malformed parent digest {:?}", parent)));
        }
        if committed < created {
            return Err(Error::Value(format!(
                "committed time {} precedes created time {}",
                committed, created
            )));
        }

        let hash = digest(&key, &type_name, &parent, created, committed, &attributes);
        Ok(Version { key, type_name, hash, parent, created, committed, attributes })
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn short_hash(&self, len: usize) -> &str {
        &self.hash[..len.min(self.hash.len())]
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn created(&self) -> NanoTime {
        self.created
    }

    pub fn committed(&self) -> NanoTime {
        self.committed
    }

    pub fn is_blank(&self) -> bool {
        self.hash == BLANK_HASH
    }

    pub fn attributes(&self) -> &BTreeMap<String, Record> {
        &self.attributes
    }

    /// The state record of a named attribute.
    pub fn attribute(&self, name: &str) -> DResult<&Record> {
        self.attributes.get(name).ok_or_else(|| {
            Error::KeyNotFound(format!("version {} has no attribute {}", self.key, name))
        })
    }

    /// The `value` field of a named attribute, or None when the attribute
    /// was never staged on this version.
    pub fn attribute_value(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).and_then(|record| record.get("value"))
    }

    /// Recomputes the digest from the version's contents. Equals `hash()`
    /// for every version this crate produces or accepts.
    pub fn computed_hash(&self) -> String {
        if self.type_name.is_empty()
            && self.attributes.is_empty()
            && self.parent == BLANK_HASH
            && self.created == NanoTime::ZERO
            && self.committed == NanoTime::ZERO
        {
            return BLANK_HASH.to_string();
        }
        digest(&self.key, &self.type_name, &self.parent, self.created, self.committed, &self.attributes)
    }

    pub fn serial_representation(&self) -> SerialRepresentation {
        let mut sr = SerialRepresentation::new();
        sr.set("key", &self.key);
        sr.set("type", self.type_name.clone());
        sr.set("hash", self.hash.clone());
        sr.set("parent", self.parent.clone());
        sr.set("created", self.created.nanoseconds());
        sr.set("committed", self.committed.nanoseconds());
        sr.set(
            "attributes",
            Value::Map(
                self.attributes
                    .iter()
                    .map(|(name, record)| (name.clone(), Value::Map(record.clone())))
                    .collect(),
            ),
        );
        sr
    }

    /// Reconstructs a version from its serialized record, checking required
    /// fields and verifying the stored digest against the computed one.
    pub fn from_serial(sr: &SerialRepresentation) -> DResult<Version> {
        let key = Key::new(require_str(sr, "key")?);
        let hash = require_str(sr, "hash")?.to_string();
        if !is_digest(&hash) {
            return Err(Error::Value(format!("malformed digest {:?}", hash)));
        }
        let parent = require_str(sr, "parent")?.to_string();
        if !is_digest(&parent) {
            return Err(Error::Value(format!("malformed parent digest {:?}", parent)));
        }
        let created = NanoTime::from_nanoseconds(require_int(sr, "created")?);
        let committed = NanoTime::from_nanoseconds(require_int(sr, "committed")?);

        let raw_attributes = match sr.get("attributes") {
            Some(Value::Map(m)) => m,
            Some(other) => {
                return Err(Error::Value(format!(
                    "field attributes must be a mapping, got {}",
                    other.type_name()
                )))
            }
            None => return Err(Error::Value("version record is missing field attributes".to_string())),
        };
        let mut attributes = BTreeMap::new();
        for (name, state) in raw_attributes {
            let record = state.as_map().ok_or_else(|| {
                Error::Value(format!("state record for attribute {} must be a mapping", name))
            })?;
            if !record.contains_key("value") {
                return Err(Error::Value(format!(
                    "state record for attribute {} is missing its value",
                    name
                )));
            }
            attributes.insert(name.clone(), record.clone());
        }

        let type_name = require_str(sr, "type")?.to_string();

        if committed < created {
            return Err(Error::Value(format!(
                "committed time {} precedes created time {}",
                committed, created
            )));
        }

        let version = Version { key, type_name, hash, parent, created, committed, attributes };
        let computed = version.computed_hash();
        if version.hash != computed {
            return Err(Error::Corruption(format!(
                "version {} digest mismatch: stored {}, computed {}",
                version.key, version.hash, computed
            )));
        }
        Ok(version)
    }

    pub fn encode(&self) -> DResult<Vec<u8>> {
        self.serial_representation().encode()
    }

    pub fn decode(bytes: &[u8]) -> DResult<Version> {
        Version::from_serial(&SerialRepresentation::decode(bytes)?)
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

fn require_str<'a>(sr: &'a SerialRepresentation, field: &str) -> DResult<&'a str> {
    match sr.get(field) {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(Error::Value(format!(
            "field {} must be a string, got {}",
            field,
            other.type_name()
        ))),
        None => Err(Error::Value(format!("version record is missing field {}", field))),
    }
}

fn require_int(sr: &SerialRepresentation, field: &str) -> DResult<i64> {
    match sr.get(field) {
        Some(Value::Int(i)) => Ok(*i),
        Some(other) => Err(Error::Value(format!(
            "field {} must be an integer, got {}",
            field,
            other.type_name()
        ))),
        None => Err(Error::Value(format!("version record is missing field {}", field))),
    }
}

fn is_digest(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn digest(
    key: &Key,
    type_name: &str,
    parent: &str,
    created: NanoTime,
    committed: NanoTime,
    attributes: &BTreeMap<String, Record>,
) -> String {
    let attrs = Value::Map(
        attributes
            .iter()
            .map(|(name, record)| (name.clone(), Value::Map(record.clone())))
            .collect(),
    );
    let tuple = Value::List(vec![
        Value::from(key),
        Value::Str(type_name.to_string()),
        Value::Str(parent.to_string()),
        Value::Int(created.nanoseconds()),
        Value::Int(committed.nanoseconds()),
        attrs,
    ]);
    hex::encode(Sha1::digest(canonical::encode(&tuple)))
}
