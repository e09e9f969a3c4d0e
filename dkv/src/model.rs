//! Runtime entity types and instances. A [`Schema`] describes an entity type
//! as a collection of attributes; a [`Model`] is a mutable instance wrapping
//! its latest committed [`Version`] plus pending edits, and produces new
//! versions on commit.
//!
//! Schemas register in a process-wide registry so that versions decoded off
//! the wire can be rebuilt into instances of the right type.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::attribute::Attribute;
use crate::error::{DResult, Error};
use crate::key::Key;
use crate::serial::{Record, Value};
use crate::time::NanoTime;
use crate::version::{Version, BLANK_HASH};

/// A runtime type descriptor: a named, ordered collection of attributes.
#[derive(Debug)]
pub struct Schema {
    name: String,
    attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Schema {
        Schema { name: name.into(), attributes: BTreeMap::new() }
    }

    pub fn attribute(mut self, attribute: Attribute) -> Schema {
        self.attributes.insert(attribute.name().to_string(), attribute);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &BTreeMap<String, Attribute> {
        &self.attributes
    }

    pub fn attr(&self, name: &str) -> DResult<&Attribute> {
        self.attributes.get(name).ok_or_else(|| {
            Error::KeyNotFound(format!("type {} has no attribute {}", self.name, name))
        })
    }
}

static REGISTRY: Lazy<RwLock<HashMap<String, Arc<Schema>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers a schema in the process-wide registry, making its name
/// resolvable by [`lookup`]. Re-registering a name replaces the entry.
pub fn register(schema: Schema) -> Arc<Schema> {
    let schema = Arc::new(schema);
    let mut registry = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    registry.insert(schema.name().to_string(), schema.clone());
    schema
}

/// Resolves a registered schema by type name.
pub fn lookup(name: &str) -> DResult<Arc<Schema>> {
    let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
    registry.get(name).cloned().ok_or_else(|| Error::UnregisteredModel(name.to_string()))
}

/// A mutable entity instance: a key, the latest committed version (possibly
/// blank) and per-attribute staged records. Attribute reads fall through
/// staged data, then the committed version, then the declared default.
pub struct Model {
    key: Key,
    schema: Arc<Schema>,
    version: Version,
    staged: BTreeMap<String, Record>,
    dirty: bool,
}

impl Model {
    /// A fresh, uncommitted instance named `name`, keyed `/{Type}/{name}`.
    pub fn new(schema: Arc<Schema>, name: impl std::fmt::Display) -> Model {
        let key = Key::new(format!("/{}/{}", schema.name(), name));
        Model { version: Version::blank(key.clone()), key, schema, staged: BTreeMap::new(), dirty: true }
    }

    /// A fresh, uncommitted instance with an explicit key. The key's type
    /// segment must name the schema.
    pub fn with_key(schema: Arc<Schema>, key: Key) -> DResult<Model> {
        if key.type_name()? != schema.name() {
            return Err(Error::Value(format!(
                "key {} does not address a {}",
                key,
                schema.name()
            )));
        }
        Ok(Model { version: Version::blank(key.clone()), key, schema, staged: BTreeMap::new(), dirty: true })
    }

    /// Rebuilds an instance around a committed version, resolving its type
    /// through the registry.
    pub fn from_version(version: Version) -> DResult<Model> {
        let schema = lookup(version.type_name())?;
        Ok(Model {
            key: version.key().clone(),
            schema,
            version,
            staged: BTreeMap::new(),
            dirty: false,
        })
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn type_name(&self) -> &str {
        self.schema.name()
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_committed(&self) -> bool {
        !self.version.is_blank()
    }

    /// Whether this instance is backed by a real (non-blank) version, either
    /// committed locally or loaded from a store.
    pub fn is_persisted(&self) -> bool {
        !self.version.is_blank()
    }

    /// Timestamp of the first commit of this chain. None while uncommitted.
    pub fn created(&self) -> Option<NanoTime> {
        if self.version.is_blank() {
            None
        } else {
            Some(self.version.created())
        }
    }

    /// Timestamp of the latest commit. None while uncommitted.
    pub fn updated(&self) -> Option<NanoTime> {
        if self.version.is_blank() {
            None
        } else {
            Some(self.version.committed())
        }
    }

    /// Reads an attribute: staged value, else committed value, else the
    /// declared default, presented through the attribute's type.
    pub fn attr(&self, name: &str) -> DResult<Value> {
        let attribute = self.schema.attr(name)?;
        let raw = if let Some(value) = self.staged.get(name).and_then(|r| r.get("value")) {
            value.clone()
        } else if let Some(value) = self.version.attribute_value(name) {
            value.clone()
        } else {
            attribute.default().cloned().unwrap_or(Value::Null)
        };
        Ok(attribute.attr_type().present(raw))
    }

    /// Validates and stages an attribute write. Writing a value equal to the
    /// staged or committed one is a no-op and does not dirty the instance.
    pub fn set_attr(&mut self, name: &str, value: impl Into<Value>) -> DResult<()> {
        let attribute = self.schema.attr(name)?;
        let value = attribute.validate(value.into())?;

        // retrieve or create the staged record, carrying over any strategy
        // state stored alongside the committed value
        let mut record = match self.staged.get(name) {
            Some(record) => record.clone(),
            None => self.version.attributes().get(name).cloned().unwrap_or_default(),
        };

        if record.get("value") == Some(&value) {
            return Ok(());
        }

        record.insert("value".to_string(), value);
        attribute.merge_strategy().on_stage(&mut record, false);
        self.staged.insert(name.to_string(), record);
        self.dirty = true;
        Ok(())
    }

    /// Replaces an attribute's staged record wholesale, validating its
    /// value. This is how merge decisions enter an instance.
    pub fn stage_record(&mut self, name: &str, mut record: Record) -> DResult<()> {
        let attribute = self.schema.attr(name)?;
        let value = record.remove("value").ok_or_else(|| {
            Error::Value(format!("staged record for {} is missing its value", name))
        })?;
        record.insert("value".to_string(), attribute.validate(value)?);
        self.apply_record(name, record);
        Ok(())
    }

    /// Unvalidated record replacement; callers have validated already.
    pub(crate) fn apply_record(&mut self, name: &str, record: Record) {
        self.staged.insert(name.to_string(), record);
        self.dirty = true;
    }

    /// The attribute records a commit right now would persist.
    fn collect_records(&self) -> BTreeMap<String, Record> {
        let mut records = self.version.attributes().clone();
        for (name, record) in &self.staged {
            records.insert(name.clone(), record.clone());
        }
        records
    }

    /// Produces the next version of the chain from the staged records.
    ///
    /// Committing a clean instance is a no-op, and committing staged state
    /// identical to the committed state clears the dirty flag without
    /// re-linking the chain, so hash, parent and created stay stable.
    pub fn commit(&mut self) -> DResult<()> {
        if !self.dirty && self.is_committed() {
            return Ok(());
        }

        let records = self.collect_records();
        if self.is_committed() && records == *self.version.attributes() {
            self.staged.clear();
            self.dirty = false;
            return Ok(());
        }

        let now = NanoTime::now();
        let (parent, created) = if self.version.is_blank() {
            (BLANK_HASH.to_string(), now)
        } else {
            (self.version.hash().to_string(), self.version.created())
        };
        let committed = now.max(created);

        self.version = Version::build(
            self.key.clone(),
            self.schema.name(),
            parent,
            created,
            committed,
            records,
        )?;
        self.staged.clear();
        self.dirty = false;
        log::debug!("committed {} as {}", self.key, self.version.short_hash(8));
        Ok(())
    }

    /// Recomputes the digest of the current committed version.
    pub fn computed_hash(&self) -> String {
        self.version.computed_hash()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("key", &self.key)
            .field("type", &self.schema.name())
            .field("version", &self.version.short_hash(8))
            .field("dirty", &self.dirty)
            .finish()
    }
}
