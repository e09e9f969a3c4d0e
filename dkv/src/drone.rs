//! The logical unit of storage: a [`Drone`] binds a datastore to a drone id
//! and moves whole entities in and out of it at the version level.

use crate::datastore::Datastore;
use crate::error::{DResult, Error};
use crate::key::Key;
use crate::merge;
use crate::model::Model;
use crate::version::Version;

/// Anything a drone can treat as a committed version: a bare [`Version`], or
/// a clean [`Model`].
pub trait ToVersion {
    fn to_version(&self) -> DResult<Version>;
}

impl ToVersion for Version {
    fn to_version(&self) -> DResult<Version> {
        Ok(self.clone())
    }
}

impl ToVersion for Model {
    fn to_version(&self) -> DResult<Version> {
        if self.is_dirty() {
            return Err(Error::Value(
                "cannot store entities with uncommitted changes".to_string(),
            ));
        }
        Ok(self.version().clone())
    }
}

/// A node owning one datastore and an id. Drones store serialized versions
/// under the version's own key, rebuild models on reads, and reconcile
/// incoming versions against the incumbent through the merge engine.
///
/// Drones retain no model references across calls, and never retry; retries
/// are the caller's responsibility.
pub struct Drone {
    droneid: Key,
    store: Box<dyn Datastore>,
}

impl Drone {
    pub fn new(droneid: Key, store: Box<dyn Datastore>) -> Drone {
        Drone { droneid, store }
    }

    /// This drone's identifier.
    pub fn droneid(&self) -> &Key {
        &self.droneid
    }

    /// Stores the current version of an entity.
    pub fn put<V: ToVersion>(&mut self, entity: &V) -> DResult<()> {
        let version = entity.to_version()?;
        let bytes = version.encode()?;
        log::debug!(
            "drone {}: put {} ({})",
            self.droneid,
            version.key(),
            version.short_hash(8)
        );
        self.store.put(version.key(), bytes)
    }

    /// Retrieves the current entity addressed by `key`, verifying its digest
    /// and rebuilding it through the model registry.
    pub fn get(&mut self, key: &Key) -> DResult<Option<Model>> {
        let bytes = match self.store.get(key)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let version = Version::decode(&bytes)?;
        Ok(Some(Model::from_version(version)?))
    }

    /// Merges a new version of an entity with the current one in the store,
    /// writes the result back and returns it.
    pub fn merge<V: ToVersion>(&mut self, entity: &V) -> DResult<Model> {
        let remote = entity.to_version()?;

        let mut current = self.get(remote.key())?.ok_or_else(|| {
            Error::KeyNotFound(format!("no entity found with key {}", remote.key()))
        })?;

        // merge into the incumbent, so that strategies favor it on ties
        merge::merge(&mut current, &remote)?;

        self.put(&current)?;
        Ok(current)
    }

    /// Removes the entity addressed by `key`.
    pub fn delete(&mut self, key: &Key) -> DResult<()> {
        log::debug!("drone {}: delete {}", self.droneid, key);
        self.store.delete(key)
    }
}
