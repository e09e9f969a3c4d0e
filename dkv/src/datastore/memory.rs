use std::collections::BTreeMap;

use crate::datastore::Datastore;
use crate::error::DResult;
use crate::key::Key;

/// 纯内存的数据存储，使用的就是BTreeMap，将key和value直接存储在内存当中，不会对数据进行持久化
pub struct MemoryDatastore {
    data: BTreeMap<Key, Vec<u8>>,
}

impl MemoryDatastore {
    /// Creates an empty in-memory datastore.
    pub fn new() -> Self {
        Self { data: BTreeMap::new() }
    }
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "memory")
    }
}

impl Datastore for MemoryDatastore {
    fn get(&mut self, key: &Key) -> DResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &Key, value: Vec<u8>) -> DResult<()> {
        self.data.insert(key.clone(), value);
        Ok(())
    }

    fn delete(&mut self, key: &Key) -> DResult<()> {
        self.data.remove(key);
        Ok(())
    }

    fn contains(&mut self, key: &Key) -> DResult<bool> {
        Ok(self.data.contains_key(key))
    }

    fn len(&self) -> Option<usize> {
        Some(self.data.len())
    }
}
