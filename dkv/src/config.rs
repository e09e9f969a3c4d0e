use serde_derive::{Deserialize, Serialize};

use crate::datastore::{
    Datastore, LruDatastore, MemoryDatastore, ShardedDatastore, TieredDatastore,
};
use crate::error::DResult;

/// Datastore composition settings, loadable from any serde source.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of memory shards to spread entries across. Fewer than two
    /// keeps a single store.
    pub shards: Option<usize>,

    /// Capacity of the LRU cache tier fronting the store. None disables
    /// the cache tier.
    pub cache_capacity: Option<usize>,
}

impl StoreConfig {
    /// Builds the configured store: memory shards behind an optional LRU
    /// front tier.
    pub fn build(&self) -> DResult<Box<dyn Datastore>> {
        let base: Box<dyn Datastore> = match self.shards {
            Some(shards) if shards > 1 => Box::new(ShardedDatastore::new(
                (0..shards)
                    .map(|_| Box::new(MemoryDatastore::new()) as Box<dyn Datastore>)
                    .collect(),
            )?),
            _ => Box::new(MemoryDatastore::new()),
        };

        match self.cache_capacity {
            Some(capacity) => {
                let cache = Box::new(LruDatastore::new(capacity)?) as Box<dyn Datastore>;
                Ok(Box::new(TieredDatastore::new(vec![cache, base])?))
            }
            None => Ok(base),
        }
    }
}
