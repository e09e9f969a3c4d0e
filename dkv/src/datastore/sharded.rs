use sha1::{Digest, Sha1};

use crate::datastore::Datastore;
use crate::error::{DResult, Error};
use crate::key::Key;

/// Partitions keys across a fixed list of stores. Every operation routes to
/// the shard the key hashes to; data sitting in the wrong shard is invisible
/// through this store. The sharded store is a view, not a global search.
///
/// Routing must stay stable across process restarts, so the shard index is
/// derived from the key's SHA-1 rather than a process-seeded hasher.
pub struct ShardedDatastore {
    stores: Vec<Box<dyn Datastore>>,
}

impl ShardedDatastore {
    pub fn new(stores: Vec<Box<dyn Datastore>>) -> DResult<ShardedDatastore> {
        if stores.is_empty() {
            return Err(Error::Value("sharded datastore needs at least one shard".to_string()));
        }
        Ok(ShardedDatastore { stores })
    }

    /// The index of the shard responsible for `key`.
    pub fn shard_index(&self, key: &Key) -> usize {
        let digest = Sha1::digest(key.as_str().as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % self.stores.len() as u64) as usize
    }

    fn shard_mut(&mut self, key: &Key) -> &mut Box<dyn Datastore> {
        let index = self.shard_index(key);
        &mut self.stores[index]
    }

    #[cfg(test)]
    pub(crate) fn stores_mut(&mut self) -> &mut [Box<dyn Datastore>] {
        &mut self.stores
    }
}

impl std::fmt::Display for ShardedDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sharded({})", self.stores.len())
    }
}

impl Datastore for ShardedDatastore {
    fn get(&mut self, key: &Key) -> DResult<Option<Vec<u8>>> {
        self.shard_mut(key).get(key)
    }

    fn put(&mut self, key: &Key, value: Vec<u8>) -> DResult<()> {
        self.shard_mut(key).put(key, value)
    }

    fn delete(&mut self, key: &Key) -> DResult<()> {
        self.shard_mut(key).delete(key)
    }

    fn contains(&mut self, key: &Key) -> DResult<bool> {
        self.shard_mut(key).contains(key)
    }

    fn len(&self) -> Option<usize> {
        self.stores.iter().map(|store| store.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::datastore::MemoryDatastore;

    fn sharded(n: usize) -> ShardedDatastore {
        ShardedDatastore::new(
            (0..n).map(|_| Box::new(MemoryDatastore::new()) as Box<dyn Datastore>).collect(),
        )
        .unwrap()
    }

    super::super::tests::test_datastore!(sharded(5));

    #[test]
    fn routes_to_a_stable_shard() -> DResult<()> {
        let mut s = sharded(5);
        for i in 0..100 {
            let key = Key::new(format!("/fdasfdfdsafdsafdsa/{}", i));
            let index = s.shard_index(&key);
            assert_eq!(index, s.shard_index(&key));

            s.put(&key, vec![i])?;
            for (j, shard) in s.stores_mut().iter_mut().enumerate() {
                assert_eq!(shard.contains(&key)?, j == index);
            }
        }
        assert_eq!(s.len(), Some(100));
        Ok(())
    }

    #[test]
    fn wrong_shard_data_is_invisible() -> DResult<()> {
        let mut s = sharded(5);
        let key = Key::new("/fdasfdfdsafdsafdsa/0");
        let correct = s.shard_index(&key);
        let wrong = (correct + 1) % 5;

        // data planted in the wrong shard is not seen through the view
        s.stores_mut()[wrong].put(&key, vec![1])?;
        assert!(!s.contains(&key)?);
        assert_eq!(s.get(&key)?, None);
        assert!(s.stores_mut()[wrong].contains(&key)?);

        // deleting through the view only touches the correct shard
        s.delete(&key)?;
        assert!(s.stores_mut()[wrong].contains(&key)?);

        // a put through the view lands in the correct shard
        s.put(&key, vec![2])?;
        assert!(s.stores_mut()[correct].contains(&key)?);
        assert_eq!(s.get(&key)?, Some(vec![2]));

        // now the view deletes its own copy; the stray one remains
        s.delete(&key)?;
        assert!(!s.stores_mut()[correct].contains(&key)?);
        assert!(s.stores_mut()[wrong].contains(&key)?);
        assert!(!s.contains(&key)?);
        Ok(())
    }

    #[test]
    fn len_sums_shards() -> DResult<()> {
        let mut s = sharded(3);
        assert_eq!(s.len(), Some(0));
        for i in 0..10 {
            s.put(&Key::new(format!("/k/{}", i)), vec![i])?;
        }
        assert_eq!(s.len(), Some(10));
        Ok(())
    }

    #[test]
    fn rejects_an_empty_shard_list() {
        assert!(ShardedDatastore::new(vec![]).is_err());
    }
}
