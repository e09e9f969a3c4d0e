use std::num::NonZeroUsize;

use lru::LruCache;

use crate::datastore::Datastore;
use crate::error::{DResult, Error};
use crate::key::Key;

/// A bounded in-memory store with strict least-recently-used eviction.
/// Reads (`get` and `contains`) promote the entry only on an actual hit;
/// once capacity is reached, each insert atomically evicts the coldest
/// entry, so the cache never exceeds its capacity.
pub struct LruDatastore {
    cache: LruCache<Key, Vec<u8>>,
}

impl LruDatastore {
    pub fn new(capacity: usize) -> DResult<LruDatastore> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| Error::Value("lru capacity must be nonzero".to_string()))?;
        Ok(LruDatastore { cache: LruCache::new(capacity) })
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    /// Empties the cache.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl std::fmt::Display for LruDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lru({})", self.capacity())
    }
}

impl Datastore for LruDatastore {
    fn get(&mut self, key: &Key) -> DResult<Option<Vec<u8>>> {
        Ok(self.cache.get(key).cloned())
    }

    fn put(&mut self, key: &Key, value: Vec<u8>) -> DResult<()> {
        if let Some((evicted, _)) = self.cache.push(key.clone(), value) {
            if evicted != *key {
                log::trace!("lru: evicted {} for {}", evicted, key);
            }
        }
        Ok(())
    }

    fn delete(&mut self, key: &Key) -> DResult<()> {
        self.cache.pop(key);
        Ok(())
    }

    fn contains(&mut self, key: &Key) -> DResult<bool> {
        Ok(self.cache.get(key).is_some())
    }

    fn len(&self) -> Option<usize> {
        Some(self.cache.len())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    super::super::tests::test_datastore!(LruDatastore::new(1000).unwrap());

    #[test]
    fn capacity_is_a_hard_bound() -> DResult<()> {
        let mut lru1 = LruDatastore::new(100)?;
        let mut lru2 = LruDatastore::new(200)?;
        let mut lru3 = LruDatastore::new(300)?;

        for i in 0..300usize {
            let key = Key::new(format!("/LRU/{}", i));
            for lru in [&mut lru1, &mut lru2, &mut lru3] {
                assert!(!lru.contains(&key)?);
                lru.put(&key, vec![i as u8])?;
                assert!(lru.contains(&key)?);
                assert_eq!(lru.get(&key)?, Some(vec![i as u8]));
            }
        }

        assert_eq!(lru1.len(), Some(100));
        assert_eq!(lru2.len(), Some(200));
        assert_eq!(lru3.len(), Some(300));

        // the most recently used keys survive, the rest were evicted
        for i in 0..300usize {
            let key = Key::new(format!("/LRU/{}", i));
            assert_eq!(lru1.contains(&key)?, i >= 200);
            assert_eq!(lru2.contains(&key)?, i >= 100);
            assert!(lru3.contains(&key)?);
        }

        lru1.clear();
        lru2.clear();
        lru3.clear();
        assert_eq!(lru1.len(), Some(0));
        assert_eq!(lru2.len(), Some(0));
        assert_eq!(lru3.len(), Some(0));
        Ok(())
    }

    #[test]
    fn reads_promote_on_hit() -> DResult<()> {
        let mut lru = LruDatastore::new(2)?;
        let a = Key::new("/a");
        let b = Key::new("/b");
        let c = Key::new("/c");

        lru.put(&a, vec![1])?;
        lru.put(&b, vec![2])?;

        // touching /a makes /b the eviction candidate
        assert_eq!(lru.get(&a)?, Some(vec![1]));
        lru.put(&c, vec![3])?;

        assert!(lru.contains(&a)?);
        assert!(!lru.contains(&b)?);
        assert!(lru.contains(&c)?);
        assert_eq!(lru.len(), Some(2));
        Ok(())
    }

    #[test]
    fn misses_do_not_promote() -> DResult<()> {
        let mut lru = LruDatastore::new(2)?;
        let a = Key::new("/a");
        let b = Key::new("/b");
        let c = Key::new("/c");

        lru.put(&a, vec![1])?;
        lru.put(&b, vec![2])?;

        // a miss on an absent key must not disturb the order
        assert!(!lru.contains(&c)?);
        lru.put(&c, vec![3])?;

        assert!(!lru.contains(&a)?);
        assert!(lru.contains(&b)?);
        assert!(lru.contains(&c)?);
        Ok(())
    }

    #[test]
    fn overwrites_do_not_grow_the_cache() -> DResult<()> {
        let mut lru = LruDatastore::new(2)?;
        let a = Key::new("/a");
        lru.put(&a, vec![1])?;
        lru.put(&a, vec![2])?;
        assert_eq!(lru.len(), Some(1));
        assert_eq!(lru.get(&a)?, Some(vec![2]));
        Ok(())
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(LruDatastore::new(0).is_err());
    }
}
