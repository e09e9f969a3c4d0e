use crate::datastore::Datastore;
use crate::error::{DResult, Error};
use crate::key::Key;

/// Layers an ordered list of stores, fastest first. Reads probe the tiers in
/// order and write the value back through every tier above the hit, so upper
/// caches re-warm on their own. Writes and deletes fan out to all tiers.
///
/// The read-through is not transactional across tiers: a concurrent writer
/// may cause an upper tier to briefly miss a just-read value. The next read
/// re-warms it.
pub struct TieredDatastore {
    stores: Vec<Box<dyn Datastore>>,
}

impl TieredDatastore {
    pub fn new(stores: Vec<Box<dyn Datastore>>) -> DResult<TieredDatastore> {
        if stores.is_empty() {
            return Err(Error::Value("tiered datastore needs at least one store".to_string()));
        }
        Ok(TieredDatastore { stores })
    }

    #[cfg(test)]
    pub(crate) fn stores_mut(&mut self) -> &mut [Box<dyn Datastore>] {
        &mut self.stores
    }
}

impl std::fmt::Display for TieredDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tiered({})", self.stores.len())
    }
}

impl Datastore for TieredDatastore {
    fn get(&mut self, key: &Key) -> DResult<Option<Vec<u8>>> {
        let mut found = None;
        for (i, store) in self.stores.iter_mut().enumerate() {
            if let Some(value) = store.get(key)? {
                found = Some((i, value));
                break;
            }
        }
        let (hit, value) = match found {
            Some(found) => found,
            None => return Ok(None),
        };

        // warm every tier above the hit; a failed warm-up is not a failed read
        for store in &mut self.stores[..hit] {
            if let Err(err) = store.put(key, value.clone()) {
                log::warn!("tiered: failed to warm {} with {}: {}", store, key, err);
            } else {
                log::trace!("tiered: warmed {} with {}", store, key);
            }
        }
        Ok(Some(value))
    }

    fn put(&mut self, key: &Key, value: Vec<u8>) -> DResult<()> {
        let mut first_err = None;
        for store in &mut self.stores {
            if let Err(err) = store.put(key, value.clone()) {
                log::error!("tiered: put of {} to {} failed: {}", key, store, err);
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn delete(&mut self, key: &Key) -> DResult<()> {
        let mut first_err = None;
        for store in &mut self.stores {
            if let Err(err) = store.delete(key) {
                log::error!("tiered: delete of {} from {} failed: {}", key, store, err);
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn contains(&mut self, key: &Key) -> DResult<bool> {
        for store in &mut self.stores {
            if store.contains(key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::datastore::MemoryDatastore;

    fn tiered(n: usize) -> TieredDatastore {
        TieredDatastore::new(
            (0..n).map(|_| Box::new(MemoryDatastore::new()) as Box<dyn Datastore>).collect(),
        )
        .unwrap()
    }

    super::super::tests::test_datastore!(tiered(3));

    #[test]
    fn read_through_warms_upper_tiers() -> DResult<()> {
        let mut ts = tiered(3);
        let k = Key::new("/k");
        let v = vec![3];

        // seed only the bottom tier
        ts.stores_mut()[2].put(&k, v.clone())?;
        assert_eq!(ts.stores_mut()[0].get(&k)?, None);
        assert_eq!(ts.stores_mut()[1].get(&k)?, None);

        assert!(ts.contains(&k)?);
        assert_eq!(ts.get(&k)?, Some(v.clone()));

        // the read wrote the value through to both upper tiers
        assert_eq!(ts.stores_mut()[0].get(&k)?, Some(v.clone()));
        assert_eq!(ts.stores_mut()[1].get(&k)?, Some(v));
        Ok(())
    }

    #[test]
    fn middle_tier_hit_only_warms_above() -> DResult<()> {
        let mut ts = tiered(3);
        let k = Key::new("/k");

        ts.stores_mut()[1].put(&k, vec![2])?;
        assert_eq!(ts.get(&k)?, Some(vec![2]));

        assert_eq!(ts.stores_mut()[0].get(&k)?, Some(vec![2]));
        assert_eq!(ts.stores_mut()[2].get(&k)?, None);
        Ok(())
    }

    #[test]
    fn writes_and_deletes_fan_out() -> DResult<()> {
        let mut ts = tiered(3);
        let k = Key::new("/k");

        ts.put(&k, vec![7])?;
        for store in ts.stores_mut() {
            assert!(store.contains(&k)?);
        }

        ts.delete(&k)?;
        for store in ts.stores_mut() {
            assert!(!store.contains(&k)?);
        }
        assert!(!ts.contains(&k)?);
        Ok(())
    }

    #[test]
    fn rejects_an_empty_tier_list() {
        assert!(TieredDatastore::new(vec![]).is_err());
    }
}
