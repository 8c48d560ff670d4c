//! Partition-checked concurrent lookup table.
//!
//! Some step-local tables are written from many workers at once but with a
//! known disjointness guarantee (each worker only touches keys from its own
//! slice of the data). [`PartitionedMap`] turns that guarantee into a
//! checked capability: construction fixes a partition function, each worker
//! borrows the handle for exactly one partition, and a handle rejects keys
//! that hash into any other partition instead of racing on them.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::ScheduleError;

/// A map split into fixed partitions for disjoint-key concurrent writes.
#[derive(Debug)]
pub struct PartitionedMap<K, V> {
    shards: Vec<HashMap<K, V>>,
    partition_of: fn(&K) -> u64,
}

impl<K: Hash + Eq, V> PartitionedMap<K, V> {
    /// Create a map with `partitions` shards keyed by `partition_of`.
    #[must_use]
    pub fn new(partitions: usize, partition_of: fn(&K) -> u64) -> Self {
        assert!(partitions > 0, "partition count must be non-zero");
        Self {
            shards: (0..partitions).map(|_| HashMap::new()).collect(),
            partition_of,
        }
    }

    /// Number of partitions.
    #[must_use]
    pub fn partitions(&self) -> usize {
        self.shards.len()
    }

    /// The partition a key belongs to.
    #[must_use]
    pub fn partition_for(&self, key: &K) -> usize {
        ((self.partition_of)(key) % self.shards.len() as u64) as usize
    }

    /// One write handle per partition, to be distributed across workers.
    ///
    /// The handles borrow the map mutably, so the merged view is only
    /// reachable again once every handle is dropped (the join point).
    pub fn handles(&mut self) -> Vec<PartitionHandle<'_, K, V>> {
        let partitions = self.shards.len();
        let partition_of = self.partition_of;
        self.shards
            .iter_mut()
            .enumerate()
            .map(|(index, shard)| PartitionHandle {
                index,
                partitions,
                partition_of,
                shard,
            })
            .collect()
    }

    /// Look up a key in the merged view.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.shards[self.partition_for(key)].get(key)
    }

    /// Total number of entries across all partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(HashMap::len).sum()
    }

    /// Returns `true` if no partition holds entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(HashMap::is_empty)
    }

    /// Drop all entries, keeping the partition layout.
    pub fn clear(&mut self) {
        for shard in &mut self.shards {
            shard.clear();
        }
    }
}

/// Write access to one partition of a [`PartitionedMap`].
#[derive(Debug)]
pub struct PartitionHandle<'a, K, V> {
    index: usize,
    partitions: usize,
    partition_of: fn(&K) -> u64,
    shard: &'a mut HashMap<K, V>,
}

impl<K: Hash + Eq, V> PartitionHandle<'_, K, V> {
    /// The partition this handle owns.
    #[must_use]
    pub fn partition(&self) -> usize {
        self.index
    }

    fn check(&self, key: &K) -> Result<(), ScheduleError> {
        let expected = ((self.partition_of)(key) % self.partitions as u64) as usize;
        if expected == self.index {
            Ok(())
        } else {
            Err(ScheduleError::WrongPartition {
                expected,
                actual: self.index,
            })
        }
    }

    /// Insert a key owned by this partition.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::WrongPartition`] if the key belongs elsewhere.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, ScheduleError> {
        self.check(&key)?;
        Ok(self.shard.insert(key, value))
    }

    /// Look up a key owned by this partition.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::WrongPartition`] if the key belongs elsewhere.
    pub fn get(&self, key: &K) -> Result<Option<&V>, ScheduleError> {
        self.check(key)?;
        Ok(self.shard.get(key))
    }
}

#[cfg(test)]
mod tests {
    use rayon::prelude::*;

    use super::*;

    fn by_value(key: &u64) -> u64 {
        *key
    }

    #[test]
    fn test_insert_and_merged_lookup() {
        let mut map: PartitionedMap<u64, &str> = PartitionedMap::new(4, by_value);
        {
            let mut handles = map.handles();
            handles[1].insert(5, "five").unwrap();
            handles[2].insert(6, "six").unwrap();
        }
        assert_eq!(map.get(&5), Some(&"five"));
        assert_eq!(map.get(&6), Some(&"six"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_foreign_key_rejected() {
        let mut map: PartitionedMap<u64, ()> = PartitionedMap::new(4, by_value);
        let mut handles = map.handles();
        let err = handles[0].insert(5, ()).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::WrongPartition {
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn test_concurrent_disjoint_writes() {
        let mut map: PartitionedMap<u64, u64> = PartitionedMap::new(8, by_value);
        map.handles().par_iter_mut().for_each(|handle| {
            let partition = handle.partition() as u64;
            for i in 0..16u64 {
                let key = partition + i * 8;
                handle.insert(key, key * 10).unwrap();
            }
        });
        assert_eq!(map.len(), 128);
        assert_eq!(map.get(&27), Some(&270));
    }
}
