//! Expiring, append only log partitions.
//!
//! Every append resets the partition's time to live, so a partition lives
//! until one TTL after its last write. Reads never extend it.

mod memory;
mod remote;

use std::{fmt, time::Duration};

pub use memory::MemoryStore;
pub use remote::RedisStore;

use crate::{Partition, handle::JobHandle, partition::LogClass, prelude::*};

/// Backend for job logs.
#[derive(Clone)]
pub enum LogStore {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl fmt::Debug for LogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogStore::Memory(_) => f.write_str("LogStore::Memory"),
            LogStore::Redis(_) => f.write_str("LogStore::Redis"),
        }
    }
}

impl LogStore {
    /// A store that lives inside this process.
    pub fn memory(ttl: Duration) -> Self {
        LogStore::Memory(MemoryStore::new(ttl))
    }

    /// A store backed by a Redis server.
    pub async fn redis(client: &::redis::Client, ttl: Duration) -> Result<Self> {
        Ok(LogStore::Redis(RedisStore::connect(client, ttl).await?))
    }

    /// Append one record and refresh the partition's expiry.
    pub async fn append(&self, partition: &Partition, record: &str) -> Result<()> {
        match self {
            LogStore::Memory(store) => {
                store.append(partition, record);
                Ok(())
            }
            LogStore::Redis(store) => store.append(partition, record).await,
        }
    }

    /// Number of records in a partition; a missing partition has none.
    pub async fn length(&self, partition: &Partition) -> Result<usize> {
        match self {
            LogStore::Memory(store) => Ok(store.length(partition)),
            LogStore::Redis(store) => store.length(partition).await,
        }
    }

    /// Records `first..=last` in append order.
    ///
    /// Indexes past the end are clamped; a missing partition or an empty
    /// range yields no records.
    pub async fn range(
        &self,
        partition: &Partition,
        first: usize,
        last: usize,
    ) -> Result<Vec<String>> {
        if first > last {
            return Ok(Vec::new());
        }
        match self {
            LogStore::Memory(store) => Ok(store.range(partition, first, last)),
            LogStore::Redis(store) => store.range(partition, first, last).await,
        }
    }

    /// Whether any partition of `handle` is still stored.
    pub async fn exists(&self, handle: &JobHandle) -> Result<bool> {
        for class in LogClass::ALL {
            let partition = Partition::new(handle.clone(), class);
            let found = match self {
                LogStore::Memory(store) => store.contains(&partition),
                LogStore::Redis(store) => store.contains(&partition).await?,
            };
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
