use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::Instant;
use tracing::debug;

use crate::Partition;

/// In-process log store.
///
/// Expired partitions are dropped lazily when touched, and in a sweep that
/// runs at most once per TTL on append.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    ttl: Duration,
    state: Arc<Mutex<State>>,
}

#[derive(Debug)]
struct State {
    partitions: HashMap<String, Entry>,
    last_sweep: Instant,
}

#[derive(Debug)]
struct Entry {
    records: Vec<String>,
    expires_at: Instant,
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Arc::new(Mutex::new(State {
                partitions: HashMap::new(),
                last_sweep: Instant::now(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // No operation can leave the map half updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, partition: &Partition, record: &str) {
        let now = Instant::now();
        let mut state = self.lock();
        if now.duration_since(state.last_sweep) >= self.ttl {
            let before = state.partitions.len();
            state.partitions.retain(|_, entry| entry.expires_at > now);
            let swept = before - state.partitions.len();
            debug!("Swept {swept} expired partitions");
            state.last_sweep = now;
        }

        let entry = state
            .partitions
            .entry(partition.key())
            .or_insert_with(|| Entry {
                records: Vec::new(),
                expires_at: now,
            });
        if entry.expires_at <= now {
            entry.records.clear();
        }
        entry.records.push(record.to_string());
        entry.expires_at = now + self.ttl;
    }

    pub fn length(&self, partition: &Partition) -> usize {
        self.with_live(partition, |entry| entry.records.len())
            .unwrap_or(0)
    }

    pub fn range(&self, partition: &Partition, first: usize, last: usize) -> Vec<String> {
        self.with_live(partition, |entry| {
            let end = entry.records.len().min(last.saturating_add(1));
            entry
                .records
                .get(first..end)
                .map(<[String]>::to_vec)
                .unwrap_or_default()
        })
        .unwrap_or_default()
    }

    pub fn contains(&self, partition: &Partition) -> bool {
        self.with_live(partition, |_| ()).is_some()
    }

    fn with_live<T>(&self, partition: &Partition, f: impl FnOnce(&Entry) -> T) -> Option<T> {
        let key = partition.key();
        let mut state = self.lock();
        let expired = state.partitions.get(&key)?.expires_at <= Instant::now();
        if expired {
            state.partitions.remove(&key);
            return None;
        }
        state.partitions.get(&key).map(f)
    }
}
