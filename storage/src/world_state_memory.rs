use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use entities::ledger::{KeyModification, VersionedValue, KV};
use interfaces::world_state::{HistoryQueryIterator, StateQueryIterator, VersionConflict, WorldState};
use uuid::Uuid;

#[derive(Default)]
struct Ledger {
    current: BTreeMap<String, VersionedValue>,
    history: HashMap<String, Vec<KeyModification>>,
}

impl Ledger {
    fn commit(&mut self, key: &str, value: Vec<u8>, is_delete: bool) {
        let versions = self.history.entry(key.to_string()).or_default();
        versions.push(KeyModification {
            tx_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            value: value.clone(),
            is_delete,
        });
        let version = versions.len() as i64;

        if is_delete {
            self.current.remove(key);
        } else {
            self.current.insert(key.to_string(), VersionedValue { value, version });
        }
    }
}

/// In-process world state.
///
/// Keeps the current value of every key in key order plus the full list of versions.
/// Scans work on a snapshot taken when they are opened, so writes made while
/// iterating are not observed.
#[derive(Clone, Default)]
pub struct WorldStateMemory {
    ledger: Arc<RwLock<Ledger>>,
}

impl WorldStateMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the key from the current state and records a tombstone in its history.
    pub fn del_state(&self, key: &str) -> anyhow::Result<()> {
        self.write()?.commit(key, Vec::new(), true);
        Ok(())
    }

    fn read(&self) -> anyhow::Result<std::sync::RwLockReadGuard<'_, Ledger>> {
        self.ledger
            .read()
            .map_err(|_| anyhow::anyhow!("world state lock is poisoned"))
    }

    fn write(&self) -> anyhow::Result<std::sync::RwLockWriteGuard<'_, Ledger>> {
        self.ledger
            .write()
            .map_err(|_| anyhow::anyhow!("world state lock is poisoned"))
    }
}

fn check_write(key: &str, value: &[u8]) -> anyhow::Result<()> {
    if key.is_empty() {
        anyhow::bail!("empty key is not allowed");
    }
    if value.is_empty() {
        anyhow::bail!("empty value is not allowed for key '{key}'");
    }
    Ok(())
}

#[async_trait]
impl WorldState for WorldStateMemory {
    async fn get_state(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.read()?.current.get(key).map(|v| v.value.clone()))
    }

    async fn put_state(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        check_write(key, value)?;
        self.write()?.commit(key, value.to_vec(), false);
        Ok(())
    }

    async fn get_versioned_state(&self, key: &str) -> anyhow::Result<Option<VersionedValue>> {
        Ok(self.read()?.current.get(key).cloned())
    }

    async fn put_state_at_version(
        &self,
        key: &str,
        value: &[u8],
        expected_version: Option<i64>,
    ) -> anyhow::Result<()> {
        check_write(key, value)?;

        // the check and the commit happen under one write lock
        let mut ledger = self.write()?;
        let current_version = ledger.current.get(key).map(|v| v.version);
        if current_version != expected_version {
            return Err(VersionConflict { key: key.to_string(), expected: expected_version }.into());
        }
        ledger.commit(key, value.to_vec(), false);
        Ok(())
    }

    async fn get_state_by_range(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> anyhow::Result<Box<dyn StateQueryIterator + Send>> {
        if !end_key.is_empty() && end_key < start_key {
            anyhow::bail!("range start '{start_key}' is after range end '{end_key}'");
        }

        let lower = Bound::Included(start_key.to_string());
        let upper = if end_key.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(end_key.to_string())
        };

        let snapshot = self
            .read()?
            .current
            .range((lower, upper))
            .map(|(key, v)| KV { key: key.clone(), value: v.value.clone() })
            .collect();

        Ok(Box::new(SnapshotIterator::new(snapshot)))
    }
    async fn get_history_for_key(&self, key: &str) -> anyhow::Result<Box<dyn HistoryQueryIterator + Send>> {
        let snapshot = self.read()?.history.get(key).cloned().unwrap_or_default();

        Ok(Box::new(SnapshotIterator::new(snapshot.into())))
    }
}

/// Iterator over entries copied out of the ledger when the scan was opened
struct SnapshotIterator<T> {
    entries: VecDeque<T>,
    closed: bool,
}

impl<T> SnapshotIterator<T> {
    fn new(entries: VecDeque<T>) -> Self {
        Self { entries, closed: false }
    }

    fn next_entry(&mut self) -> anyhow::Result<Option<T>> {
        if self.closed {
            anyhow::bail!("iterator is already closed");
        }
        Ok(self.entries.pop_front())
    }

    fn release(&mut self) {
        self.entries.clear();
        self.closed = true;
    }
}

#[async_trait]
impl StateQueryIterator for SnapshotIterator<KV> {
    async fn next(&mut self) -> anyhow::Result<Option<KV>> {
        self.next_entry()
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.release();
        Ok(())
    }
}

#[async_trait]
impl HistoryQueryIterator for SnapshotIterator<KeyModification> {
    async fn next(&mut self) -> anyhow::Result<Option<KeyModification>> {
        self.next_entry()
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.release();
        Ok(())
    }
}
