#![allow(dead_code)]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use entities::ledger::{KeyModification, VersionedValue, KV};
use interfaces::world_state::{HistoryQueryIterator, StateQueryIterator, WorldState};
use service::asset_tracker_impl::AssetTrackerImpl;
use storage::world_state_memory::WorldStateMemory;

/// Counters and switches shared between a [`SpyWorldState`] and its iterators
#[derive(Default)]
pub struct Spy {
    pub puts: AtomicUsize,
    pub opened_iterators: AtomicUsize,
    pub closed_iterators: AtomicUsize,
    pub fail_get: AtomicBool,
    pub fail_put: AtomicBool,
    pub fail_scan_open: AtomicBool,
    /// Reads of a stored key return an empty value, as left by a deletion
    pub blank_values: AtomicBool,
    /// Iterators fail once they have yielded this many entries
    pub fail_next_after: AtomicUsize,
}

impl Spy {
    pub fn new() -> Arc<Spy> {
        Arc::new(Spy { fail_next_after: AtomicUsize::new(usize::MAX), ..Default::default() })
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn all_iterators_closed(&self) -> bool {
        self.opened_iterators.load(Ordering::SeqCst) == self.closed_iterators.load(Ordering::SeqCst)
    }
}

/// World state double: delegates to [`WorldStateMemory`], counts writes and iterator
/// releases, and fails on demand.
///
/// Every call yields to the runtime once before it runs, the way a networked ledger
/// suspends the caller, so calls joined on one task interleave.
pub struct SpyWorldState {
    pub inner: WorldStateMemory,
    pub spy: Arc<Spy>,
}

impl SpyWorldState {
    async fn check_get(&self) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        if self.spy.fail_get.load(Ordering::SeqCst) {
            anyhow::bail!("peer unavailable");
        }
        Ok(())
    }

    async fn check_put(&self) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        if self.spy.fail_put.load(Ordering::SeqCst) {
            anyhow::bail!("peer unavailable");
        }
        Ok(())
    }

    async fn check_scan_open(&self) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        if self.spy.fail_scan_open.load(Ordering::SeqCst) {
            anyhow::bail!("peer unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl WorldState for SpyWorldState {
    async fn get_state(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.get_versioned_state(key).await?.map(|state| state.value))
    }

    async fn put_state(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.check_put().await?;
        self.inner.put_state(key, value).await?;
        self.spy.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_versioned_state(&self, key: &str) -> anyhow::Result<Option<VersionedValue>> {
        self.check_get().await?;
        let state = self.inner.get_versioned_state(key).await?;

        if self.spy.blank_values.load(Ordering::SeqCst) {
            return Ok(state.map(|s| VersionedValue { value: Vec::new(), ..s }));
        }
        Ok(state)
    }

    async fn put_state_at_version(
        &self,
        key: &str,
        value: &[u8],
        expected_version: Option<i64>,
    ) -> anyhow::Result<()> {
        self.check_put().await?;
        self.inner.put_state_at_version(key, value, expected_version).await?;
        self.spy.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_state_by_range(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> anyhow::Result<Box<dyn StateQueryIterator + Send>> {
        self.check_scan_open().await?;
        let inner = self.inner.get_state_by_range(start_key, end_key).await?;
        self.spy.opened_iterators.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SpyIterator { inner, spy: self.spy.clone(), yielded: 0 }))
    }

    async fn get_history_for_key(&self, key: &str) -> anyhow::Result<Box<dyn HistoryQueryIterator + Send>> {
        self.check_scan_open().await?;
        let inner = self.inner.get_history_for_key(key).await?;
        self.spy.opened_iterators.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SpyIterator { inner, spy: self.spy.clone(), yielded: 0 }))
    }
}

struct SpyIterator<I> {
    inner: I,
    spy: Arc<Spy>,
    yielded: usize,
}

impl<I> SpyIterator<I> {
    fn check_failure(&mut self) -> anyhow::Result<()> {
        if self.yielded >= self.spy.fail_next_after.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset while iterating");
        }
        self.yielded += 1;
        Ok(())
    }
}

#[async_trait]
impl StateQueryIterator for SpyIterator<Box<dyn StateQueryIterator + Send>> {
    async fn next(&mut self) -> anyhow::Result<Option<KV>> {
        self.check_failure()?;
        self.inner.next().await
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.spy.closed_iterators.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

#[async_trait]
impl HistoryQueryIterator for SpyIterator<Box<dyn HistoryQueryIterator + Send>> {
    async fn next(&mut self) -> anyhow::Result<Option<KeyModification>> {
        self.check_failure()?;
        self.inner.next().await
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.spy.closed_iterators.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

pub struct Fixture {
    pub tracker: AssetTrackerImpl,
    pub memory: WorldStateMemory,
    pub spy: Arc<Spy>,
}

pub fn setup() -> Fixture {
    let memory = WorldStateMemory::new();
    let spy = Spy::new();
    let world_state = SpyWorldState { inner: memory.clone(), spy: spy.clone() };

    Fixture { tracker: AssetTrackerImpl::new(Arc::new(world_state)), memory, spy }
}
