use async_trait::async_trait;
use entities::ledger::{KeyModification, VersionedValue, KV};
use thiserror::Error;

/// Returned by [`WorldState::put_state_at_version`] when the key was written by someone else
/// after the caller read it. Backends return it through `anyhow`, callers `downcast_ref` it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("key {key} was modified concurrently, expected version {expected:?}")]
pub struct VersionConflict {
    pub key: String,
    /// `None` when the caller expected the key to be absent
    pub expected: Option<i64>,
}

/// Versioned key-value store the asset records are kept in.
///
/// Every `put_state` creates a new version of the key; previous versions
/// stay reachable through `get_history_for_key`.
/// Serializing concurrent writers of the same key is the job of the implementation.
#[async_trait]
pub trait WorldState {
    /// Returns `None` when nothing is stored under the key.
    async fn get_state(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Unconditional write. Empty values are rejected, an empty value marks a deletion.
    async fn put_state(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;

    /// Like `get_state`, also returning the version the value was committed with.
    async fn get_versioned_state(&self, key: &str) -> anyhow::Result<Option<VersionedValue>>;

    /// Writes only if the key is still at `expected_version`, `None` meaning the key must be absent.
    /// Fails with [`VersionConflict`] otherwise and writes nothing.
    async fn put_state_at_version(
        &self,
        key: &str,
        value: &[u8],
        expected_version: Option<i64>,
    ) -> anyhow::Result<()>;

    /// Forward scan over `[start_key, end_key)` in key order.
    /// An empty `start_key` or `end_key` leaves that side of the range open.
    async fn get_state_by_range(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> anyhow::Result<Box<dyn StateQueryIterator + Send>>;

    /// Every committed version of the key, oldest first.
    async fn get_history_for_key(&self, key: &str) -> anyhow::Result<Box<dyn HistoryQueryIterator + Send>>;
}

/// Single-pass iterator over a range scan.
/// Callers must `close` it once done, whether it was drained or not.
#[async_trait]
pub trait StateQueryIterator {
    async fn next(&mut self) -> anyhow::Result<Option<KV>>;
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Single-pass iterator over the versions of one key.
/// Callers must `close` it once done, whether it was drained or not.
#[async_trait]
pub trait HistoryQueryIterator {
    async fn next(&mut self) -> anyhow::Result<Option<KeyModification>>;
    async fn close(&mut self) -> anyhow::Result<()>;
}
