use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Entry produced by a world state range scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KV {
    pub key: String,
    pub value: Vec<u8>,
}

/// Current value of a key together with the version that committed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub value: Vec<u8>,
    /// Starts at 1 and grows by one with every committed write of the key
    pub version: i64,
}

/// One committed version of a key, as returned by a history scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyModification {
    /// Ledger transaction that committed this version
    pub tx_id: Uuid,

    /// Commit time of the version
    pub timestamp: DateTime<Utc>,

    /// Value written by the transaction, empty for a deletion
    pub value: Vec<u8>,

    /// Set when the transaction deleted the key
    pub is_delete: bool,
}

impl KeyModification {
    /// A tombstone carries no value to decode.
    pub fn is_tombstone(&self) -> bool {
        self.is_delete || self.value.is_empty()
    }
}
