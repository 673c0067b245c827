use async_trait::async_trait;
use entities::asset::Asset;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetTrackerError {
    #[error("the asset {0} already exists")]
    AlreadyExists(String),
    #[error("the asset {0} does not exist")]
    NotFound(String),
    /// Another writer changed the asset between this call's read and its write
    #[error("the asset {0} was modified concurrently")]
    Conflict(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to decode asset {key}: {source}")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode asset {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to {operation} asset {key}: {source}")]
    Storage {
        operation: &'static str,
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AssetTrackerError {
    pub fn storage(operation: &'static str, key: &str, source: anyhow::Error) -> Self {
        AssetTrackerError::Storage { operation, key: key.to_string(), source }
    }
}

/// Operations over the asset records kept in the world state.
///
/// Each call is expected to run inside one unit of work opened by the caller.
#[async_trait]
pub trait AssetTracker {
    /// Creates a new asset under `asset_id`.
    /// Fails with [`AssetTrackerError::AlreadyExists`] if any record is stored under that key.
    #[allow(clippy::too_many_arguments)]
    async fn create_asset(
        &self,
        asset_id: &str,
        dealer_id: &str,
        msisdn: &str,
        mpin: &str,
        balance: i64,
        status: &str,
        trans_amount: i64,
        trans_type: &str,
        remarks: &str,
    ) -> Result<(), AssetTrackerError>;

    async fn read_asset(&self, asset_id: &str) -> Result<Asset, AssetTrackerError>;

    /// Overwrites balance, status, last transaction type, amount and remarks.
    /// Dealer, MSISDN and PIN are kept as they were at creation.
    /// Fails with [`AssetTrackerError::Conflict`] if the asset was written after it was read here.
    async fn update_asset(
        &self,
        asset_id: &str,
        balance: i64,
        status: &str,
        trans_type: &str,
        remarks: &str,
        trans_amount: i64,
    ) -> Result<(), AssetTrackerError>;

    /// All assets in key order. A single undecodable entry fails the whole call.
    async fn get_all_assets(&self) -> Result<Vec<Asset>, AssetTrackerError>;

    /// Every committed version of the asset, oldest first. Deletion markers are skipped.
    async fn get_asset_history(&self, asset_id: &str) -> Result<Vec<Asset>, AssetTrackerError>;

    async fn asset_exists(&self, asset_id: &str) -> Result<bool, AssetTrackerError>;
}
