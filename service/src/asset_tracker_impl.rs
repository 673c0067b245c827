use std::sync::Arc;

use entities::{asset::Asset, ledger::VersionedValue};
use interfaces::{
    asset_tracker::{AssetTracker, AssetTrackerError},
    world_state::{HistoryQueryIterator, StateQueryIterator, VersionConflict, WorldState},
};
use tracing::instrument;

/// Open range bounds, the scan covers the whole key namespace
const ALL_KEYS: (&str, &str) = ("", "");
const ALL_ASSETS_KEY: &str = "*";

/// Stateless tracker over an injected world state.
///
/// Holds no data of its own, so a single instance may serve any number of
/// units of work. It takes no locks either. Every write is conditional on the version
/// read by the same call, so when two calls race on one key the later writer fails
/// instead of overwriting.
#[derive(Clone)]
pub struct AssetTrackerImpl {
    pub world_state: Arc<dyn WorldState + Sync + Send>,
}

impl AssetTrackerImpl {
    pub fn new(world_state: Arc<dyn WorldState + Sync + Send>) -> Self {
        Self { world_state }
    }

    /// Current value of the asset key with its version. An empty value is a deletion marker,
    /// callers treat it as absent with [`is_live`].
    async fn get_asset_state(&self, asset_id: &str) -> Result<Option<VersionedValue>, AssetTrackerError> {
        let state = self
            .world_state
            .get_versioned_state(asset_id)
            .await
            .map_err(|e| AssetTrackerError::storage("read", asset_id, e))?;

        Ok(state)
    }

    /// Writes the asset only if the key is still at `expected_version`.
    /// A lost race is reported through `on_conflict`.
    async fn put_asset(
        &self,
        asset_id: &str,
        asset: &Asset,
        expected_version: Option<i64>,
        on_conflict: fn(String) -> AssetTrackerError,
    ) -> Result<(), AssetTrackerError> {
        let bytes = asset
            .to_json_bytes()
            .map_err(|source| AssetTrackerError::Serialization { key: asset_id.to_string(), source })?;

        self.world_state
            .put_state_at_version(asset_id, &bytes, expected_version)
            .await
            .map_err(|e| {
                if e.downcast_ref::<VersionConflict>().is_some() {
                    on_conflict(asset_id.to_string())
                } else {
                    AssetTrackerError::storage("write", asset_id, e)
                }
            })
    }

    async fn read_versioned_asset(&self, asset_id: &str) -> Result<(Asset, i64), AssetTrackerError> {
        validate_asset_id(asset_id)?;

        let Some(state) = self.get_asset_state(asset_id).await?.filter(is_live) else {
            return Err(AssetTrackerError::NotFound(asset_id.to_string()));
        };

        Ok((decode_asset(asset_id, &state.value)?, state.version))
    }
}

#[async_trait::async_trait]
impl AssetTracker for AssetTrackerImpl {
    #[instrument(level = "debug", skip(self, mpin))]
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
    ) -> Result<(), AssetTrackerError> {
        validate_asset_id(asset_id)?;

        // a deletion marker left under the key does not block creation, its version must still match
        let expected_version = match self.get_asset_state(asset_id).await? {
            Some(state) if is_live(&state) => return Err(AssetTrackerError::AlreadyExists(asset_id.to_string())),
            state => state.map(|s| s.version),
        };

        let asset = Asset {
            dealer_id: dealer_id.to_string(),
            msisdn: msisdn.to_string(),
            mpin: mpin.to_string(),
            balance,
            status: status.to_string(),
            trans_amount,
            trans_type: trans_type.to_string(),
            remarks: remarks.to_string(),
        };

        self.put_asset(asset_id, &asset, expected_version, AssetTrackerError::AlreadyExists)
            .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn read_asset(&self, asset_id: &str) -> Result<Asset, AssetTrackerError> {
        let (asset, _) = self.read_versioned_asset(asset_id).await?;
        Ok(asset)
    }

    #[instrument(level = "debug", skip(self))]
    async fn update_asset(
        &self,
        asset_id: &str,
        balance: i64,
        status: &str,
        trans_type: &str,
        remarks: &str,
        trans_amount: i64,
    ) -> Result<(), AssetTrackerError> {
        let (mut asset, version) = self.read_versioned_asset(asset_id).await?;

        asset.apply_transaction(balance, status, trans_type, remarks, trans_amount);

        self.put_asset(asset_id, &asset, Some(version), AssetTrackerError::Conflict)
            .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_all_assets(&self) -> Result<Vec<Asset>, AssetTrackerError> {
        let (start_key, end_key) = ALL_KEYS;
        let mut iter = self
            .world_state
            .get_state_by_range(start_key, end_key)
            .await
            .map_err(|e| AssetTrackerError::storage("scan", ALL_ASSETS_KEY, e))?;

        let collected = collect_assets(iter.as_mut()).await;
        let closed = iter.close().await;

        let assets = collected?;
        closed.map_err(|e| AssetTrackerError::storage("scan", ALL_ASSETS_KEY, e))?;
        Ok(assets)
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_asset_history(&self, asset_id: &str) -> Result<Vec<Asset>, AssetTrackerError> {
        validate_asset_id(asset_id)?;

        let mut iter = self
            .world_state
            .get_history_for_key(asset_id)
            .await
            .map_err(|e| AssetTrackerError::storage("read history of", asset_id, e))?;

        let collected = collect_history(asset_id, iter.as_mut()).await;
        let closed = iter.close().await;

        let history = collected?;
        closed.map_err(|e| AssetTrackerError::storage("read history of", asset_id, e))?;
        Ok(history)
    }

    #[instrument(level = "debug", skip(self))]
    async fn asset_exists(&self, asset_id: &str) -> Result<bool, AssetTrackerError> {
        validate_asset_id(asset_id)?;

        let state = self.get_asset_state(asset_id).await?;

        Ok(state.filter(is_live).is_some())
    }
}

fn validate_asset_id(asset_id: &str) -> Result<(), AssetTrackerError> {
    if asset_id.is_empty() {
        return Err(AssetTrackerError::InvalidArgument("asset id cannot be empty".to_string()));
    }
    Ok(())
}

fn is_live(state: &VersionedValue) -> bool {
    !state.value.is_empty()
}

fn decode_asset(asset_id: &str, bytes: &[u8]) -> Result<Asset, AssetTrackerError> {
    Asset::from_json_bytes(bytes).map_err(|source| AssetTrackerError::Deserialization { key: asset_id.to_string(), source })
}

/// Drains the scan. The first broken entry stops the iteration and no partial result is returned.
async fn collect_assets(iter: &mut (dyn StateQueryIterator + Send)) -> Result<Vec<Asset>, AssetTrackerError> {
    let mut assets = Vec::new();

    while let Some(kv) = iter
        .next()
        .await
        .map_err(|e| AssetTrackerError::storage("scan", ALL_ASSETS_KEY, e))?
    {
        if kv.value.is_empty() {
            continue;
        }
        assets.push(decode_asset(&kv.key, &kv.value)?);
    }

    Ok(assets)
}

async fn collect_history(
    asset_id: &str,
    iter: &mut (dyn HistoryQueryIterator + Send),
) -> Result<Vec<Asset>, AssetTrackerError> {
    let mut history = Vec::new();

    while let Some(modification) = iter
        .next()
        .await
        .map_err(|e| AssetTrackerError::storage("read history of", asset_id, e))?
    {
        // deleted versions carry no record
        if modification.is_tombstone() {
            continue;
        }
        history.push(decode_asset(asset_id, &modification.value)?);
    }

    Ok(history)
}
