use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entities::ledger::{KeyModification, VersionedValue, KV};
use interfaces::world_state::{HistoryQueryIterator, StateQueryIterator, VersionConflict, WorldState};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgRow},
    ConnectOptions, PgPool, Postgres, Row, Transaction,
};
use tracing::log::LevelFilter;
use util::config::DatabaseCfg;
use uuid::Uuid;

/// World state kept in Postgres.
///
/// `world_state_v1` holds the current value of each key, `world_state_history_v1`
/// every committed version. See `migrations/` for the DDL.
pub struct WorldStatePg {
    pub pool: PgPool,
    scan_page_size: u32,
}

impl WorldStatePg {
    pub async fn new_from_url(
        url: &str,
        min_connections: u32,
        max_connections: u32,
        scan_page_size: u32,
    ) -> anyhow::Result<WorldStatePg> {
        let mut options: PgConnectOptions = url.parse()?;
        options.log_statements(LevelFilter::Off);
        options.log_slow_statements(LevelFilter::Off, std::time::Duration::from_secs(100));

        let pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(WorldStatePg::new_from_pool(pool, scan_page_size))
    }

    pub async fn new_from_cfg(cfg: &DatabaseCfg, scan_page_size: u32) -> anyhow::Result<WorldStatePg> {
        WorldStatePg::new_from_url(&cfg.connection_url, cfg.min_connections, cfg.max_connections, scan_page_size)
            .await
    }

    pub fn new_from_pool(pool: PgPool, scan_page_size: u32) -> WorldStatePg {
        WorldStatePg { pool, scan_page_size: scan_page_size.max(1) }
    }

    /// Opens the read-only transaction a scan iterates in,
    /// so every page of one scan sees the same snapshot.
    async fn begin_snapshot(&self) -> anyhow::Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut tx)
            .await?;
        Ok(tx)
    }
}

#[async_trait]
impl WorldState for WorldStatePg {
    async fn get_state(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT state_value FROM world_state_v1 WHERE state_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_get::<Vec<u8>, _>("state_value"))
            .transpose()
            .map_err(Into::into)
    }

    async fn put_state(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        check_write(key, value)?;

        let mut tx = self.pool.begin().await?;

        // The upsert locks the key's row, concurrent writers of the same key queue up here
        let version: i64 = sqlx::query(
            r#"
                INSERT INTO world_state_v1 (state_key, state_value, version)
                VALUES ($1, $2, 1)
                ON CONFLICT (state_key) DO UPDATE SET
                    state_value = EXCLUDED.state_value,
                    version = world_state_v1.version + 1
                RETURNING version
            "#,
        )
        .bind(key)
        .bind(value)
        .fetch_one(&mut tx)
        .await?
        .try_get("version")?;

        insert_history(&mut tx, key, version, value).await?;

        tx.commit().await?;

        Ok(())
    }

    async fn get_versioned_state(&self, key: &str) -> anyhow::Result<Option<VersionedValue>> {
        let row = sqlx::query("SELECT state_value, version FROM world_state_v1 WHERE state_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(VersionedValue {
            value: row.try_get("state_value")?,
            version: row.try_get("version")?,
        }))
    }

    async fn put_state_at_version(
        &self,
        key: &str,
        value: &[u8],
        expected_version: Option<i64>,
    ) -> anyhow::Result<()> {
        check_write(key, value)?;

        let mut tx = self.pool.begin().await?;

        // A concurrent writer holding the row (or the key's index entry) makes these wait for it
        // to finish, then the condition is re-checked against what it committed.
        let row = match expected_version {
            None => {
                sqlx::query(
                    r#"
                        INSERT INTO world_state_v1 (state_key, state_value, version)
                        VALUES ($1, $2, 1)
                        ON CONFLICT (state_key) DO NOTHING
                        RETURNING version
                    "#,
                )
                .bind(key)
                .bind(value)
                .fetch_optional(&mut tx)
                .await?
            }
            Some(expected) => {
                sqlx::query(
                    r#"
                        UPDATE world_state_v1
                        SET state_value = $2, version = version + 1
                        WHERE state_key = $1 AND version = $3
                        RETURNING version
                    "#,
                )
                .bind(key)
                .bind(value)
                .bind(expected)
                .fetch_optional(&mut tx)
                .await?
            }
        };

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(VersionConflict { key: key.to_string(), expected: expected_version }.into());
        };
        let version: i64 = row.try_get("version")?;

        insert_history(&mut tx, key, version, value).await?;

        tx.commit().await?;

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

        let tx = self.begin_snapshot().await?;

        Ok(Box::new(PgRangeIterator {
            tx: Some(tx),
            start_key: start_key.to_string(),
            end_key: (!end_key.is_empty()).then(|| end_key.to_string()),
            last_key: None,
            page_size: self.scan_page_size,
            buffer: VecDeque::new(),
            exhausted: false,
        }))
    }

    async fn get_history_for_key(&self, key: &str) -> anyhow::Result<Box<dyn HistoryQueryIterator + Send>> {
        let tx = self.begin_snapshot().await?;

        Ok(Box::new(PgHistoryIterator {
            tx: Some(tx),
            key: key.to_string(),
            last_version: 0,
            page_size: self.scan_page_size,
            buffer: VecDeque::new(),
            exhausted: false,
        }))
    }
}

/// Keyset paginated scan over `world_state_v1`.
/// Dropping it without `close` rolls the snapshot transaction back as well.
struct PgRangeIterator {
    tx: Option<Transaction<'static, Postgres>>,
    start_key: String,
    end_key: Option<String>,
    last_key: Option<String>,
    page_size: u32,
    buffer: VecDeque<KV>,
    exhausted: bool,
}

impl PgRangeIterator {
    async fn fetch_page(&mut self) -> anyhow::Result<()> {
        let Some(tx) = self.tx.as_mut() else {
            anyhow::bail!("iterator is already closed");
        };

        let rows = sqlx::query(
            r#"
                SELECT state_key, state_value
                FROM world_state_v1
                WHERE state_key >= $1
                    AND ($2::TEXT IS NULL OR state_key < $2)
                    AND ($3::TEXT IS NULL OR state_key > $3)
                ORDER BY state_key
                LIMIT $4
            "#,
        )
        .bind(self.start_key.as_str())
        .bind(self.end_key.as_deref())
        .bind(self.last_key.as_deref())
        .bind(self.page_size as i64)
        .fetch_all(tx)
        .await?;

        self.exhausted = rows.len() < self.page_size as usize;

        for row in rows.iter() {
            self.buffer.push_back(kv_from_row(row)?);
        }
        if let Some(kv) = self.buffer.back() {
            self.last_key = Some(kv.key.clone());
        }

        Ok(())
    }
}

#[async_trait]
impl StateQueryIterator for PgRangeIterator {
    async fn next(&mut self) -> anyhow::Result<Option<KV>> {
        if self.tx.is_none() {
            anyhow::bail!("iterator is already closed");
        }
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.buffer.pop_front())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.buffer.clear();
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

/// Paginated scan over the versions of one key in `world_state_history_v1`.
struct PgHistoryIterator {
    tx: Option<Transaction<'static, Postgres>>,
    key: String,
    last_version: i64,
    page_size: u32,
    buffer: VecDeque<KeyModification>,
    exhausted: bool,
}

impl PgHistoryIterator {
    async fn fetch_page(&mut self) -> anyhow::Result<()> {
        let Some(tx) = self.tx.as_mut() else {
            anyhow::bail!("iterator is already closed");
        };

        let rows = sqlx::query(
            r#"
                SELECT version, tx_id, state_value, is_delete, commit_timestamp
                FROM world_state_history_v1
                WHERE state_key = $1 AND version > $2
                ORDER BY version
                LIMIT $3
            "#,
        )
        .bind(self.key.as_str())
        .bind(self.last_version)
        .bind(self.page_size as i64)
        .fetch_all(tx)
        .await?;

        self.exhausted = rows.len() < self.page_size as usize;

        for row in rows.iter() {
            self.last_version = row.try_get("version")?;
            self.buffer.push_back(key_modification_from_row(row)?);
        }

        Ok(())
    }
}

#[async_trait]
impl HistoryQueryIterator for PgHistoryIterator {
    async fn next(&mut self) -> anyhow::Result<Option<KeyModification>> {
        if self.tx.is_none() {
            anyhow::bail!("iterator is already closed");
        }
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.buffer.pop_front())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.buffer.clear();
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
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

async fn insert_history(
    tx: &mut Transaction<'static, Postgres>,
    key: &str,
    version: i64,
    value: &[u8],
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
            INSERT INTO world_state_history_v1
            (
                state_key,
                version,
                tx_id,
                state_value,
                is_delete
            )
            VALUES ($1, $2, $3, $4, FALSE)
        "#,
    )
    .bind(key)
    .bind(version)
    .bind(Uuid::new_v4())
    .bind(value)
    .execute(tx)
    .await?;

    Ok(())
}

fn kv_from_row(row: &PgRow) -> anyhow::Result<KV> {
    Ok(KV {
        key: row.try_get("state_key")?,
        value: row.try_get("state_value")?,
    })
}

fn key_modification_from_row(row: &PgRow) -> anyhow::Result<KeyModification> {
    let timestamp: DateTime<Utc> = row.try_get("commit_timestamp")?;

    Ok(KeyModification {
        tx_id: row.try_get("tx_id")?,
        timestamp,
        value: row.try_get("state_value")?,
        is_delete: row.try_get("is_delete")?,
    })
}
