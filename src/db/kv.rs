use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{query, query_as, sqlite::SqlitePool};

use super::store::{KeyValueStore, StoreValues};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, keys: &[&str]) -> Result<StoreValues> {
        let mut values = StoreValues::with_capacity(keys.len());
        for key in keys {
            let row: Option<(String,)> = query_as(r#"SELECT value FROM kv_store WHERE key = ?1"#)
                .bind(*key)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("failed to read key {key}"))?;

            if let Some((raw,)) = row {
                match serde_json::from_str::<Value>(&raw) {
                    Ok(value) => {
                        values.insert(key.to_string(), value);
                    }
                    Err(err) => {
                        tracing::warn!(
                            target: "store",
                            key = *key,
                            error = %err,
                            "ignoring undecodable stored value"
                        );
                    }
                }
            }
        }
        Ok(values)
    }

    async fn set(&self, values: StoreValues) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for (key, value) in values {
            let encoded = serde_json::to_string(&value)?;
            query(
                r#"INSERT OR REPLACE INTO kv_store (key, value, updated_at)
                    VALUES (?1, ?2, ?3)"#,
            )
            .bind(&key)
            .bind(encoded)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to write key {key}"))?;
        }
        tx.commit().await?;
        Ok(())
    }
}
