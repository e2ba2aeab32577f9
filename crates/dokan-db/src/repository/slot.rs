//! # Slot Repository
//!
//! Durable key/value slots: the storefront's replacement for browser
//! local storage. Each slot holds one JSON (or plain string) value.
//!
//! ## Known Slots
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────────────────┐
//! │ cartItems        │ { productId: { size: quantity } }                    │
//! │ token            │ opaque auth token (plain string)                     │
//! │ checkoutItems    │ [ { productId, size, quantity } ] buy-now list        │
//! │ catalog          │ last fetched product list                            │
//! └──────────────────┴──────────────────────────────────────────────────────┘
//! ```
//!
//! `put` is an upsert, so repeated persists of the same slot are idempotent
//! and the last write wins.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Slot names shared by every writer.
pub mod slots {
    pub const CART_ITEMS: &str = "cartItems";
    pub const TOKEN: &str = "token";
    pub const CHECKOUT_ITEMS: &str = "checkoutItems";
    pub const CATALOG: &str = "catalog";
}

#[derive(Debug, Clone)]
pub struct SlotRepository {
    pool: SqlitePool,
}

impl SlotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SlotRepository { pool }
    }

    /// Raw value of a slot, `None` when it was never written or was removed.
    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM local_slots WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    /// Writes a slot, replacing any previous value.
    pub async fn put(&self, key: &str, value: &str) -> DbResult<()> {
        debug!(key = %key, bytes = value.len(), "Writing slot");

        sqlx::query(
            r#"
            INSERT INTO local_slots (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes a slot. Returns whether it existed.
    pub async fn remove(&self, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM local_slots WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Reads and parses a JSON slot.
    ///
    /// A value that does not parse is reported as [`DbError::CorruptValue`];
    /// the caller decides whether that is fatal.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| DbError::corrupt(key, e)),
            None => Ok(None),
        }
    }

    /// Serializes `value` to JSON and writes it.
    pub async fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> DbResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| DbError::Internal(e.to_string()))?;
        self.put(key, &raw).await
    }
}
