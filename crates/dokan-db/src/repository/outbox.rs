//! # Cart Outbox Repository
//!
//! Queue of local cart mutations waiting to be mirrored to the remote cart.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  LOCAL MUTATION (add / update / move)                                  │
//! │       │                                                                 │
//! │       ├──► cartItems slot written (local state is authoritative)       │
//! │       │                                                                 │
//! │       └──► INSERT INTO cart_outbox (item_id, size, quantity, kind)     │
//! │                   (only while signed in)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            CART SYNC PROCESSOR (dokan-sync)                     │   │
//! │  │                                                                 │   │
//! │  │  1. SELECT ... WHERE synced_at IS NULL AND attempts < max      │   │
//! │  │  2. For each entry:                                            │   │
//! │  │     a. POST /api/cart/add or /api/cart/update                  │   │
//! │  │     b. On success: synced_at = NOW()                           │   │
//! │  │     c. On failure: attempts += 1, last_error = ?               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  A failed entry never rolls back the local cart.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use dokan_core::{CartMutation, MutationKind, SizeKey};

/// One queued mutation with its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartOutboxEntry {
    pub id: String,
    pub mutation: CartMutation,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: String,
    item_id: String,
    size: String,
    quantity: i64,
    kind: MutationKind,
    attempts: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    attempted_at: Option<DateTime<Utc>>,
    synced_at: Option<DateTime<Utc>>,
}

impl From<OutboxRow> for CartOutboxEntry {
    fn from(row: OutboxRow) -> Self {
        CartOutboxEntry {
            id: row.id,
            mutation: CartMutation {
                item_id: row.item_id,
                size: SizeKey::new(row.size),
                quantity: row.quantity,
                kind: row.kind,
            },
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            attempted_at: row.attempted_at,
            synced_at: row.synced_at,
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, item_id, size, quantity, kind, attempts, last_error,
           created_at, attempted_at, synced_at
    FROM cart_outbox
"#;

/// Repository for cart outbox operations.
#[derive(Debug, Clone)]
pub struct CartOutboxRepository {
    pool: SqlitePool,
}

impl CartOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartOutboxRepository { pool }
    }

    /// Queues a mutation for the remote cart.
    pub async fn queue(&self, mutation: &CartMutation) -> DbResult<CartOutboxEntry> {
        let entry = CartOutboxEntry {
            id: Uuid::new_v4().to_string(),
            mutation: mutation.clone(),
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            attempted_at: None,
            synced_at: None,
        };

        debug!(
            item_id = %mutation.item_id,
            size = %mutation.size,
            quantity = mutation.quantity,
            kind = mutation.kind.as_str(),
            "Queuing cart mutation"
        );

        sqlx::query(
            r#"
            INSERT INTO cart_outbox (
                id, item_id, size, quantity, kind,
                attempts, last_error, created_at, attempted_at, synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, ?6, NULL, NULL)
            "#,
        )
        .bind(&entry.id)
        .bind(&mutation.item_id)
        .bind(mutation.size.as_str())
        .bind(mutation.quantity)
        .bind(mutation.kind)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Pending entries in queue order, skipping those that used up
    /// `max_attempts`.
    pub async fn get_pending(&self, limit: u32, max_attempts: u32) -> DbResult<Vec<CartOutboxEntry>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE synced_at IS NULL AND attempts < ?1 ORDER BY rowid ASC LIMIT ?2"
        );
        let rows: Vec<OutboxRow> = sqlx::query_as(&sql)
            .bind(max_attempts as i64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(CartOutboxEntry::from).collect())
    }

    /// Pending entries that hit the attempt limit and will not be retried.
    pub async fn get_exhausted(&self, max_attempts: u32) -> DbResult<Vec<CartOutboxEntry>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE synced_at IS NULL AND attempts >= ?1 ORDER BY rowid ASC"
        );
        let rows: Vec<OutboxRow> = sqlx::query_as(&sql)
            .bind(max_attempts as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(CartOutboxEntry::from).collect())
    }

    pub async fn mark_synced(&self, id: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE cart_outbox SET
                synced_at = ?2,
                attempted_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a failed delivery attempt.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE cart_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts entries not yet synced (including exhausted ones).
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cart_outbox WHERE synced_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Most recent failure message among pending entries.
    pub async fn last_error(&self) -> DbResult<Option<String>> {
        let error: Option<String> = sqlx::query_scalar(
            r#"
            SELECT last_error FROM cart_outbox
            WHERE synced_at IS NULL AND last_error IS NOT NULL
            ORDER BY attempted_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(error)
    }

    /// Drops every pending entry. Used when the session ends: mutations made
    /// under one account must not replay against the next.
    pub async fn discard_pending(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM cart_outbox WHERE synced_at IS NULL")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes entries synced more than `days_old` days ago.
    pub async fn cleanup_old_entries(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_old));
        let result = sqlx::query(
            "DELETE FROM cart_outbox WHERE synced_at IS NOT NULL AND synced_at < ?1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn repo() -> CartOutboxRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().cart_outbox()
    }

    #[tokio::test]
    async fn test_queue_and_read_in_order() {
        let outbox = repo().await;
        outbox.queue(&CartMutation::add("p1", SizeKey::from("M"), 1)).await.unwrap();
        outbox.queue(&CartMutation::set("p2", SizeKey::none(), 0)).await.unwrap();

        let pending = outbox.get_pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].mutation.item_id, "p1");
        assert_eq!(pending[0].mutation.kind, MutationKind::Add);
        assert_eq!(pending[1].mutation.kind, MutationKind::Set);
        assert!(pending[1].mutation.size.is_none());
        assert_eq!(outbox.count_pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mark_synced_removes_from_pending() {
        let outbox = repo().await;
        let entry = outbox.queue(&CartMutation::add("p1", SizeKey::from("M"), 2)).await.unwrap();

        outbox.mark_synced(&entry.id).await.unwrap();
        assert!(outbox.get_pending(10, 5).await.unwrap().is_empty());
        assert_eq!(outbox.count_pending().await.unwrap(), 0);
        // synced just now, so nothing is old enough to clean
        assert_eq!(outbox.cleanup_old_entries(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failures_accumulate_until_exhausted() {
        let outbox = repo().await;
        let entry = outbox.queue(&CartMutation::add("p1", SizeKey::from("M"), 1)).await.unwrap();

        outbox.mark_failed(&entry.id, "timeout").await.unwrap();
        outbox.mark_failed(&entry.id, "502 Bad Gateway").await.unwrap();

        let pending = outbox.get_pending(10, 5).await.unwrap();
        assert_eq!(pending[0].attempts, 2);
        assert_eq!(pending[0].last_error.as_deref(), Some("502 Bad Gateway"));
        assert_eq!(outbox.last_error().await.unwrap().as_deref(), Some("502 Bad Gateway"));

        assert!(outbox.get_pending(10, 2).await.unwrap().is_empty());
        assert_eq!(outbox.get_exhausted(2).await.unwrap().len(), 1);
        assert_eq!(outbox.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_discard_pending() {
        let outbox = repo().await;
        outbox.queue(&CartMutation::add("p1", SizeKey::from("M"), 1)).await.unwrap();
        outbox.queue(&CartMutation::add("p2", SizeKey::from("L"), 1)).await.unwrap();

        assert_eq!(outbox.discard_pending().await.unwrap(), 2);
        assert_eq!(outbox.count_pending().await.unwrap(), 0);
    }
}
