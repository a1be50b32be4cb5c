//! # Sync State Repository
//!
//! One bookkeeping row per `(tenant, company, doc type)`.
//!
//! ## Lifecycle of a Row
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get_or_create ──► zeroed, is_in_progress = 0                           │
//! │                                                                         │
//! │  every unit run:                                                        │
//! │    set_in_progress(true)                                                │
//! │    mark_pull_success(watermark)        last_pull_at, last_error = NULL  │
//! │    mark_push_success(at)               last_push_at, last_error = NULL  │
//! │    mark_failure(error)                 last_error                       │
//! │    refresh_counters(pending, failed)   last_sync_at (always)            │
//! │    set_in_progress(false)              (always)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Every mutation first runs `INSERT OR IGNORE`, so callers never need to
//! create the row themselves. Rows are never deleted.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use crate::codec;
use crate::error::DbResult;
use caja_core::{DocType, SyncState};

/// Repository for sync state rows.
#[derive(Debug, Clone)]
pub struct SyncStateRepository {
    pool: SqlitePool,
}

impl SyncStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncStateRepository { pool }
    }

    async fn ensure(
        &self,
        tenant_id: &str,
        company_id: &str,
        doc_type: DocType,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO sync_state (tenant_id, company_id, doc_type, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(doc_type.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns the row, creating a zeroed one on first access.
    pub async fn get_or_create(
        &self,
        tenant_id: &str,
        company_id: &str,
        doc_type: DocType,
        now: DateTime<Utc>,
    ) -> DbResult<SyncState> {
        self.ensure(tenant_id, company_id, doc_type, now).await?;

        let row = sqlx::query(
            r#"
            SELECT tenant_id, company_id, doc_type, last_pull_at, last_push_at, last_sync_at,
                   pending_count, failed_count, is_in_progress, last_error, updated_at
            FROM sync_state
            WHERE tenant_id = ?1 AND company_id = ?2 AND doc_type = ?3
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(doc_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        state_from_row(&row)
    }

    pub async fn set_in_progress(
        &self,
        tenant_id: &str,
        company_id: &str,
        doc_type: DocType,
        in_progress: bool,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        self.ensure(tenant_id, company_id, doc_type, now).await?;
        debug!(doc_type = %doc_type, in_progress, "Setting in-progress flag");

        sqlx::query(
            r#"
            UPDATE sync_state SET is_in_progress = ?4, updated_at = ?5
            WHERE tenant_id = ?1 AND company_id = ?2 AND doc_type = ?3
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(doc_type.as_str())
        .bind(in_progress)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn refresh_counters(
        &self,
        tenant_id: &str,
        company_id: &str,
        doc_type: DocType,
        pending_count: i64,
        failed_count: i64,
        last_sync_at: DateTime<Utc>,
    ) -> DbResult<()> {
        self.ensure(tenant_id, company_id, doc_type, last_sync_at).await?;

        sqlx::query(
            r#"
            UPDATE sync_state SET
                pending_count = ?4,
                failed_count = ?5,
                last_sync_at = ?6,
                updated_at = ?6
            WHERE tenant_id = ?1 AND company_id = ?2 AND doc_type = ?3
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(doc_type.as_str())
        .bind(pending_count)
        .bind(failed_count)
        .bind(last_sync_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a successful pull.
    ///
    /// `watermark` is the newest remote `modified` seen; `None` keeps the
    /// previous watermark (nothing new came back). Clears `last_error`; a
    /// failing push later in the same run records its own.
    pub async fn mark_pull_success(
        &self,
        tenant_id: &str,
        company_id: &str,
        doc_type: DocType,
        watermark: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        self.ensure(tenant_id, company_id, doc_type, now).await?;

        sqlx::query(
            r#"
            UPDATE sync_state SET
                last_pull_at = COALESCE(?4, last_pull_at),
                last_error = NULL,
                updated_at = ?5
            WHERE tenant_id = ?1 AND company_id = ?2 AND doc_type = ?3
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(doc_type.as_str())
        .bind(watermark)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_push_success(
        &self,
        tenant_id: &str,
        company_id: &str,
        doc_type: DocType,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        self.ensure(tenant_id, company_id, doc_type, at).await?;

        sqlx::query(
            r#"
            UPDATE sync_state SET
                last_push_at = ?4,
                last_error = NULL,
                updated_at = ?4
            WHERE tenant_id = ?1 AND company_id = ?2 AND doc_type = ?3
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(doc_type.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_failure(
        &self,
        tenant_id: &str,
        company_id: &str,
        doc_type: DocType,
        error: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        self.ensure(tenant_id, company_id, doc_type, now).await?;
        warn!(doc_type = %doc_type, error = %error, "Recording sync failure");

        sqlx::query(
            r#"
            UPDATE sync_state SET last_error = ?4, updated_at = ?5
            WHERE tenant_id = ?1 AND company_id = ?2 AND doc_type = ?3
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(doc_type.as_str())
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Every state row of a scope, in sync order.
    pub async fn list(&self, tenant_id: &str, company_id: &str) -> DbResult<Vec<SyncState>> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, company_id, doc_type, last_pull_at, last_push_at, last_sync_at,
                   pending_count, failed_count, is_in_progress, last_error, updated_at
            FROM sync_state
            WHERE tenant_id = ?1 AND company_id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        let mut states = rows.iter().map(state_from_row).collect::<DbResult<Vec<_>>>()?;
        states.sort_by_key(|s| s.doc_type.sync_rank());
        Ok(states)
    }

    /// Clears flags left set by a process that died mid-pass.
    ///
    /// Returns the number of rows that were stuck.
    pub async fn reset_in_progress(
        &self,
        tenant_id: &str,
        company_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sync_state SET is_in_progress = 0, updated_at = ?3
            WHERE tenant_id = ?1 AND company_id = ?2 AND is_in_progress = 1
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            warn!(count = result.rows_affected(), "Cleared stale in-progress flags");
        }
        Ok(result.rows_affected())
    }
}

fn state_from_row(row: &SqliteRow) -> DbResult<SyncState> {
    Ok(SyncState {
        tenant_id: row.try_get("tenant_id")?,
        company_id: row.try_get("company_id")?,
        doc_type: codec::doc_type(row, "doc_type")?,
        last_pull_at: row.try_get("last_pull_at")?,
        last_push_at: row.try_get("last_push_at")?,
        last_sync_at: row.try_get("last_sync_at")?,
        pending_count: row.try_get("pending_count")?,
        failed_count: row.try_get("failed_count")?,
        is_in_progress: row.try_get("is_in_progress")?,
        last_error: row.try_get("last_error")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sync_state();

        let first = repo.get_or_create("t", "c", DocType::Item, t0()).await.unwrap();
        assert_eq!(first, SyncState::new("t", "c", DocType::Item, t0()));

        repo.refresh_counters("t", "c", DocType::Item, 3, 1, t0()).await.unwrap();
        let again = repo
            .get_or_create("t", "c", DocType::Item, t0() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(again.pending_count, 3);
        assert_eq!(again.failed_count, 1);
        assert_eq!(repo.list("t", "c").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mutations_create_missing_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sync_state();

        repo.mark_failure("t", "c", DocType::SalesInvoice, "boom", t0())
            .await
            .unwrap();
        let state = repo
            .get_or_create("t", "c", DocType::SalesInvoice, t0())
            .await
            .unwrap();
        assert_eq!(state.last_error.as_deref(), Some("boom"));

        repo.mark_push_success("t", "c", DocType::SalesInvoice, t0()).await.unwrap();
        let state = repo
            .get_or_create("t", "c", DocType::SalesInvoice, t0())
            .await
            .unwrap();
        assert!(state.last_error.is_none());
        assert_eq!(state.last_push_at, Some(t0()));
    }

    #[tokio::test]
    async fn test_pull_watermark_is_kept_when_nothing_new() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sync_state();

        repo.mark_pull_success("t", "c", DocType::Customer, Some(t0()), t0())
            .await
            .unwrap();
        repo.mark_pull_success("t", "c", DocType::Customer, None, t0() + Duration::minutes(5))
            .await
            .unwrap();

        let state = repo.get_or_create("t", "c", DocType::Customer, t0()).await.unwrap();
        assert_eq!(state.last_pull_at, Some(t0()));
    }

    #[tokio::test]
    async fn test_reset_in_progress_and_list_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sync_state();

        repo.set_in_progress("t", "c", DocType::SalesInvoice, true, t0()).await.unwrap();
        repo.set_in_progress("t", "c", DocType::Item, true, t0()).await.unwrap();
        repo.set_in_progress("t", "other", DocType::Item, true, t0()).await.unwrap();

        assert_eq!(repo.reset_in_progress("t", "c", t0()).await.unwrap(), 2);

        let states = repo.list("t", "c").await.unwrap();
        assert_eq!(states[0].doc_type, DocType::Item);
        assert_eq!(states[1].doc_type, DocType::SalesInvoice);
        assert!(states.iter().all(|s| !s.is_in_progress));

        let other = repo.get_or_create("t", "other", DocType::Item, t0()).await.unwrap();
        assert!(other.is_in_progress);
    }
}
