//! # Outbox Bookkeeping
//!
//! Sync-status transitions shared by every transactional header table.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Pending ──push ok──► Synced  (remote_name, remote_modified set)       │
//! │      │                   ▲                                              │
//! │   push err               │ push ok on a later pass                      │
//! │      ▼                   │                                              │
//! │   Failed ────────────────┘    push_attempts += 1, last_error            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Table names come from [`caja_core::DocTables`] and are never user input.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{DbError, DbResult};
use caja_core::SyncStatus;

pub(crate) async fn mark_synced(
    pool: &SqlitePool,
    table: &str,
    id: &str,
    remote_name: &str,
    remote_modified: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let sql = format!(
        r#"
        UPDATE {table} SET
            sync_status = ?2,
            remote_name = ?3,
            remote_modified = ?4,
            last_error = NULL,
            last_synced_at = ?5,
            updated_at = ?5
        WHERE id = ?1
        "#
    );
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(SyncStatus::Synced)
        .bind(remote_name)
        .bind(remote_modified)
        .bind(now)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(table, id));
    }
    Ok(())
}

pub(crate) async fn mark_failed(
    pool: &SqlitePool,
    table: &str,
    id: &str,
    error: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let sql = format!(
        r#"
        UPDATE {table} SET
            sync_status = ?2,
            push_attempts = push_attempts + 1,
            last_error = ?3,
            updated_at = ?4
        WHERE id = ?1 AND sync_status != 'synced'
        "#
    );
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(SyncStatus::Failed)
        .bind(error)
        .bind(now)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(table, id));
    }
    Ok(())
}

/// `(pending, failed)` counts of unacknowledged headers.
pub(crate) async fn counts(
    pool: &SqlitePool,
    table: &str,
    tenant_id: &str,
    company_id: &str,
) -> DbResult<(i64, i64)> {
    let sql = format!(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN sync_status = 'pending' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN sync_status = 'failed' THEN 1 ELSE 0 END), 0)
        FROM {table}
        WHERE tenant_id = ?1 AND company_id = ?2
        "#
    );
    let counts: (i64, i64) = sqlx::query_as(&sql)
        .bind(tenant_id)
        .bind(company_id)
        .fetch_one(pool)
        .await?;
    Ok(counts)
}

/// Local id of the header known remotely as `remote_name` or locally as `local_id`.
pub(crate) async fn find_id(
    pool: &SqlitePool,
    table: &str,
    tenant_id: &str,
    company_id: &str,
    remote_name: &str,
    local_id: Option<&str>,
) -> DbResult<Option<String>> {
    let sql = format!(
        r#"
        SELECT id FROM {table}
        WHERE tenant_id = ?1 AND company_id = ?2
          AND (remote_name = ?3 OR id = ?3 OR (?4 IS NOT NULL AND id = ?4))
        ORDER BY CASE WHEN remote_name = ?3 THEN 0 ELSE 1 END
        LIMIT 1
        "#
    );
    let id: Option<String> = sqlx::query_scalar(&sql)
        .bind(tenant_id)
        .bind(company_id)
        .bind(remote_name)
        .bind(local_id)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

/// Remote name of a stored header, looked up by local id or remote name.
pub(crate) async fn remote_name_of(
    pool: &SqlitePool,
    table: &str,
    tenant_id: &str,
    company_id: &str,
    name: &str,
) -> DbResult<Option<String>> {
    let sql = format!(
        r#"
        SELECT remote_name FROM {table}
        WHERE tenant_id = ?1 AND company_id = ?2 AND (id = ?3 OR remote_name = ?3)
        LIMIT 1
        "#
    );
    let remote: Option<Option<String>> = sqlx::query_scalar(&sql)
        .bind(tenant_id)
        .bind(company_id)
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(remote.flatten())
}
