//! # Payment Mode Repository
//!
//! Modes of payment with the settlement account configured for a company.
//! A mode without an account is stored as-is; the allocation engine rejects
//! it when a tender uses it.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::DbResult;
use caja_core::{PaymentModeAccount, PaymentModeKind};

#[derive(Debug, Clone)]
pub struct PaymentModeRepository {
    pool: SqlitePool,
}

impl PaymentModeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentModeRepository { pool }
    }

    pub async fn get(
        &self,
        tenant_id: &str,
        company_id: &str,
        mode: &str,
    ) -> DbResult<Option<PaymentModeAccount>> {
        let row = sqlx::query(
            r#"
            SELECT mode, kind, account, account_currency, enabled
            FROM payment_modes
            WHERE tenant_id = ?1 AND company_id = ?2 AND mode = ?3
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(mode)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(mode_from_row).transpose()
    }

    /// Every mode of the company, enabled or not.
    pub async fn list(&self, tenant_id: &str, company_id: &str) -> DbResult<Vec<PaymentModeAccount>> {
        let rows = sqlx::query(
            r#"
            SELECT mode, kind, account, account_currency, enabled
            FROM payment_modes
            WHERE tenant_id = ?1 AND company_id = ?2
            ORDER BY mode
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(mode_from_row).collect()
    }

    pub async fn upsert(
        &self,
        tenant_id: &str,
        company_id: &str,
        mode: &PaymentModeAccount,
        remote_modified: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_modes (
                tenant_id, company_id, mode, kind, account, account_currency,
                enabled, remote_modified, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (tenant_id, company_id, mode) DO UPDATE SET
                kind = excluded.kind,
                account = excluded.account,
                account_currency = excluded.account_currency,
                enabled = excluded.enabled,
                remote_modified = excluded.remote_modified,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(&mode.mode)
        .bind(mode.kind)
        .bind(&mode.account)
        .bind(&mode.account_currency)
        .bind(mode.enabled)
        .bind(remote_modified)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn mode_from_row(row: &SqliteRow) -> DbResult<PaymentModeAccount> {
    Ok(PaymentModeAccount {
        mode: row.try_get("mode")?,
        kind: row.try_get::<PaymentModeKind, _>("kind")?,
        account: row.try_get("account")?,
        account_currency: row.try_get("account_currency")?,
        enabled: row.try_get("enabled")?,
    })
}
