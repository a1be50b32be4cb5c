//! # Customer Repository

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use caja_core::Customer;

/// Repository for customers mirrored from the ERP.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Gets a customer by ERP name.
    pub async fn get(
        &self,
        tenant_id: &str,
        company_id: &str,
        name: &str,
    ) -> DbResult<Option<Customer>> {
        let row = sqlx::query(
            r#"
            SELECT name, customer_name, customer_group, default_currency,
                   receivable_account, receivable_currency, disabled, remote_modified
            FROM customers
            WHERE tenant_id = ?1 AND company_id = ?2 AND name = ?3
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(customer_from_row).transpose()
    }

    /// Enabled customers, sorted by display name.
    pub async fn list_enabled(&self, tenant_id: &str, company_id: &str) -> DbResult<Vec<Customer>> {
        let rows = sqlx::query(
            r#"
            SELECT name, customer_name, customer_group, default_currency,
                   receivable_account, receivable_currency, disabled, remote_modified
            FROM customers
            WHERE tenant_id = ?1 AND company_id = ?2 AND disabled = 0
            ORDER BY customer_name
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(customer_from_row).collect()
    }

    pub async fn upsert(
        &self,
        tenant_id: &str,
        company_id: &str,
        customer: &Customer,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(name = %customer.name, "Upserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                tenant_id, company_id, name, customer_name, customer_group, default_currency,
                receivable_account, receivable_currency, disabled, remote_modified, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (tenant_id, company_id, name) DO UPDATE SET
                customer_name = excluded.customer_name,
                customer_group = excluded.customer_group,
                default_currency = excluded.default_currency,
                receivable_account = excluded.receivable_account,
                receivable_currency = excluded.receivable_currency,
                disabled = excluded.disabled,
                remote_modified = excluded.remote_modified,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(&customer.name)
        .bind(&customer.customer_name)
        .bind(&customer.customer_group)
        .bind(&customer.default_currency)
        .bind(&customer.receivable_account)
        .bind(&customer.receivable_currency)
        .bind(customer.disabled)
        .bind(customer.remote_modified)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn customer_from_row(row: &SqliteRow) -> DbResult<Customer> {
    Ok(Customer {
        name: row.try_get("name")?,
        customer_name: row.try_get("customer_name")?,
        customer_group: row.try_get("customer_group")?,
        default_currency: row.try_get("default_currency")?,
        receivable_account: row.try_get("receivable_account")?,
        receivable_currency: row.try_get("receivable_currency")?,
        disabled: row.try_get("disabled")?,
        remote_modified: row.try_get("remote_modified")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn customer(name: &str, disabled: bool) -> Customer {
        Customer {
            name: name.into(),
            customer_name: format!("{} S.A.", name),
            customer_group: Some("Retail".into()),
            default_currency: Some("NIO".into()),
            receivable_account: Some("Debtors - C".into()),
            receivable_currency: Some("NIO".into()),
            disabled,
            remote_modified: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();
        let now = Utc::now();

        repo.upsert("t", "c", &customer("CUST-1", false), now).await.unwrap();
        repo.upsert("t", "c", &customer("CUST-2", true), now).await.unwrap();

        let found = repo.get("t", "c", "CUST-1").await.unwrap().unwrap();
        assert_eq!(found, customer("CUST-1", false));
        assert!(repo.get("t", "other", "CUST-1").await.unwrap().is_none());

        let enabled = repo.list_enabled("t", "c").await.unwrap();
        assert_eq!(enabled.len(), 1);

        repo.upsert("t", "c", &customer("CUST-1", true), now).await.unwrap();
        assert!(repo.get("t", "c", "CUST-1").await.unwrap().unwrap().disabled);
    }
}
