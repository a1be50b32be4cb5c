//! # Payment Entry Repository
//!
//! Payment entry headers and their invoice references. Shares the outbox
//! transitions with sales documents.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::codec;
use crate::error::{DbError, DbResult};
use crate::repository::outbox;
use caja_core::documents::PaymentReference;
use caja_core::{PaymentEntry, SyncStatus};

const TABLE: &str = "payment_entries";

const HEADER_COLUMNS: &str = "id, tenant_id, company_id, party, party_name, posting_date, \
     mode_of_payment, paid_from, paid_to, paid_from_currency, paid_to_currency, paid_amount, \
     received_amount, exchange_rate, reference_no, sync_status, remote_name, remote_modified, \
     push_attempts, last_error, created_at, updated_at, last_synced_at";

#[derive(Debug, Clone)]
pub struct PaymentEntryRepository {
    pool: SqlitePool,
}

impl PaymentEntryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentEntryRepository { pool }
    }

    pub async fn insert(&self, entry: &PaymentEntry) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_entry(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<PaymentEntry>> {
        let sql = format!("SELECT {HEADER_COLUMNS} FROM {TABLE} WHERE id = ?1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(self.load(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn list_outbox(&self, tenant_id: &str, company_id: &str) -> DbResult<Vec<PaymentEntry>> {
        let sql = format!(
            r#"
            SELECT {HEADER_COLUMNS} FROM {TABLE}
            WHERE tenant_id = ?1 AND company_id = ?2
              AND sync_status IN ('pending', 'failed')
              AND remote_name IS NULL
            ORDER BY created_at, id
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(self.load(row).await?);
        }
        Ok(entries)
    }

    pub async fn mark_synced(
        &self,
        id: &str,
        remote_name: &str,
        remote_modified: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        outbox::mark_synced(&self.pool, TABLE, id, remote_name, remote_modified, now).await
    }

    pub async fn mark_failed(&self, id: &str, error: &str, now: DateTime<Utc>) -> DbResult<()> {
        outbox::mark_failed(&self.pool, TABLE, id, error, now).await
    }

    pub async fn outbox_counts(&self, tenant_id: &str, company_id: &str) -> DbResult<(i64, i64)> {
        outbox::counts(&self.pool, TABLE, tenant_id, company_id).await
    }

    /// Stores an entry pulled from the ERP, matching by remote name or echoed local id.
    pub async fn upsert_pulled(&self, entry: &PaymentEntry) -> DbResult<()> {
        let remote_name = entry
            .remote_name
            .as_deref()
            .ok_or_else(|| DbError::invalid_data("remote_name", "pulled entry without a name"))?;

        let existing = outbox::find_id(
            &self.pool,
            TABLE,
            &entry.tenant_id,
            &entry.company_id,
            remote_name,
            Some(entry.id.as_str()),
        )
        .await?;

        let mut stored = entry.clone();
        stored.sync_status = SyncStatus::Synced;
        stored.last_error = None;

        let mut tx = self.pool.begin().await?;
        if let Some(id) = existing {
            debug!(id = %id, remote_name = %remote_name, "Replacing pulled payment entry");
            stored.id = id;
            stored.push_attempts = 0;
            // References cascade with the header.
            sqlx::query("DELETE FROM payment_entries WHERE id = ?1")
                .bind(&stored.id)
                .execute(&mut *tx)
                .await?;
        }
        insert_entry(&mut tx, &stored).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn load(&self, row: &SqliteRow) -> DbResult<PaymentEntry> {
        let mut entry = entry_from_row(row)?;
        let rows = sqlx::query(
            r#"
            SELECT id, idx, reference_doctype, reference_name, outstanding_before, allocated_amount
            FROM payment_entry_references WHERE parent_id = ?1 ORDER BY idx
            "#,
        )
        .bind(&entry.id)
        .fetch_all(&self.pool)
        .await?;

        for row in &rows {
            entry.references.push(PaymentReference {
                id: row.try_get("id")?,
                idx: row.try_get("idx")?,
                reference_doctype: codec::doc_type(row, "reference_doctype")?,
                reference_name: row.try_get("reference_name")?,
                outstanding_before: codec::decimal(row, "outstanding_before")?,
                allocated_amount: codec::decimal(row, "allocated_amount")?,
            });
        }
        Ok(entry)
    }
}

fn entry_from_row(row: &SqliteRow) -> DbResult<PaymentEntry> {
    Ok(PaymentEntry {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        company_id: row.try_get("company_id")?,
        party: row.try_get("party")?,
        party_name: row.try_get("party_name")?,
        posting_date: row.try_get("posting_date")?,
        mode_of_payment: row.try_get("mode_of_payment")?,
        paid_from: row.try_get("paid_from")?,
        paid_to: row.try_get("paid_to")?,
        paid_from_currency: row.try_get("paid_from_currency")?,
        paid_to_currency: row.try_get("paid_to_currency")?,
        paid_amount: codec::decimal(row, "paid_amount")?,
        received_amount: codec::decimal(row, "received_amount")?,
        exchange_rate: codec::opt_decimal(row, "exchange_rate")?,
        reference_no: row.try_get("reference_no")?,
        sync_status: row.try_get::<SyncStatus, _>("sync_status")?,
        remote_name: row.try_get("remote_name")?,
        remote_modified: row.try_get("remote_modified")?,
        push_attempts: row.try_get("push_attempts")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_synced_at: row.try_get("last_synced_at")?,
        references: Vec::new(),
    })
}

/// Writes header and references on the caller's connection.
pub(crate) async fn insert_entry(conn: &mut SqliteConnection, entry: &PaymentEntry) -> DbResult<()> {
    debug!(id = %entry.id, party = %entry.party, amount = %entry.paid_amount, "Inserting payment entry");

    let sql = format!(
        r#"
        INSERT INTO {TABLE} ({HEADER_COLUMNS}) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
            ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23
        )
        "#
    );
    sqlx::query(&sql)
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(&entry.company_id)
        .bind(&entry.party)
        .bind(&entry.party_name)
        .bind(entry.posting_date)
        .bind(&entry.mode_of_payment)
        .bind(&entry.paid_from)
        .bind(&entry.paid_to)
        .bind(&entry.paid_from_currency)
        .bind(&entry.paid_to_currency)
        .bind(entry.paid_amount.to_string())
        .bind(entry.received_amount.to_string())
        .bind(entry.exchange_rate.map(|r| r.to_string()))
        .bind(&entry.reference_no)
        .bind(entry.sync_status)
        .bind(&entry.remote_name)
        .bind(entry.remote_modified)
        .bind(entry.push_attempts)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .bind(entry.last_synced_at)
        .execute(&mut *conn)
        .await?;

    for reference in &entry.references {
        sqlx::query(
            r#"
            INSERT INTO payment_entry_references (
                id, parent_id, tenant_id, company_id, idx, reference_doctype,
                reference_name, outstanding_before, allocated_amount
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&reference.id)
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(&entry.company_id)
        .bind(reference.idx)
        .bind(reference.reference_doctype.as_str())
        .bind(&reference.reference_name)
        .bind(reference.outstanding_before.to_string())
        .bind(reference.allocated_amount.to_string())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use caja_core::DocType;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn entry(id: &str) -> PaymentEntry {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        PaymentEntry {
            id: id.into(),
            tenant_id: "t".into(),
            company_id: "c".into(),
            party: "CUST-1".into(),
            party_name: "Ana".into(),
            posting_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            mode_of_payment: "Cash USD".into(),
            paid_from: "Debtors - C".into(),
            paid_to: "Cash USD - C".into(),
            paid_from_currency: "NIO".into(),
            paid_to_currency: "USD".into(),
            paid_amount: dec!(50.00),
            received_amount: dec!(1.37),
            exchange_rate: Some(dec!(36.5)),
            reference_no: None,
            sync_status: SyncStatus::Pending,
            remote_name: None,
            remote_modified: None,
            push_attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
            last_synced_at: None,
            references: vec![PaymentReference {
                id: format!("{}-ref", id),
                idx: 1,
                reference_doctype: DocType::SalesInvoice,
                reference_name: "LOCAL-SINV-1".into(),
                outstanding_before: dec!(50.00),
                allocated_amount: dec!(50.00),
            }],
        }
    }

    #[tokio::test]
    async fn test_insert_get_and_outbox() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.payment_entries();
        let e = entry("LOCAL-PE-1");

        repo.insert(&e).await.unwrap();
        assert_eq!(repo.get("LOCAL-PE-1").await.unwrap(), Some(e.clone()));
        assert_eq!(repo.list_outbox("t", "c").await.unwrap().len(), 1);

        repo.mark_synced("LOCAL-PE-1", "ACC-PAY-0001", None, Utc::now())
            .await
            .unwrap();
        assert!(repo.list_outbox("t", "c").await.unwrap().is_empty());
        assert_eq!(repo.outbox_counts("t", "c").await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn test_upsert_pulled_replaces_references() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.payment_entries();
        repo.insert(&entry("LOCAL-PE-1")).await.unwrap();

        let mut pulled = entry("LOCAL-PE-1");
        pulled.remote_name = Some("ACC-PAY-0001".into());
        pulled.references[0].id = "remote-ref".into();
        pulled.references[0].reference_name = "ACC-SINV-0001".into();
        repo.upsert_pulled(&pulled).await.unwrap();

        let stored = repo.get("LOCAL-PE-1").await.unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);
        assert_eq!(stored.references.len(), 1);
        assert_eq!(stored.references[0].reference_name, "ACC-SINV-0001");
    }
}
