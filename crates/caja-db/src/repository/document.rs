//! # Sales Document Repository
//!
//! Quotations, sales orders, delivery notes and sales invoices share one
//! aggregate shape and one repository; the doc type picks the tables.
//!
//! ## Atomic Aggregate Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  INSERT header            sales_invoices                                │
//! │  INSERT items             sales_invoice_items      (parent_id = id)     │
//! │  INSERT taxes             sales_invoice_taxes                           │
//! │  INSERT payments          sales_invoice_payments   (invoice only)       │
//! │  INSERT links             sales_invoice_links                           │
//! │  (factory) decrement bins                                               │
//! │                                                                         │
//! │  COMMIT ← lines never exist without their header                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::codec;
use crate::error::{DbError, DbResult};
use crate::repository::outbox;
use caja_core::documents::{DocumentItem, DocumentLink, DocumentPayment, DocumentTax};
use caja_core::{DocTables, DocType, DocumentStatus, SalesDocument, SyncStatus};

const HEADER_COLUMNS: &str = "id, tenant_id, company_id, customer, customer_name, posting_date, \
     currency, conversion_rate, price_list, warehouse, debit_to, net_total, tax_total, \
     grand_total, base_grand_total, paid_amount, outstanding_amount, status, update_stock, \
     remarks, sync_status, remote_name, remote_modified, push_attempts, last_error, \
     created_at, updated_at, last_synced_at";

/// Doc types that move warehouse stock when `update_stock` is set.
const STOCK_MOVING: [DocType; 2] = [DocType::DeliveryNote, DocType::SalesInvoice];

fn tables(doc_type: DocType) -> DbResult<DocTables> {
    doc_type
        .tables()
        .ok_or_else(|| DbError::Internal(format!("{} is not stored as a sales document", doc_type)))
}

/// Repository for sales document aggregates.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DocumentRepository { pool }
    }

    /// Inserts a complete aggregate in its own transaction.
    pub async fn insert(&self, doc: &SalesDocument) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_aggregate(&mut tx, doc).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Gets a document by local id.
    pub async fn get(&self, doc_type: DocType, id: &str) -> DbResult<Option<SalesDocument>> {
        let t = tables(doc_type)?;
        let sql = format!("SELECT {HEADER_COLUMNS} FROM {} WHERE id = ?1", t.header);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        match row {
            Some(row) => Ok(Some(self.load_aggregate(doc_type, &row).await?)),
            None => Ok(None),
        }
    }

    /// Gets a document by local id or remote name.
    pub async fn find(
        &self,
        doc_type: DocType,
        tenant_id: &str,
        company_id: &str,
        name: &str,
    ) -> DbResult<Option<SalesDocument>> {
        let t = tables(doc_type)?;
        match outbox::find_id(&self.pool, t.header, tenant_id, company_id, name, None).await? {
            Some(id) => self.get(doc_type, &id).await,
            None => Ok(None),
        }
    }

    /// Unacknowledged documents (Pending or Failed, no remote name), oldest first.
    pub async fn list_outbox(
        &self,
        doc_type: DocType,
        tenant_id: &str,
        company_id: &str,
    ) -> DbResult<Vec<SalesDocument>> {
        let t = tables(doc_type)?;
        let sql = format!(
            r#"
            SELECT {HEADER_COLUMNS} FROM {}
            WHERE tenant_id = ?1 AND company_id = ?2
              AND sync_status IN ('pending', 'failed')
              AND remote_name IS NULL
            ORDER BY created_at, id
            "#,
            t.header
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in &rows {
            docs.push(self.load_aggregate(doc_type, row).await?);
        }
        Ok(docs)
    }

    pub async fn mark_synced(
        &self,
        doc_type: DocType,
        id: &str,
        remote_name: &str,
        remote_modified: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let t = tables(doc_type)?;
        info!(doc_type = %doc_type, id = %id, remote_name = %remote_name, "Document synced");
        outbox::mark_synced(&self.pool, t.header, id, remote_name, remote_modified, now).await
    }

    pub async fn mark_failed(
        &self,
        doc_type: DocType,
        id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let t = tables(doc_type)?;
        outbox::mark_failed(&self.pool, t.header, id, error, now).await
    }

    /// `(pending, failed)` counts for one doc type.
    pub async fn outbox_counts(
        &self,
        doc_type: DocType,
        tenant_id: &str,
        company_id: &str,
    ) -> DbResult<(i64, i64)> {
        let t = tables(doc_type)?;
        outbox::counts(&self.pool, t.header, tenant_id, company_id).await
    }

    /// Remote name of a stored document, looked up by local id or remote name.
    pub async fn remote_name_of(
        &self,
        doc_type: DocType,
        tenant_id: &str,
        company_id: &str,
        name: &str,
    ) -> DbResult<Option<String>> {
        let t = tables(doc_type)?;
        outbox::remote_name_of(&self.pool, t.header, tenant_id, company_id, name).await
    }

    /// Stores a document pulled from the ERP.
    ///
    /// Matches an existing row by remote name or by the local id the ERP
    /// echoed back; the matched row keeps its local id and creation time and
    /// has its lines replaced. Pulled documents are always stored Synced.
    pub async fn upsert_pulled(&self, doc: &SalesDocument) -> DbResult<()> {
        let t = tables(doc.doc_type)?;
        let remote_name = doc
            .remote_name
            .as_deref()
            .ok_or_else(|| DbError::invalid_data("remote_name", "pulled document without a name"))?;

        let existing = outbox::find_id(
            &self.pool,
            t.header,
            &doc.tenant_id,
            &doc.company_id,
            remote_name,
            Some(doc.id.as_str()),
        )
        .await?;

        let mut stored = doc.clone();
        stored.sync_status = SyncStatus::Synced;
        stored.last_error = None;

        let mut tx = self.pool.begin().await?;
        match existing {
            Some(id) => {
                debug!(doc_type = %doc.doc_type, id = %id, remote_name = %remote_name, "Updating pulled document");
                stored.id = id;
                update_header(&mut tx, t, &stored).await?;
                delete_lines(&mut tx, t, &stored.id).await?;
                insert_lines(&mut tx, t, &stored).await?;
            }
            None => {
                debug!(doc_type = %doc.doc_type, remote_name = %remote_name, "Inserting pulled document");
                insert_aggregate(&mut tx, &stored).await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Quantity of `item_code` held by stock-moving documents the ERP has not
    /// acknowledged yet.
    pub async fn pending_stock_qty(
        &self,
        tenant_id: &str,
        company_id: &str,
        item_code: &str,
        warehouse: &str,
    ) -> DbResult<Decimal> {
        let mut total = Decimal::ZERO;
        for doc_type in STOCK_MOVING {
            let t = tables(doc_type)?;
            let sql = format!(
                r#"
                SELECT i.qty FROM {items} i
                JOIN {header} h ON h.id = i.parent_id
                WHERE h.tenant_id = ?1 AND h.company_id = ?2
                  AND h.update_stock = 1
                  AND h.sync_status IN ('pending', 'failed')
                  AND i.item_code = ?3 AND i.warehouse = ?4 AND i.is_stock_item = 1
                "#,
                items = t.items,
                header = t.header
            );
            let quantities: Vec<String> = sqlx::query_scalar(&sql)
                .bind(tenant_id)
                .bind(company_id)
                .bind(item_code)
                .bind(warehouse)
                .fetch_all(&self.pool)
                .await?;
            total += codec::sum_decimals("qty", &quantities)?;
        }
        Ok(total)
    }

    async fn load_aggregate(&self, doc_type: DocType, row: &SqliteRow) -> DbResult<SalesDocument> {
        let t = tables(doc_type)?;
        let mut doc = header_from_row(doc_type, row)?;

        let sql = format!(
            r#"
            SELECT id, idx, item_code, item_name, qty, uom, rate, amount, warehouse, is_stock_item
            FROM {} WHERE parent_id = ?1 ORDER BY idx
            "#,
            t.items
        );
        let rows = sqlx::query(&sql).bind(&doc.id).fetch_all(&self.pool).await?;
        for row in rows {
            doc.items.push(DocumentItem {
                id: row.try_get("id")?,
                idx: row.try_get("idx")?,
                item_code: row.try_get("item_code")?,
                item_name: row.try_get("item_name")?,
                qty: codec::decimal(&row, "qty")?,
                uom: row.try_get("uom")?,
                rate: codec::decimal(&row, "rate")?,
                amount: codec::decimal(&row, "amount")?,
                warehouse: row.try_get("warehouse")?,
                is_stock_item: row.try_get("is_stock_item")?,
            });
        }

        let sql = format!(
            r#"
            SELECT id, idx, description, account_head, rate, tax_amount
            FROM {} WHERE parent_id = ?1 ORDER BY idx
            "#,
            t.taxes
        );
        let rows = sqlx::query(&sql).bind(&doc.id).fetch_all(&self.pool).await?;
        for row in rows {
            doc.taxes.push(DocumentTax {
                id: row.try_get("id")?,
                idx: row.try_get("idx")?,
                description: row.try_get("description")?,
                account_head: row.try_get("account_head")?,
                rate: codec::decimal(&row, "rate")?,
                tax_amount: codec::decimal(&row, "tax_amount")?,
            });
        }

        if let Some(payments) = t.payments {
            let sql = format!(
                r#"
                SELECT id, idx, mode_of_payment, account, amount, payment_currency,
                       tendered, change_amount, exchange_rate
                FROM {payments} WHERE parent_id = ?1 ORDER BY idx
                "#
            );
            let rows = sqlx::query(&sql).bind(&doc.id).fetch_all(&self.pool).await?;
            for row in rows {
                doc.payments.push(DocumentPayment {
                    id: row.try_get("id")?,
                    idx: row.try_get("idx")?,
                    mode_of_payment: row.try_get("mode_of_payment")?,
                    account: row.try_get("account")?,
                    amount: codec::decimal(&row, "amount")?,
                    payment_currency: row.try_get("payment_currency")?,
                    tendered: codec::decimal(&row, "tendered")?,
                    change: codec::decimal(&row, "change_amount")?,
                    exchange_rate: codec::opt_decimal(&row, "exchange_rate")?,
                });
            }
        }

        if let Some(links) = t.links {
            let sql = format!("SELECT id, link_doctype, link_name FROM {links} WHERE parent_id = ?1 ORDER BY rowid");
            let rows = sqlx::query(&sql).bind(&doc.id).fetch_all(&self.pool).await?;
            for row in rows {
                doc.links.push(DocumentLink {
                    id: row.try_get("id")?,
                    link_doctype: codec::doc_type(&row, "link_doctype")?,
                    link_name: row.try_get("link_name")?,
                });
            }
        }

        Ok(doc)
    }
}

fn header_from_row(doc_type: DocType, row: &SqliteRow) -> DbResult<SalesDocument> {
    Ok(SalesDocument {
        id: row.try_get("id")?,
        doc_type,
        tenant_id: row.try_get("tenant_id")?,
        company_id: row.try_get("company_id")?,
        customer: row.try_get("customer")?,
        customer_name: row.try_get("customer_name")?,
        posting_date: row.try_get("posting_date")?,
        currency: row.try_get("currency")?,
        conversion_rate: codec::decimal(row, "conversion_rate")?,
        price_list: row.try_get("price_list")?,
        warehouse: row.try_get("warehouse")?,
        debit_to: row.try_get("debit_to")?,
        net_total: codec::decimal(row, "net_total")?,
        tax_total: codec::decimal(row, "tax_total")?,
        grand_total: codec::decimal(row, "grand_total")?,
        base_grand_total: codec::decimal(row, "base_grand_total")?,
        paid_amount: codec::decimal(row, "paid_amount")?,
        outstanding_amount: codec::decimal(row, "outstanding_amount")?,
        status: row.try_get::<DocumentStatus, _>("status")?,
        update_stock: row.try_get("update_stock")?,
        remarks: row.try_get("remarks")?,
        sync_status: row.try_get::<SyncStatus, _>("sync_status")?,
        remote_name: row.try_get("remote_name")?,
        remote_modified: row.try_get("remote_modified")?,
        push_attempts: row.try_get("push_attempts")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_synced_at: row.try_get("last_synced_at")?,
        items: Vec::new(),
        taxes: Vec::new(),
        payments: Vec::new(),
        links: Vec::new(),
    })
}

/// Writes header and lines on the caller's connection (normally a transaction).
pub(crate) async fn insert_aggregate(conn: &mut SqliteConnection, doc: &SalesDocument) -> DbResult<()> {
    let t = tables(doc.doc_type)?;
    debug!(doc_type = %doc.doc_type, id = %doc.id, lines = doc.items.len(), "Inserting document");

    let sql = format!(
        r#"
        INSERT INTO {} ({HEADER_COLUMNS}) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
            ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28
        )
        "#,
        t.header
    );
    sqlx::query(&sql)
        .bind(&doc.id)
        .bind(&doc.tenant_id)
        .bind(&doc.company_id)
        .bind(&doc.customer)
        .bind(&doc.customer_name)
        .bind(doc.posting_date)
        .bind(&doc.currency)
        .bind(doc.conversion_rate.to_string())
        .bind(&doc.price_list)
        .bind(&doc.warehouse)
        .bind(&doc.debit_to)
        .bind(doc.net_total.to_string())
        .bind(doc.tax_total.to_string())
        .bind(doc.grand_total.to_string())
        .bind(doc.base_grand_total.to_string())
        .bind(doc.paid_amount.to_string())
        .bind(doc.outstanding_amount.to_string())
        .bind(doc.status)
        .bind(doc.update_stock)
        .bind(&doc.remarks)
        .bind(doc.sync_status)
        .bind(&doc.remote_name)
        .bind(doc.remote_modified)
        .bind(doc.push_attempts)
        .bind(&doc.last_error)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .bind(doc.last_synced_at)
        .execute(&mut *conn)
        .await?;

    insert_lines(conn, t, doc).await
}

async fn update_header(conn: &mut SqliteConnection, t: DocTables, doc: &SalesDocument) -> DbResult<()> {
    let sql = format!(
        r#"
        UPDATE {} SET
            customer = ?2, customer_name = ?3, posting_date = ?4, currency = ?5,
            conversion_rate = ?6, price_list = ?7, warehouse = ?8, debit_to = ?9,
            net_total = ?10, tax_total = ?11, grand_total = ?12, base_grand_total = ?13,
            paid_amount = ?14, outstanding_amount = ?15, status = ?16, update_stock = ?17,
            remarks = ?18, sync_status = ?19, remote_name = ?20, remote_modified = ?21,
            last_error = NULL, updated_at = ?22, last_synced_at = ?23
        WHERE id = ?1
        "#,
        t.header
    );
    sqlx::query(&sql)
        .bind(&doc.id)
        .bind(&doc.customer)
        .bind(&doc.customer_name)
        .bind(doc.posting_date)
        .bind(&doc.currency)
        .bind(doc.conversion_rate.to_string())
        .bind(&doc.price_list)
        .bind(&doc.warehouse)
        .bind(&doc.debit_to)
        .bind(doc.net_total.to_string())
        .bind(doc.tax_total.to_string())
        .bind(doc.grand_total.to_string())
        .bind(doc.base_grand_total.to_string())
        .bind(doc.paid_amount.to_string())
        .bind(doc.outstanding_amount.to_string())
        .bind(doc.status)
        .bind(doc.update_stock)
        .bind(&doc.remarks)
        .bind(doc.sync_status)
        .bind(&doc.remote_name)
        .bind(doc.remote_modified)
        .bind(doc.updated_at)
        .bind(doc.last_synced_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn delete_lines(conn: &mut SqliteConnection, t: DocTables, id: &str) -> DbResult<()> {
    let line_tables = [Some(t.items), Some(t.taxes), t.payments, t.links];
    for table in line_tables.into_iter().flatten() {
        let sql = format!("DELETE FROM {table} WHERE parent_id = ?1");
        sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_lines(conn: &mut SqliteConnection, t: DocTables, doc: &SalesDocument) -> DbResult<()> {
    let sql = format!(
        r#"
        INSERT INTO {} (
            id, parent_id, tenant_id, company_id, idx, item_code, item_name,
            qty, uom, rate, amount, warehouse, is_stock_item
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
        t.items
    );
    for item in &doc.items {
        sqlx::query(&sql)
            .bind(&item.id)
            .bind(&doc.id)
            .bind(&doc.tenant_id)
            .bind(&doc.company_id)
            .bind(item.idx)
            .bind(&item.item_code)
            .bind(&item.item_name)
            .bind(item.qty.to_string())
            .bind(&item.uom)
            .bind(item.rate.to_string())
            .bind(item.amount.to_string())
            .bind(&item.warehouse)
            .bind(item.is_stock_item)
            .execute(&mut *conn)
            .await?;
    }

    let sql = format!(
        r#"
        INSERT INTO {} (
            id, parent_id, tenant_id, company_id, idx, description, account_head, rate, tax_amount
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        t.taxes
    );
    for tax in &doc.taxes {
        sqlx::query(&sql)
            .bind(&tax.id)
            .bind(&doc.id)
            .bind(&doc.tenant_id)
            .bind(&doc.company_id)
            .bind(tax.idx)
            .bind(&tax.description)
            .bind(&tax.account_head)
            .bind(tax.rate.to_string())
            .bind(tax.tax_amount.to_string())
            .execute(&mut *conn)
            .await?;
    }

    match t.payments {
        Some(table) => {
            let sql = format!(
                r#"
                INSERT INTO {table} (
                    id, parent_id, tenant_id, company_id, idx, mode_of_payment, account,
                    amount, payment_currency, tendered, change_amount, exchange_rate
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#
            );
            for payment in &doc.payments {
                sqlx::query(&sql)
                    .bind(&payment.id)
                    .bind(&doc.id)
                    .bind(&doc.tenant_id)
                    .bind(&doc.company_id)
                    .bind(payment.idx)
                    .bind(&payment.mode_of_payment)
                    .bind(&payment.account)
                    .bind(payment.amount.to_string())
                    .bind(&payment.payment_currency)
                    .bind(payment.tendered.to_string())
                    .bind(payment.change.to_string())
                    .bind(payment.exchange_rate.map(|r| r.to_string()))
                    .execute(&mut *conn)
                    .await?;
            }
        }
        None if !doc.payments.is_empty() => {
            return Err(DbError::invalid_data(
                "payments",
                format!("{} does not store payments", doc.doc_type),
            ));
        }
        None => {}
    }

    match t.links {
        Some(table) => {
            let sql = format!(
                r#"
                INSERT INTO {table} (id, parent_id, tenant_id, company_id, link_doctype, link_name)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#
            );
            for link in &doc.links {
                sqlx::query(&sql)
                    .bind(&link.id)
                    .bind(&doc.id)
                    .bind(&doc.tenant_id)
                    .bind(&doc.company_id)
                    .bind(link.link_doctype.as_str())
                    .bind(&link.link_name)
                    .execute(&mut *conn)
                    .await?;
            }
        }
        None if !doc.links.is_empty() => {
            return Err(DbError::invalid_data(
                "links",
                format!("{} does not store links", doc.doc_type),
            ));
        }
        None => {}
    }

    Ok(())
}

/// Rewrites paid/outstanding/status of an invoice inside the caller's transaction.
pub(crate) async fn update_payment_state(
    conn: &mut SqliteConnection,
    doc: &SalesDocument,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let t = tables(doc.doc_type)?;
    let sql = format!(
        r#"
        UPDATE {} SET paid_amount = ?2, outstanding_amount = ?3, status = ?4, updated_at = ?5
        WHERE id = ?1
        "#,
        t.header
    );
    let result = sqlx::query(&sql)
        .bind(&doc.id)
        .bind(doc.paid_amount.to_string())
        .bind(doc.outstanding_amount.to_string())
        .bind(doc.status)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(doc.doc_type.as_str(), &doc.id));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn invoice(id: &str, qty: Decimal) -> SalesDocument {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        SalesDocument {
            id: id.into(),
            doc_type: DocType::SalesInvoice,
            tenant_id: "t".into(),
            company_id: "c".into(),
            customer: "CUST-1".into(),
            customer_name: "Ana".into(),
            posting_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            currency: "NIO".into(),
            conversion_rate: Decimal::ONE,
            price_list: "Retail".into(),
            warehouse: "Main".into(),
            debit_to: "Debtors - C".into(),
            net_total: dec!(35.50) * qty,
            tax_total: Decimal::ZERO,
            grand_total: dec!(35.50) * qty,
            base_grand_total: dec!(35.50) * qty,
            paid_amount: Decimal::ZERO,
            outstanding_amount: dec!(35.50) * qty,
            status: DocumentStatus::Unpaid,
            update_stock: true,
            remarks: None,
            sync_status: SyncStatus::Pending,
            remote_name: None,
            remote_modified: None,
            push_attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
            last_synced_at: None,
            items: vec![DocumentItem {
                id: format!("{}-1", id),
                idx: 1,
                item_code: "COKE".into(),
                item_name: "Coca-Cola".into(),
                qty,
                uom: "Nos".into(),
                rate: dec!(35.50),
                amount: dec!(35.50) * qty,
                warehouse: "Main".into(),
                is_stock_item: true,
            }],
            taxes: vec![DocumentTax {
                id: format!("{}-tax", id),
                idx: 1,
                description: "IVA".into(),
                account_head: "IVA - C".into(),
                rate: dec!(0),
                tax_amount: dec!(0),
            }],
            payments: vec![DocumentPayment {
                id: format!("{}-pay", id),
                idx: 1,
                mode_of_payment: "Cash".into(),
                account: "Cash - C".into(),
                amount: dec!(10),
                payment_currency: "NIO".into(),
                tendered: dec!(10),
                change: dec!(0),
                exchange_rate: None,
            }],
            links: vec![DocumentLink {
                id: format!("{}-link", id),
                link_doctype: DocType::SalesOrder,
                link_name: "LOCAL-SO-1".into(),
            }],
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_aggregate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.documents();
        let doc = invoice("LOCAL-SINV-1", dec!(2));

        repo.insert(&doc).await.unwrap();
        let loaded = repo.get(DocType::SalesInvoice, "LOCAL-SINV-1").await.unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(repo.get(DocType::SalesOrder, "LOCAL-SINV-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_outbox_transitions() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.documents();
        let now = Utc::now();
        repo.insert(&invoice("LOCAL-SINV-1", dec!(1))).await.unwrap();
        repo.insert(&invoice("LOCAL-SINV-2", dec!(1))).await.unwrap();

        repo.mark_failed(DocType::SalesInvoice, "LOCAL-SINV-1", "timeout", now)
            .await
            .unwrap();
        assert_eq!(repo.outbox_counts(DocType::SalesInvoice, "t", "c").await.unwrap(), (1, 1));

        let failed = repo.get(DocType::SalesInvoice, "LOCAL-SINV-1").await.unwrap().unwrap();
        assert_eq!(failed.sync_status, SyncStatus::Failed);
        assert_eq!(failed.push_attempts, 1);
        assert_eq!(failed.last_error.as_deref(), Some("timeout"));

        repo.mark_synced(DocType::SalesInvoice, "LOCAL-SINV-1", "ACC-SINV-0001", Some(now), now)
            .await
            .unwrap();
        let outbox = repo.list_outbox(DocType::SalesInvoice, "t", "c").await.unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].id, "LOCAL-SINV-2");

        // A synced document cannot fall back to Failed.
        assert!(repo
            .mark_failed(DocType::SalesInvoice, "LOCAL-SINV-1", "late", now)
            .await
            .is_err());
        assert_eq!(
            repo.remote_name_of(DocType::SalesInvoice, "t", "c", "LOCAL-SINV-1")
                .await
                .unwrap()
                .as_deref(),
            Some("ACC-SINV-0001")
        );
        let found = repo
            .find(DocType::SalesInvoice, "t", "c", "ACC-SINV-0001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "LOCAL-SINV-1");
    }

    #[tokio::test]
    async fn test_upsert_pulled_adopts_local_document() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.documents();
        let local = invoice("LOCAL-SINV-1", dec!(1));
        repo.insert(&local).await.unwrap();

        let mut pulled = invoice("LOCAL-SINV-1", dec!(3));
        pulled.remote_name = Some("ACC-SINV-0009".into());
        pulled.items[0].id = "remote-line".into();
        repo.upsert_pulled(&pulled).await.unwrap();

        let stored = repo.get(DocType::SalesInvoice, "LOCAL-SINV-1").await.unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);
        assert_eq!(stored.remote_name.as_deref(), Some("ACC-SINV-0009"));
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.items[0].qty, dec!(3));

        // Pulling it again by remote name updates in place.
        let mut again = pulled.clone();
        again.id = "ACC-SINV-0009".into();
        again.grand_total = dec!(1);
        repo.upsert_pulled(&again).await.unwrap();
        let stored = repo.get(DocType::SalesInvoice, "LOCAL-SINV-1").await.unwrap().unwrap();
        assert_eq!(stored.grand_total, dec!(1));
        assert!(repo.get(DocType::SalesInvoice, "ACC-SINV-0009").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pending_stock_qty_counts_only_unsynced_stock_moves() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.documents();
        let now = Utc::now();

        repo.insert(&invoice("LOCAL-SINV-1", dec!(2))).await.unwrap();
        repo.insert(&invoice("LOCAL-SINV-2", dec!(3))).await.unwrap();
        let mut no_stock = invoice("LOCAL-SINV-3", dec!(7));
        no_stock.update_stock = false;
        repo.insert(&no_stock).await.unwrap();

        assert_eq!(repo.pending_stock_qty("t", "c", "COKE", "Main").await.unwrap(), dec!(5));

        repo.mark_synced(DocType::SalesInvoice, "LOCAL-SINV-2", "ACC-1", None, now)
            .await
            .unwrap();
        assert_eq!(repo.pending_stock_qty("t", "c", "COKE", "Main").await.unwrap(), dec!(2));
        assert_eq!(repo.pending_stock_qty("t", "c", "COKE", "Back").await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_quotation_rejects_payments() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut quote = invoice("LOCAL-QTN-1", dec!(1));
        quote.doc_type = DocType::Quotation;
        quote.links.clear();

        let err = db.documents().insert(&quote).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidData { .. }));
        assert!(db.documents().get(DocType::Quotation, "LOCAL-QTN-1").await.unwrap().is_none());
    }
}
