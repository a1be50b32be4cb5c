//! # Catalog Repository
//!
//! Item groups, items, price-list rates and warehouse bins mirrored from the
//! ERP, plus the local stock decrement applied by stock-moving documents.
//!
//! ## Stock Projection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  bins.remote_qty  ← last quantity reported by the ERP                   │
//! │  bins.actual_qty  ← what the till may still sell                        │
//! │                                                                         │
//! │  pull Bin       actual = remote − Σ qty on unsynced stock-moving lines  │
//! │  offline sale   actual = actual − qty   (same transaction as the doc)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::codec;
use crate::error::DbResult;
use caja_core::validation::STOCK_EPSILON;
use caja_core::{CatalogItem, CatalogKey, CatalogSnapshot, ItemGroup, ValidationError};

/// A price-list rate for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPrice {
    /// ERP name of the Item Price record.
    pub name: String,
    pub item_code: String,
    pub price_list: String,
    pub currency: Option<String>,
    pub rate: Decimal,
    pub remote_modified: Option<DateTime<Utc>>,
}

/// Repository for catalog master data.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Upserts (pull side)
    // =========================================================================

    pub async fn upsert_item_group(
        &self,
        tenant_id: &str,
        company_id: &str,
        group: &ItemGroup,
        remote_modified: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_groups (
                tenant_id, company_id, name, parent, is_group, remote_modified, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (tenant_id, company_id, name) DO UPDATE SET
                parent = excluded.parent,
                is_group = excluded.is_group,
                remote_modified = excluded.remote_modified,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(&group.name)
        .bind(&group.parent)
        .bind(group.is_group)
        .bind(remote_modified)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn upsert_item(
        &self,
        tenant_id: &str,
        company_id: &str,
        item: &CatalogItem,
        remote_modified: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(item_code = %item.item_code, "Upserting item");

        sqlx::query(
            r#"
            INSERT INTO items (
                tenant_id, company_id, item_code, item_name, item_group, stock_uom,
                is_stock_item, disabled, allow_negative_stock, remote_modified, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (tenant_id, company_id, item_code) DO UPDATE SET
                item_name = excluded.item_name,
                item_group = excluded.item_group,
                stock_uom = excluded.stock_uom,
                is_stock_item = excluded.is_stock_item,
                disabled = excluded.disabled,
                allow_negative_stock = excluded.allow_negative_stock,
                remote_modified = excluded.remote_modified,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(&item.item_code)
        .bind(&item.item_name)
        .bind(&item.item_group)
        .bind(&item.stock_uom)
        .bind(item.is_stock_item)
        .bind(item.disabled)
        .bind(item.allow_negative_stock)
        .bind(remote_modified)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn upsert_item_price(
        &self,
        tenant_id: &str,
        company_id: &str,
        price: &ItemPrice,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_prices (
                tenant_id, company_id, name, item_code, price_list, currency,
                price_list_rate, remote_modified, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (tenant_id, company_id, name) DO UPDATE SET
                item_code = excluded.item_code,
                price_list = excluded.price_list,
                currency = excluded.currency,
                price_list_rate = excluded.price_list_rate,
                remote_modified = excluded.remote_modified,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(&price.name)
        .bind(&price.item_code)
        .bind(&price.price_list)
        .bind(&price.currency)
        .bind(price.rate.to_string())
        .bind(price.remote_modified)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stores a remote bin quantity and re-projects the local one.
    ///
    /// `pending_qty` is the quantity still held by unsynced stock-moving
    /// documents for this item and warehouse.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_bin(
        &self,
        tenant_id: &str,
        company_id: &str,
        item_code: &str,
        warehouse: &str,
        remote_qty: Decimal,
        pending_qty: Decimal,
        remote_modified: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let actual = remote_qty - pending_qty;
        debug!(
            item_code = %item_code,
            warehouse = %warehouse,
            remote = %remote_qty,
            actual = %actual,
            "Projecting bin"
        );

        sqlx::query(
            r#"
            INSERT INTO bins (
                tenant_id, company_id, item_code, warehouse, actual_qty, remote_qty,
                remote_modified, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (tenant_id, company_id, item_code, warehouse) DO UPDATE SET
                actual_qty = excluded.actual_qty,
                remote_qty = excluded.remote_qty,
                remote_modified = excluded.remote_modified,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(item_code)
        .bind(warehouse)
        .bind(actual.to_string())
        .bind(remote_qty.to_string())
        .bind(remote_modified)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_item(
        &self,
        tenant_id: &str,
        company_id: &str,
        item_code: &str,
    ) -> DbResult<Option<CatalogItem>> {
        let row = sqlx::query(
            r#"
            SELECT item_code, item_name, item_group, stock_uom,
                   is_stock_item, disabled, allow_negative_stock
            FROM items
            WHERE tenant_id = ?1 AND company_id = ?2 AND item_code = ?3
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(item_code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(item_from_row).transpose()
    }

    /// Local quantity for one item, zero when the bin is unknown.
    pub async fn actual_qty(
        &self,
        tenant_id: &str,
        company_id: &str,
        item_code: &str,
        warehouse: &str,
    ) -> DbResult<Decimal> {
        let mut conn = self.pool.acquire().await?;
        actual_qty(&mut conn, tenant_id, company_id, item_code, warehouse).await
    }

    /// Assembles the catalog view for one key from local storage.
    pub async fn load_snapshot(
        &self,
        key: &CatalogKey,
        built_at: DateTime<Utc>,
    ) -> DbResult<CatalogSnapshot> {
        let mut snapshot = CatalogSnapshot::new(key.clone(), built_at);

        let groups = sqlx::query(
            r#"
            SELECT name, parent, is_group
            FROM item_groups
            WHERE tenant_id = ?1 AND company_id = ?2
            ORDER BY name
            "#,
        )
        .bind(&key.tenant_id)
        .bind(&key.company_id)
        .fetch_all(&self.pool)
        .await?;
        for row in &groups {
            snapshot.groups.push(ItemGroup {
                name: row.try_get("name")?,
                parent: row.try_get("parent")?,
                is_group: row.try_get("is_group")?,
            });
        }

        let items = sqlx::query(
            r#"
            SELECT item_code, item_name, item_group, stock_uom,
                   is_stock_item, disabled, allow_negative_stock
            FROM items
            WHERE tenant_id = ?1 AND company_id = ?2
            "#,
        )
        .bind(&key.tenant_id)
        .bind(&key.company_id)
        .fetch_all(&self.pool)
        .await?;
        for row in &items {
            let item = item_from_row(row)?;
            snapshot.items.insert(item.item_code.clone(), item);
        }

        // Latest record wins when a price list carries several rates for one item.
        let prices = sqlx::query(
            r#"
            SELECT item_code, price_list_rate
            FROM item_prices
            WHERE tenant_id = ?1 AND company_id = ?2 AND price_list = ?3
            ORDER BY remote_modified, updated_at
            "#,
        )
        .bind(&key.tenant_id)
        .bind(&key.company_id)
        .bind(&key.price_list)
        .fetch_all(&self.pool)
        .await?;
        for row in &prices {
            snapshot
                .prices
                .insert(row.try_get("item_code")?, codec::decimal(row, "price_list_rate")?);
        }

        let bins = sqlx::query(
            r#"
            SELECT item_code, actual_qty
            FROM bins
            WHERE tenant_id = ?1 AND company_id = ?2 AND warehouse = ?3
            "#,
        )
        .bind(&key.tenant_id)
        .bind(&key.company_id)
        .bind(&key.warehouse)
        .fetch_all(&self.pool)
        .await?;
        for row in &bins {
            snapshot
                .stock
                .insert(row.try_get("item_code")?, codec::decimal(row, "actual_qty")?);
        }

        debug!(
            key = %key,
            groups = snapshot.groups.len(),
            items = snapshot.items.len(),
            prices = snapshot.prices.len(),
            bins = snapshot.stock.len(),
            "Catalog snapshot assembled"
        );

        Ok(snapshot)
    }
}

fn item_from_row(row: &SqliteRow) -> DbResult<CatalogItem> {
    Ok(CatalogItem {
        item_code: row.try_get("item_code")?,
        item_name: row.try_get("item_name")?,
        item_group: row.try_get("item_group")?,
        stock_uom: row.try_get("stock_uom")?,
        is_stock_item: row.try_get("is_stock_item")?,
        disabled: row.try_get("disabled")?,
        allow_negative_stock: row.try_get("allow_negative_stock")?,
    })
}

async fn actual_qty(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    company_id: &str,
    item_code: &str,
    warehouse: &str,
) -> DbResult<Decimal> {
    let qty: Option<String> = sqlx::query_scalar(
        r#"
        SELECT actual_qty FROM bins
        WHERE tenant_id = ?1 AND company_id = ?2 AND item_code = ?3 AND warehouse = ?4
        "#,
    )
    .bind(tenant_id)
    .bind(company_id)
    .bind(item_code)
    .bind(warehouse)
    .fetch_optional(&mut *conn)
    .await?;

    qty.map(|q| codec::parse_decimal("actual_qty", &q))
        .transpose()
        .map(Option::unwrap_or_default)
}

/// Stock rules of an item as mirrored locally: `(is_stock_item, allow_negative_stock)`.
///
/// Unknown items are treated as tracked without negative stock.
async fn stock_policy(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    company_id: &str,
    item_code: &str,
) -> DbResult<(bool, bool)> {
    let row = sqlx::query(
        r#"
        SELECT is_stock_item, allow_negative_stock FROM items
        WHERE tenant_id = ?1 AND company_id = ?2 AND item_code = ?3
        "#,
    )
    .bind(tenant_id)
    .bind(company_id)
    .bind(item_code)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok((row.try_get("is_stock_item")?, row.try_get("allow_negative_stock")?)),
        None => Ok((true, false)),
    }
}

/// Subtracts `qty` from the local bin inside the caller's transaction.
///
/// The bin is re-read here. Call it only after the transaction has written,
/// so it holds SQLite's write lock and no other sale reads the same quantity.
/// Items that forbid negative stock fail with `InsufficientStock`; a missing
/// bin reads as zero.
pub(crate) async fn decrement_stock(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    company_id: &str,
    item_code: &str,
    warehouse: &str,
    qty: Decimal,
    now: DateTime<Utc>,
) -> DbResult<Decimal> {
    let current = actual_qty(conn, tenant_id, company_id, item_code, warehouse).await?;
    let (tracked, negative_ok) = stock_policy(conn, tenant_id, company_id, item_code).await?;

    if tracked && !negative_ok && current.saturating_add(STOCK_EPSILON) < qty {
        debug!(item_code = %item_code, warehouse = %warehouse, available = %current, requested = %qty, "Stock decrement refused");
        return Err(ValidationError::InsufficientStock {
            item: item_code.to_string(),
            available: current,
            requested: qty,
        }
        .into());
    }

    let next = current
        .checked_sub(qty)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: format!("stock for {}", item_code),
        })?;

    sqlx::query(
        r#"
        INSERT INTO bins (tenant_id, company_id, item_code, warehouse, actual_qty, remote_qty, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, '0', ?6)
        ON CONFLICT (tenant_id, company_id, item_code, warehouse) DO UPDATE SET
            actual_qty = excluded.actual_qty,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(tenant_id)
    .bind(company_id)
    .bind(item_code)
    .bind(warehouse)
    .bind(next.to_string())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(item_code = %item_code, warehouse = %warehouse, from = %current, to = %next, "Stock decremented");
    Ok(next)
}

// =============================================================================
// Unit Tests
// =============================================================================
