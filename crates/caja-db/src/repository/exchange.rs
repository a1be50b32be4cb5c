//! # Currency Exchange Repository
//!
//! Stores ERP Currency Exchange records and turns them into a
//! [`RateTable`] for the resolver. For each pair the most recent record on
//! or before the requested date wins.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};

use crate::codec;
use crate::error::DbResult;
use caja_core::RateTable;

/// One Currency Exchange record.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyExchange {
    pub name: String,
    pub from_currency: String,
    pub to_currency: String,
    pub exchange_rate: Decimal,
    pub date: NaiveDate,
    pub remote_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ExchangeRateRepository {
    pool: SqlitePool,
}

impl ExchangeRateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ExchangeRateRepository { pool }
    }

    pub async fn upsert(
        &self,
        tenant_id: &str,
        company_id: &str,
        record: &CurrencyExchange,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO currency_exchanges (
                tenant_id, company_id, name, from_currency, to_currency,
                exchange_rate, date, remote_modified, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (tenant_id, company_id, name) DO UPDATE SET
                from_currency = excluded.from_currency,
                to_currency = excluded.to_currency,
                exchange_rate = excluded.exchange_rate,
                date = excluded.date,
                remote_modified = excluded.remote_modified,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(&record.name)
        .bind(record.from_currency.to_uppercase())
        .bind(record.to_currency.to_uppercase())
        .bind(record.exchange_rate.to_string())
        .bind(record.date)
        .bind(record.remote_modified)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Rates effective on `on`.
    pub async fn rate_table(
        &self,
        tenant_id: &str,
        company_id: &str,
        on: NaiveDate,
    ) -> DbResult<RateTable> {
        let rows = sqlx::query(
            r#"
            SELECT from_currency, to_currency, exchange_rate
            FROM currency_exchanges
            WHERE tenant_id = ?1 AND company_id = ?2 AND date <= ?3
            ORDER BY date, name
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(on)
        .fetch_all(&self.pool)
        .await?;

        let mut table = RateTable::new();
        for row in &rows {
            let from: String = row.try_get("from_currency")?;
            let to: String = row.try_get("to_currency")?;
            table.insert(&from, &to, codec::decimal(row, "exchange_rate")?);
        }
        Ok(table)
    }
}
