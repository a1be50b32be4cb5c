//! # Database Migrations
//!
//! Embedded SQL migrations for the offline data layer.
//!
//! ```text
//! migrations/sqlite/
//! ├── 001_catalog.sql          item groups, items, prices, bins, customers,
//! │                            payment modes, currency exchanges
//! ├── 002_sales_documents.sql  one header + line tables per sales doc type
//! ├── 003_payment_entries.sql  payment entries + references
//! └── 004_sync_state.sql       per (tenant, company, doc type) bookkeeping
//! ```
//!
//! Never modify an applied migration; add the next `NNN_description.sql`.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the workspace `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
///
/// Idempotent; each migration runs in its own transaction, in filename order.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
