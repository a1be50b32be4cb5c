//! # Database Handle
//!
//! One SQLite file per till, shared by the offline document factory and the
//! sync units.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  till (OfflineDocumentFactory)        sync (run_unit per doc type)      │
//! │     create_*_offline                     pull masters, mark outbox      │
//! │            │                                      │                     │
//! │            └──────────────┬───────────────────────┘                     │
//! │                           ▼                                             │
//! │                 Database (SqlitePool, WAL)                              │
//! │                           │                                             │
//! │   readers run side by side; one writer at a time, the next one waits   │
//! │   up to busy_timeout for the lock                                       │
//! │                           │                                             │
//! │       ├── db.catalog()          ├── db.documents()                      │
//! │       ├── db.customers()        ├── db.payment_entries()                │
//! │       ├── db.payment_modes()    └── db.sync_state()                     │
//! │       └── db.exchange_rates()                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock decrements re-read bins while holding the write lock, so the
//! single-writer rule is what keeps two sales from selling the same unit.

use std::path::PathBuf;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::catalog::CatalogRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::document::DocumentRepository;
use crate::repository::exchange::ExchangeRateRepository;
use crate::repository::payment_entry::PaymentEntryRepository;
use crate::repository::payment_mode::PaymentModeRepository;
use crate::repository::sync_state::SyncStateRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where the till's data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    /// Private to one connection; gone when it closes.
    Memory,
}

/// Database configuration.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/caja/till-01.db")
///     .max_connections(4)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: DbLocation,

    /// Default 4: the till, the sync agent and headroom for status reads.
    pub max_connections: u32,

    /// How long a writer waits for another writer's lock before failing.
    pub busy_timeout: Duration,

    /// How long a caller waits for a free pooled connection.
    pub acquire_timeout: Duration,

    /// Apply embedded migrations when the pool opens.
    pub migrate: bool,
}

impl DbConfig {
    /// A file-backed database, created on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: DbLocation::File(path.into()),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(30),
            migrate: true,
        }
    }

    /// A migrated, throwaway database on a single connection (tests, demos).
    pub fn in_memory() -> Self {
        DbConfig {
            location: DbLocation::Memory,
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Opens the schema as found; for tools that inspect an existing file.
    pub fn without_migrations(mut self) -> Self {
        self.migrate = false;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = SqliteConnectOptions::new()
            .busy_timeout(self.busy_timeout)
            // Line tables cascade from their header.
            .foreign_keys(true);

        match &self.location {
            DbLocation::File(path) => options
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
            DbLocation::Memory => options.in_memory(true),
        }
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout);

        match self.location {
            DbLocation::File(_) => options
                .min_connections(1)
                .idle_timeout(Some(Duration::from_secs(600))),
            // The only connection is the database; never let it be recycled.
            DbLocation::Memory => options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
        }
    }

    fn describe(&self) -> String {
        match &self.location {
            DbLocation::File(path) => path.display().to_string(),
            DbLocation::Memory => ":memory:".to_string(),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the till's database; clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) and migrates the database.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let target = config.describe();
        info!(path = %target, "Opening database");

        let pool = config
            .pool_options()
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(format!("{}: {}", target, e)))?;
        debug!(
            max_connections = config.max_connections,
            busy_timeout = ?config.busy_timeout,
            "Database pool ready"
        );

        let db = Database { pool };
        if config.migrate {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending embedded migrations; already-applied ones are skipped.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// The underlying pool, for transactions spanning several repositories.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn payment_modes(&self) -> PaymentModeRepository {
        PaymentModeRepository::new(self.pool.clone())
    }

    pub fn exchange_rates(&self) -> ExchangeRateRepository {
        ExchangeRateRepository::new(self.pool.clone())
    }

    /// Quotations, orders, delivery notes and invoices.
    pub fn documents(&self) -> DocumentRepository {
        DocumentRepository::new(self.pool.clone())
    }

    pub fn payment_entries(&self) -> PaymentEntryRepository {
        PaymentEntryRepository::new(self.pool.clone())
    }

    pub fn sync_state(&self) -> SyncStateRepository {
        SyncStateRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    /// True when a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        let (total, applied) = crate::migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 4);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let result = sqlx::query(
            "INSERT INTO quotation_taxes (id, parent_id, tenant_id, company_id, idx, description, account_head, rate, tax_amount) \
             VALUES ('x', 'missing', 't', 'c', 1, 'IVA', 'IVA - C', '15', '0')",
        )
        .execute(db.pool())
        .await;
        assert!(matches!(
            result.map_err(DbError::from),
            Err(DbError::ForeignKeyViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("till.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.sync_state()
            .get_or_create("t", "c", caja_core::DocType::Item, chrono::Utc::now())
            .await
            .unwrap();
        db.close().await;

        let reopened = Database::new(DbConfig::new(&path).without_migrations()).await.unwrap();
        assert_eq!(reopened.sync_state().list("t", "c").await.unwrap().len(), 1);
    }

    #[test]
    fn test_memory_pool_is_pinned_to_one_connection() {
        let config = DbConfig::in_memory().max_connections(8);
        assert_eq!(config.location, DbLocation::Memory);
        assert_eq!(config.pool_options().get_max_connections(), 1);

        let file = DbConfig::new("/tmp/till.db").busy_timeout(Duration::from_secs(10));
        assert_eq!(file.pool_options().get_max_connections(), 4);
        assert_eq!(file.busy_timeout, Duration::from_secs(10));
        assert_eq!(file.describe(), "/tmp/till.db");
    }
}
