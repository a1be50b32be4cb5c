//! # caja-db: Local Storage for the Offline POS Data Layer
//!
//! SQLite persistence for master data pulled from the ERP, documents created
//! at the till, and per-doc-type sync bookkeeping.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja Data Flow                                   │
//! │                                                                         │
//! │  till: create_invoice_offline            caja-sync: pull / push         │
//! │       │                                        │                        │
//! │       ▼                                        ▼                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     caja-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ catalog       │    │  (embedded)  │  │   │
//! │  │   │               │    │ documents     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ payment_entry │    │ 001_catalog  │  │   │
//! │  │   │ WAL, FKs on   │    │ sync_state    │    │ 002_sales... │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │            ▲                                                   │   │
//! │  │   ┌────────┴──────────────────────────────┐                    │   │
//! │  │   │ service: CatalogService,              │                    │   │
//! │  │   │          OfflineDocumentFactory       │                    │   │
//! │  │   └───────────────────────────────────────┘                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per table family
//! - [`service`] - Catalog snapshots and the offline document factory
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caja_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("caja.db")).await?;
//!
//! let customer = db.customers().get(tenant, company, "CUST-0001").await?;
//! let outbox = db.documents().list_outbox(DocType::SalesInvoice, tenant, company).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

mod codec;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, DbLocation};

// Repository re-exports for convenience
pub use repository::catalog::{CatalogRepository, ItemPrice};
pub use repository::customer::CustomerRepository;
pub use repository::document::DocumentRepository;
pub use repository::exchange::{CurrencyExchange, ExchangeRateRepository};
pub use repository::payment_entry::PaymentEntryRepository;
pub use repository::payment_mode::PaymentModeRepository;
pub use repository::sync_state::SyncStateRepository;

pub use service::catalog::CatalogService;
pub use service::offline::OfflineDocumentFactory;
