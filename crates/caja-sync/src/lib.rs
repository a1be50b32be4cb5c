//! # caja-sync: Sync Engine for Caja
//!
//! Moves data between the local SQLite store and the remote ERP. Masters are
//! pulled, documents created offline are pushed, and every doc type keeps
//! its own sync state.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  SyncAgent (background task)                     │  │
//! │  │  interval + on-demand trigger, one pass at a time                │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      SyncOrchestrator                            │  │
//! │  │  fixed dependency order, failures isolated per unit              │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               ▼                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ run_unit()     │  │   mapping      │  │   RemoteClient         │    │
//! │  │                │  │                │  │                        │    │
//! │  │ pull → push    │─►│ ERP JSON ↔     │─►│ ErpHttpClient          │    │
//! │  │ state always   │  │ local records  │  │ (reqwest, token auth)  │    │
//! │  │ cleared        │  │                │  │                        │    │
//! │  └───────┬────────┘  └────────────────┘  └────────────────────────┘    │
//! │          ▼                                                              │
//! │   caja-db repositories (sync_state, documents, masters)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - Background `SyncAgent` and its handle
//! - [`config`] - TOML configuration (remote, scope, retry policy)
//! - [`error`] - Sync and remote error types
//! - [`mapping`] - ERP records to local types and back
//! - [`orchestrator`] - Full-pass sequencing and reporting
//! - [`remote`] - ERP client trait and HTTP implementation
//! - [`unit`] - Per-doc-type pull/push and the shared run wrapper
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use caja_core::{CatalogCache, SystemClock};
//! use caja_db::{Database, DbConfig};
//! use caja_sync::{ErpHttpClient, SyncConfig, SyncContext, SyncOrchestrator};
//!
//! let config = SyncConfig::load(None)?;
//! let db = Database::new(DbConfig::new(&config.database.path)).await?;
//! let remote = Arc::new(ErpHttpClient::new(&config.remote)?);
//! let ctx = SyncContext::new(db, remote, Arc::new(SystemClock), &config);
//!
//! let orchestrator = SyncOrchestrator::new(ctx, Arc::new(CatalogCache::new()));
//! let report = orchestrator.run_pass().await;
//! println!("failed: {:?}", report.failed);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod error;
pub mod mapping;
pub mod orchestrator;
pub mod remote;
pub mod unit;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{AgentStatus, NoOpEmitter, SyncAgent, SyncAgentHandle, SyncEventEmitter};
pub use config::{DatabaseSettings, RemoteSettings, ScopeSettings, SyncConfig, SyncSettings};
pub use error::{RemoteError, RemoteResult, SyncError, SyncResult};
pub use orchestrator::{SyncOrchestrator, SyncReport};
pub use remote::{ErpHttpClient, FilterOp, ListQuery, RemoteAck, RemoteClient};
pub use unit::{run_unit, DocTypeSyncUnit, SyncContext, UnitReport};
