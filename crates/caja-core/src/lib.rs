//! # caja-core: Pure Business Logic for the Offline POS Data Layer
//!
//! Everything in this crate is deterministic and free of I/O: rounding,
//! rate resolution, payment allocation, catalog snapshots and document
//! construction. Storage lives in `caja-db`, remote calls in `caja-sync`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Caja Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                caja-sync (orchestrator, units, ERP client)      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        caja-db (SQLite, repositories, offline factory)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                ★ caja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐ ┌──────────┐ ┌────────────┐ ┌─────────────────┐  │   │
//! │  │  │ currency │ │ exchange │ │ allocation │ │ catalog (cache) │  │   │
//! │  │  └──────────┘ └──────────┘ └────────────┘ └─────────────────┘  │   │
//! │  │  ┌──────────┐ ┌──────────┐ ┌────────────┐ ┌─────────────────┐  │   │
//! │  │  │documents │ │validation│ │  doctype   │ │ clock, ids      │  │   │
//! │  │  └──────────┘ └──────────┘ └────────────┘ └─────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`currency`] - Per-currency scale and the single rounding primitive
//! - [`exchange`] - Direct/inverse rate resolution with an explicit cache
//! - [`allocation`] - Multi-currency payment allocation
//! - [`catalog`] - Catalog snapshots and the TTL-less catalog cache
//! - [`documents`] - Sales document and payment entry builders
//! - [`validation`] - Customer/item/stock rules
//! - [`doctype`] - Doc types, sync order and status enums
//! - [`types`] - Customer, sales scope, sync state
//! - [`clock`], [`ids`] - Injected time source and local identifiers
//!
//! ## Example Usage
//!
//! ```rust
//! use caja_core::currency::CurrencyPrecision;
//! use caja_core::exchange::{ExchangeRateResolver, RateTable};
//! use rust_decimal::Decimal;
//!
//! let precision = CurrencyPrecision::new();
//! let rates = ExchangeRateResolver::new(RateTable::new().with_rate("USD", "NIO", Decimal::new(365, 1)));
//!
//! let rate = rates.rate("USD", "NIO").unwrap();
//! let converted = precision.round(Decimal::new(20, 0) * rate, "NIO");
//! assert_eq!(converted, Decimal::new(73000, 2));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod catalog;
pub mod clock;
pub mod currency;
pub mod doctype;
pub mod documents;
pub mod error;
pub mod exchange;
pub mod ids;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use allocation::{
    PaymentAllocation, PaymentAllocationEngine, PaymentModeAccount, PaymentModeKind, Receivable,
    TenderLine,
};
pub use catalog::{CatalogCache, CatalogItem, CatalogKey, CatalogSnapshot, ItemGroup};
pub use clock::{Clock, FixedClock, SystemClock};
pub use currency::{CurrencyPrecision, CurrencySpec, RoundingMode};
pub use doctype::{DocTables, DocType, DocumentStatus, SyncStatus};
pub use documents::{
    DocumentRequest, LineRequest, LinkRequest, PaymentEntry, PaymentEntryRequest, SalesDocument,
    TaxRequest,
};
pub use error::{CoreError, CoreResult, ValidationError};
pub use exchange::{ExchangeRateResolver, RateSource, RateTable};
pub use ids::{is_local_id, new_local_id};
pub use types::{Customer, SalesScope, SyncState};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default tenant ID for single-tenant installs.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";
