//! # Repository Module
//!
//! SQLite repositories for the offline data layer.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  master data (pulled, upserted by ERP name)                             │
//! │    CatalogRepository        item_groups, items, item_prices, bins       │
//! │    CustomerRepository       customers                                   │
//! │    PaymentModeRepository    payment_modes                               │
//! │    ExchangeRateRepository   currency_exchanges                          │
//! │                                                                         │
//! │  transactional (created offline, pushed, also pulled)                   │
//! │    DocumentRepository       quotations, orders, delivery notes, invoices│
//! │    PaymentEntryRepository   payment_entries (+ references)              │
//! │                                                                         │
//! │  bookkeeping                                                            │
//! │    SyncStateRepository      sync_state                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each repository holds a cloned pool handle and is cheap to create; get
//! them from [`Database`](crate::Database).

pub mod catalog;
pub mod customer;
pub mod document;
pub mod exchange;
mod outbox;
pub mod payment_entry;
pub mod payment_mode;
pub mod sync_state;
