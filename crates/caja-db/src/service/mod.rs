//! # Service Module
//!
//! Operations that span more than one repository.
//!
//! - [`catalog`] - Read-through catalog snapshots over [`CatalogCache`](caja_core::CatalogCache)
//! - [`offline`] - Offline document creation with atomic stock decrement

pub mod catalog;
pub mod offline;
