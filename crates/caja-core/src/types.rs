//! # Domain Types
//!
//! Shared records that are neither documents nor catalog entries.
//!
//! ## Scoping
//! Every local row is scoped by `(tenant_id, company_id)`. A [`SalesScope`]
//! adds the selling context a POS terminal works in: price list, warehouse,
//! company currency and the default receivable account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::doctype::DocType;

// =============================================================================
// Sales Scope
// =============================================================================

/// Selling context of one terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesScope {
    pub tenant_id: String,
    pub company_id: String,
    pub company_currency: String,
    pub price_list: String,
    pub warehouse: String,
    /// Receivable account used when the customer has none of its own.
    pub receivable_account: String,
}

impl SalesScope {
    pub fn catalog_key(&self) -> crate::catalog::CatalogKey {
        crate::catalog::CatalogKey::new(
            self.tenant_id.clone(),
            self.company_id.clone(),
            self.price_list.clone(),
            self.warehouse.clone(),
        )
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer as mirrored from the ERP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    /// ERP name (primary key).
    pub name: String,
    pub customer_name: String,
    pub customer_group: Option<String>,
    pub default_currency: Option<String>,
    /// Receivable account for this company, when the ERP defines one.
    pub receivable_account: Option<String>,
    /// Currency of that receivable account.
    pub receivable_currency: Option<String>,
    pub disabled: bool,
    #[ts(as = "Option<String>")]
    pub remote_modified: Option<DateTime<Utc>>,
}

// =============================================================================
// Sync State
// =============================================================================

/// Per (tenant, company, doc type) sync bookkeeping.
///
/// `is_in_progress` is an advisory flag: it is set when a unit starts and is
/// always cleared when the unit finishes, whatever the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncState {
    pub tenant_id: String,
    pub company_id: String,
    pub doc_type: DocType,
    #[ts(as = "Option<String>")]
    pub last_pull_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub last_push_at: Option<DateTime<Utc>>,
    /// When counters were last refreshed at the end of a unit run.
    #[ts(as = "Option<String>")]
    pub last_sync_at: Option<DateTime<Utc>>,
    pub pending_count: i64,
    pub failed_count: i64,
    pub is_in_progress: bool,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    /// A zeroed record, as created on first access.
    pub fn new(tenant_id: &str, company_id: &str, doc_type: DocType, now: DateTime<Utc>) -> Self {
        SyncState {
            tenant_id: tenant_id.to_string(),
            company_id: company_id.to_string(),
            doc_type,
            last_pull_at: None,
            last_push_at: None,
            last_sync_at: None,
            pending_count: 0,
            failed_count: 0,
            is_in_progress: false,
            last_error: None,
            updated_at: now,
        }
    }

    pub fn has_outbox(&self) -> bool {
        self.pending_count > 0 || self.failed_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sync_state_is_zeroed() {
        let state = SyncState::new("t", "c", DocType::Item, Utc::now());
        assert_eq!(state.pending_count, 0);
        assert_eq!(state.failed_count, 0);
        assert!(!state.is_in_progress);
        assert!(state.last_pull_at.is_none());
        assert!(!state.has_outbox());
    }
}
