//! # Sync Orchestrator
//!
//! Runs every registered unit once, in dependency order, and collects the
//! outcome into a [`SyncReport`].
//!
//! ## Pass
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reset stale in-progress flags                                          │
//! │                                                                         │
//! │  ItemGroup → Item → ItemPrice → Bin          catalog-affecting          │
//! │  CurrencyExchange → ModeOfPayment → Customer                            │
//! │  Quotation → SalesOrder → DeliveryNote → SalesInvoice → PaymentEntry    │
//! │                                                                         │
//! │  each unit: run_unit() ──► synced | failed                              │
//! │             a failing or panicking unit never stops the ones after it   │
//! │                                                                         │
//! │  catalog unit changed or failed ──► CatalogCache::invalidate_scope      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Passes are serialised by an internal lock; a second caller waits for the
//! running pass to finish instead of interleaving with it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use ts_rs::TS;

use caja_core::{CatalogCache, DocType, SyncState};

use crate::error::SyncResult;
use crate::unit::{run_unit, SyncContext, UnitReport};

// =============================================================================
// Sync Report
// =============================================================================

/// Outcome of one full pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncReport {
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub finished_at: DateTime<Utc>,
    pub synced: Vec<DocType>,
    pub failed: Vec<DocType>,
    pub units: Vec<UnitReport>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn unit(&self, doc_type: DocType) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.doc_type == doc_type)
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct SyncOrchestrator {
    ctx: SyncContext,
    catalog: Arc<CatalogCache>,
    units: Vec<DocType>,
    pass_lock: Mutex<()>,
}

impl SyncOrchestrator {
    /// An orchestrator over every doc type.
    pub fn new(ctx: SyncContext, catalog: Arc<CatalogCache>) -> Self {
        Self::with_units(ctx, catalog, DocType::SYNC_ORDER.to_vec())
    }

    /// An orchestrator over a subset; the subset still runs in sync order.
    pub fn with_units(ctx: SyncContext, catalog: Arc<CatalogCache>, mut units: Vec<DocType>) -> Self {
        units.sort_by_key(|d| d.sync_rank());
        units.dedup();
        SyncOrchestrator {
            ctx,
            catalog,
            units,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn units(&self) -> &[DocType] {
        &self.units
    }

    /// Runs one full pass over the registered units.
    pub async fn run_pass(&self) -> SyncReport {
        let _pass = self.pass_lock.lock().await;
        let started_at = self.ctx.clock.now();
        info!(
            tenant_id = %self.ctx.tenant_id(),
            company_id = %self.ctx.company_id(),
            units = self.units.len(),
            "Sync pass starting"
        );

        if let Err(e) = self
            .ctx
            .db
            .sync_state()
            .reset_in_progress(self.ctx.tenant_id(), self.ctx.company_id(), started_at)
            .await
        {
            warn!(error = %e, "Failed to reset stale in-progress flags");
        }

        let mut report = SyncReport {
            started_at,
            finished_at: started_at,
            synced: Vec::new(),
            failed: Vec::new(),
            units: Vec::with_capacity(self.units.len()),
        };

        for doc_type in &self.units {
            let unit = self.run_guarded(*doc_type).await;
            if unit.success {
                report.synced.push(*doc_type);
            } else {
                report.failed.push(*doc_type);
            }
            report.units.push(unit);
        }

        report.finished_at = self.ctx.clock.now();
        if report.is_success() {
            info!(synced = report.synced.len(), "Sync pass finished");
        } else {
            warn!(
                synced = report.synced.len(),
                failed = ?report.failed,
                "Sync pass finished with failures"
            );
        }
        report
    }

    /// Runs a single unit outside a full pass.
    pub async fn sync_unit(&self, doc_type: DocType) -> UnitReport {
        let _pass = self.pass_lock.lock().await;
        self.run_guarded(doc_type).await
    }

    /// Current sync state of every doc type in the scope.
    pub async fn states(&self) -> SyncResult<Vec<SyncState>> {
        Ok(self
            .ctx
            .db
            .sync_state()
            .list(self.ctx.tenant_id(), self.ctx.company_id())
            .await?)
    }

    async fn run_guarded(&self, doc_type: DocType) -> UnitReport {
        let report = match AssertUnwindSafe(run_unit(&self.ctx, doc_type))
            .catch_unwind()
            .await
        {
            Ok(report) => report,
            Err(_) => {
                error!(doc_type = %doc_type, "Sync unit escaped its own guard");
                UnitReport::failed(doc_type, "sync unit aborted")
            }
        };

        if doc_type.is_catalog_affecting() && (report.changed || !report.success) {
            let evicted = self
                .catalog
                .invalidate_scope(self.ctx.tenant_id(), self.ctx.company_id());
            info!(doc_type = %doc_type, evicted, "Catalog cache invalidated");
        }
        report
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("ctx", &self.ctx)
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::unit::fixtures::*;
    use caja_core::{CatalogSnapshot, SyncStatus};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_full_pass_syncs_everything() {
        let remote = Arc::new(erp());
        let (ctx, _) = context(remote.clone()).await;
        pull_masters(&ctx).await;
        let invoice = factory(&ctx).create_invoice_offline(&sale("COKE", dec!(1))).await.unwrap();

        let orchestrator = SyncOrchestrator::new(ctx.clone(), Arc::new(CatalogCache::new()));
        let report = orchestrator.run_pass().await;

        assert!(report.is_success(), "{:?}", report.failed);
        assert_eq!(report.synced, DocType::SYNC_ORDER.to_vec());
        assert_eq!(report.unit(DocType::SalesInvoice).unwrap().pushed, 1);
        assert!(report.finished_at >= report.started_at);

        let stored = ctx.db.documents().get(DocType::SalesInvoice, &invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);

        let states = orchestrator.states().await.unwrap();
        assert_eq!(states.len(), DocType::SYNC_ORDER.len());
        assert!(states.iter().all(|s| !s.is_in_progress && s.last_error.is_none()));
    }

    #[tokio::test]
    async fn test_failing_unit_does_not_stop_the_pass() {
        let remote = Arc::new(erp());
        remote.fail_list(DocType::Bin, RemoteError::Timeout);
        remote.panicking_lists.lock().unwrap().push(DocType::Customer);
        let (ctx, _) = context(remote).await;

        let orchestrator = SyncOrchestrator::new(ctx, Arc::new(CatalogCache::new()));
        let report = orchestrator.run_pass().await;

        assert!(!report.is_success());
        assert_eq!(report.failed, vec![DocType::Bin, DocType::Customer]);
        assert_eq!(report.synced.len(), DocType::SYNC_ORDER.len() - 2);
        assert!(report.synced.contains(&DocType::PaymentEntry));

        let states = orchestrator.states().await.unwrap();
        assert!(states.iter().all(|s| !s.is_in_progress));
        let bin = states.iter().find(|s| s.doc_type == DocType::Bin).unwrap();
        assert!(bin.last_error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_stale_in_progress_flag_is_cleared() {
        let (ctx, _) = context(Arc::new(erp())).await;
        ctx.db
            .sync_state()
            .set_in_progress("t", COMPANY, DocType::Item, true, t0())
            .await
            .unwrap();

        let orchestrator =
            SyncOrchestrator::with_units(ctx, Arc::new(CatalogCache::new()), vec![DocType::Item]);
        orchestrator.run_pass().await;

        let states = orchestrator.states().await.unwrap();
        let item = states.iter().find(|s| s.doc_type == DocType::Item).unwrap();
        assert!(!item.is_in_progress);
    }

    #[tokio::test]
    async fn test_units_run_in_dependency_order() {
        let (ctx, _) = context(Arc::new(erp())).await;
        let orchestrator = SyncOrchestrator::with_units(
            ctx,
            Arc::new(CatalogCache::new()),
            vec![DocType::SalesInvoice, DocType::Item, DocType::Customer, DocType::Item],
        );
        assert_eq!(
            orchestrator.units(),
            &[DocType::Item, DocType::Customer, DocType::SalesInvoice]
        );
    }

    #[tokio::test]
    async fn test_catalog_changes_invalidate_the_cache() {
        let remote = Arc::new(erp());
        let (ctx, _) = context(remote.clone()).await;
        let cache = Arc::new(CatalogCache::new());
        let key = scope().catalog_key();
        cache.put(&key, CatalogSnapshot::new(key.clone(), t0()));

        let orchestrator =
            SyncOrchestrator::with_units(ctx, cache.clone(), vec![DocType::Customer]);
        orchestrator.run_pass().await;
        assert!(cache.get(&key).is_some());

        let orchestrator = SyncOrchestrator::with_units(
            orchestrator.context().clone(),
            cache.clone(),
            vec![DocType::ItemPrice],
        );
        orchestrator.run_pass().await;
        assert!(cache.get(&key).is_none());

        // Nothing new and nothing failed: the cache is left alone.
        cache.put(&key, CatalogSnapshot::new(key.clone(), t0()));
        let report = orchestrator.sync_unit(DocType::ItemPrice).await;
        assert!(report.success && !report.changed);
        assert!(cache.get(&key).is_some());

        remote.fail_list(DocType::ItemPrice, RemoteError::Timeout);
        orchestrator.sync_unit(DocType::ItemPrice).await;
        assert!(cache.get(&key).is_none());
    }
}
