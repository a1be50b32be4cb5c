//! # Doc Type Sync Units
//!
//! One unit per [`DocType`], all driven through the same wrapper.
//!
//! ## Unit Run
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          run_unit(doc_type)                             │
//! │                                                                         │
//! │   Idle ──► set_in_progress(true)                                        │
//! │              │                                                          │
//! │              ▼                                                          │
//! │            pull: list modified > last_pull_at, upsert locally           │
//! │              │ ok ──► mark_pull_success(watermark)                      │
//! │              ▼                                                          │
//! │            push: drain Pending/Failed outbox, one create per document   │
//! │              │ no item failed ──► mark_push_success                     │
//! │              ▼                                                          │
//! │   always:  refresh_counters(pending, failed)                            │
//! │            mark_failure(error)        when pull, push or a panic failed │
//! │            set_in_progress(false) ──► Idle                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Push Attempts
//! A create that fails with a retryable error (transport, timeout, 429, 5xx)
//! is retried with exponential backoff, up to `push_max_attempts` tries.
//! Before any retry, and for documents that already failed on an earlier
//! pass, the ERP is asked for a record carrying the same `custom_local_id`;
//! a match is adopted instead of creating a duplicate.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use caja_core::{Clock, CurrencyPrecision, DocType, PaymentEntry, SalesDocument, SalesScope};
use caja_db::Database;

use crate::config::{SyncConfig, SyncSettings};
use crate::error::{RemoteResult, SyncError, SyncResult};
use crate::mapping::{self, PullContext, LOCAL_ID_FIELD};
use crate::remote::{FilterOp, ListQuery, RemoteAck, RemoteClient};

// =============================================================================
// Sync Context
// =============================================================================

/// Everything a unit needs: storage, the ERP, time and the selling scope.
#[derive(Clone)]
pub struct SyncContext {
    pub db: Database,
    pub remote: Arc<dyn RemoteClient>,
    pub clock: Arc<dyn Clock>,
    pub precision: Arc<CurrencyPrecision>,
    pub scope: SalesScope,
    pub settings: SyncSettings,
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("tenant_id", &self.scope.tenant_id)
            .field("company_id", &self.scope.company_id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SyncContext {
    pub fn new(
        db: Database,
        remote: Arc<dyn RemoteClient>,
        clock: Arc<dyn Clock>,
        config: &SyncConfig,
    ) -> Self {
        SyncContext {
            db,
            remote,
            clock,
            precision: Arc::new(config.precision.clone()),
            scope: config.sales_scope(),
            settings: config.sync.clone(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.scope.tenant_id
    }

    pub fn company_id(&self) -> &str {
        &self.scope.company_id
    }

    fn pull_context(&self, now: DateTime<Utc>) -> PullContext<'_> {
        PullContext {
            tenant_id: &self.scope.tenant_id,
            company_id: &self.scope.company_id,
            precision: self.precision.as_ref(),
            now,
        }
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Outcome of one unit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UnitReport {
    pub doc_type: DocType,
    pub success: bool,
    /// True when the pull stored records or the push created any.
    pub changed: bool,
    pub pulled: usize,
    pub pushed: usize,
    pub failed: usize,
    pub error: Option<String>,
}

impl UnitReport {
    pub fn failed(doc_type: DocType, error: impl Into<String>) -> Self {
        UnitReport {
            doc_type,
            success: false,
            changed: false,
            pulled: 0,
            pushed: 0,
            failed: 0,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Default)]
struct PullOutcome {
    stored: usize,
    watermark: Option<DateTime<Utc>>,
}

impl PullOutcome {
    fn record(&mut self, modified: Option<DateTime<Utc>>) {
        self.stored += 1;
        if modified > self.watermark {
            self.watermark = modified;
        }
    }
}

#[derive(Debug, Default)]
struct PushOutcome {
    attempted: usize,
    pushed: usize,
    failed: usize,
    last_error: Option<String>,
}

// =============================================================================
// Shared Wrapper
// =============================================================================

/// Runs one unit: pull, then push, with bookkeeping on every exit path.
///
/// Never returns an error and never unwinds; failures, panics included, end
/// up in the report and in the unit's sync state.
pub async fn run_unit(ctx: &SyncContext, doc_type: DocType) -> UnitReport {
    let unit = DocTypeSyncUnit::new(doc_type);
    let started = Instant::now();
    info!(doc_type = %doc_type, "Sync unit starting");

    let mut report = match AssertUnwindSafe(unit.pull_then_push(ctx)).catch_unwind().await {
        Ok(Ok(report)) => report,
        Ok(Err(err)) => UnitReport::failed(doc_type, err.to_string()),
        Err(panic) => {
            let err = SyncError::UnitPanicked(panic_message(panic.as_ref()));
            error!(doc_type = %doc_type, error = %err, "Sync unit panicked");
            UnitReport::failed(doc_type, err.to_string())
        }
    };

    let (tenant, company) = (ctx.tenant_id(), ctx.company_id());
    let state = ctx.db.sync_state();

    match unit.outbox_counts(ctx).await {
        Ok((pending, failed)) => {
            if let Err(e) = state
                .refresh_counters(tenant, company, doc_type, pending, failed, ctx.clock.now())
                .await
            {
                warn!(doc_type = %doc_type, error = %e, "Failed to refresh sync counters");
            }
        }
        Err(e) => warn!(doc_type = %doc_type, error = %e, "Failed to count outbox"),
    }

    if let Some(message) = &report.error {
        warn!(doc_type = %doc_type, error = %message, "Sync unit failed");
        if let Err(e) = state
            .mark_failure(tenant, company, doc_type, message, ctx.clock.now())
            .await
        {
            warn!(doc_type = %doc_type, error = %e, "Failed to record sync failure");
        }
    }

    if let Err(e) = state
        .set_in_progress(tenant, company, doc_type, false, ctx.clock.now())
        .await
    {
        error!(doc_type = %doc_type, error = %e, "Failed to clear in-progress flag");
        if report.error.is_none() {
            report.success = false;
            report.error = Some(e.to_string());
        }
    }

    info!(
        doc_type = %doc_type,
        success = report.success,
        changed = report.changed,
        pulled = report.pulled,
        pushed = report.pushed,
        failed = report.failed,
        elapsed = ?started.elapsed(),
        "Sync unit finished"
    );
    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Doc Type Sync Unit
// =============================================================================

/// Pull and push behavior of one doc type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocTypeSyncUnit {
    doc_type: DocType,
}

impl DocTypeSyncUnit {
    pub fn new(doc_type: DocType) -> Self {
        DocTypeSyncUnit { doc_type }
    }

    pub fn doc_type(&self) -> DocType {
        self.doc_type
    }

    async fn pull_then_push(&self, ctx: &SyncContext) -> SyncResult<UnitReport> {
        let (tenant, company) = (ctx.tenant_id(), ctx.company_id());
        let state = ctx.db.sync_state();

        state
            .set_in_progress(tenant, company, self.doc_type, true, ctx.clock.now())
            .await?;
        let since = state
            .get_or_create(tenant, company, self.doc_type, ctx.clock.now())
            .await?
            .last_pull_at;

        let pulled = self.pull(ctx, since).await?;
        state
            .mark_pull_success(tenant, company, self.doc_type, pulled.watermark, ctx.clock.now())
            .await?;
        debug!(doc_type = %self.doc_type, stored = pulled.stored, "Pull complete");

        let pushed = self.push(ctx).await?;
        if pushed.failed == 0 && self.doc_type.is_pushable() {
            state
                .mark_push_success(tenant, company, self.doc_type, ctx.clock.now())
                .await?;
        }

        let error = pushed.last_error.map(|last| {
            format!(
                "{} of {} {} documents failed to push; last error: {}",
                pushed.failed, pushed.attempted, self.doc_type, last
            )
        });

        Ok(UnitReport {
            doc_type: self.doc_type,
            success: error.is_none(),
            changed: pulled.stored > 0 || pushed.pushed > 0,
            pulled: pulled.stored,
            pushed: pushed.pushed,
            failed: pushed.failed,
            error,
        })
    }

    async fn outbox_counts(&self, ctx: &SyncContext) -> SyncResult<(i64, i64)> {
        let (tenant, company) = (ctx.tenant_id(), ctx.company_id());
        let counts = match self.doc_type {
            DocType::PaymentEntry => ctx.db.payment_entries().outbox_counts(tenant, company).await?,
            dt if dt.is_sales_document() => {
                ctx.db.documents().outbox_counts(dt, tenant, company).await?
            }
            _ => (0, 0),
        };
        Ok(counts)
    }

    // =========================================================================
    // Pull
    // =========================================================================

    fn pull_query(&self, ctx: &SyncContext, since: Option<DateTime<Utc>>) -> ListQuery {
        let query = ListQuery::new(self.doc_type, ctx.settings.page_size).modified_since(since);
        match self.doc_type {
            DocType::ItemPrice => {
                query.filter("price_list", FilterOp::Eq, ctx.scope.price_list.as_str())
            }
            DocType::Bin => query.filter("warehouse", FilterOp::Eq, ctx.scope.warehouse.as_str()),
            DocType::PaymentEntry => query
                .filter("company", FilterOp::Eq, ctx.company_id())
                .filter("payment_type", FilterOp::Eq, "Receive"),
            dt if dt.is_sales_document() => query.filter("company", FilterOp::Eq, ctx.company_id()),
            _ => query,
        }
    }

    /// Child tables only come back from single-record reads.
    fn needs_full_records(&self) -> bool {
        matches!(self.doc_type, DocType::ModeOfPayment | DocType::Customer)
            || self.doc_type.is_pushable()
    }

    async fn pull(&self, ctx: &SyncContext, since: Option<DateTime<Utc>>) -> SyncResult<PullOutcome> {
        let query = self.pull_query(ctx, since);
        let records = if self.needs_full_records() {
            let heads = ctx
                .remote
                .list_all(&query.fields(&["name", "modified"]))
                .await?;
            let mut records = Vec::with_capacity(heads.len());
            for head in &heads {
                let name = mapping::remote_name(self.doc_type, head)?;
                records.push(ctx.remote.get(self.doc_type, &name).await?);
            }
            records
        } else {
            ctx.remote.list_all(&query).await?
        };

        let mut outcome = PullOutcome::default();
        for value in &records {
            self.store(ctx, value).await?;
            outcome.record(mapping::remote_modified(value));
        }
        Ok(outcome)
    }

    async fn store(&self, ctx: &SyncContext, value: &Value) -> SyncResult<()> {
        let (tenant, company) = (ctx.tenant_id(), ctx.company_id());
        let now = ctx.clock.now();
        let modified = mapping::remote_modified(value);
        let catalog = ctx.db.catalog();

        match self.doc_type {
            DocType::ItemGroup => {
                let group = mapping::item_group_from(value)?;
                catalog.upsert_item_group(tenant, company, &group, modified, now).await?;
            }
            DocType::Item => {
                let item = mapping::item_from(value)?;
                catalog.upsert_item(tenant, company, &item, modified, now).await?;
            }
            DocType::ItemPrice => {
                let price = mapping::item_price_from(value)?;
                catalog.upsert_item_price(tenant, company, &price, now).await?;
            }
            DocType::Bin => {
                let bin = mapping::bin_from(value)?;
                let pending = ctx
                    .db
                    .documents()
                    .pending_stock_qty(tenant, company, &bin.item_code, &bin.warehouse)
                    .await?;
                catalog
                    .upsert_bin(
                        tenant,
                        company,
                        &bin.item_code,
                        &bin.warehouse,
                        bin.actual_qty,
                        pending,
                        bin.remote_modified,
                        now,
                    )
                    .await?;
            }
            DocType::CurrencyExchange => {
                let rate = mapping::currency_exchange_from(value)?;
                ctx.db.exchange_rates().upsert(tenant, company, &rate, now).await?;
            }
            DocType::ModeOfPayment => {
                let mode = mapping::mode_of_payment_from(value, company)?;
                ctx.db
                    .payment_modes()
                    .upsert(tenant, company, &mode, modified, now)
                    .await?;
            }
            DocType::Customer => {
                let customer = mapping::customer_from(value, company)?;
                ctx.db.customers().upsert(tenant, company, &customer, now).await?;
            }
            DocType::PaymentEntry => {
                let entry = mapping::payment_entry_from(value, &ctx.pull_context(now))?;
                ctx.db.payment_entries().upsert_pulled(&entry).await?;
            }
            dt => {
                let doc = mapping::sales_document_from(dt, value, &ctx.pull_context(now))?;
                ctx.db.documents().upsert_pulled(&doc).await?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Push
    // =========================================================================

    async fn push(&self, ctx: &SyncContext) -> SyncResult<PushOutcome> {
        let (tenant, company) = (ctx.tenant_id(), ctx.company_id());
        let mut outcome = PushOutcome::default();

        match self.doc_type {
            DocType::PaymentEntry => {
                let entries = ctx.db.payment_entries().list_outbox(tenant, company).await?;
                for entry in &entries {
                    let result = self.push_payment_entry(ctx, entry).await;
                    self.settle(ctx, &entry.id, result, &mut outcome).await?;
                }
            }
            dt if dt.is_sales_document() => {
                let docs = ctx.db.documents().list_outbox(dt, tenant, company).await?;
                for doc in &docs {
                    let result = self.push_sales_document(ctx, doc).await;
                    self.settle(ctx, &doc.id, result, &mut outcome).await?;
                }
            }
            _ => {}
        }

        if outcome.attempted > 0 {
            info!(
                doc_type = %self.doc_type,
                pushed = outcome.pushed,
                failed = outcome.failed,
                "Outbox drained"
            );
        }
        Ok(outcome)
    }

    async fn push_sales_document(
        &self,
        ctx: &SyncContext,
        doc: &SalesDocument,
    ) -> SyncResult<RemoteAck> {
        let resolved = resolve_links(ctx, &mapping::local_links(doc)).await?;
        let payload = mapping::sales_document_payload(doc, &resolved)?;
        self.submit(ctx, &doc.id, doc.push_attempts, &payload).await
    }

    async fn push_payment_entry(
        &self,
        ctx: &SyncContext,
        entry: &PaymentEntry,
    ) -> SyncResult<RemoteAck> {
        let resolved = resolve_links(ctx, &mapping::local_references(entry)).await?;
        let payload = mapping::payment_entry_payload(entry, &resolved)?;
        self.submit(ctx, &entry.id, entry.push_attempts, &payload).await
    }

    /// Creates the record remotely, retrying transient failures.
    async fn submit(
        &self,
        ctx: &SyncContext,
        local_id: &str,
        previous_attempts: i64,
        payload: &Value,
    ) -> SyncResult<RemoteAck> {
        let remote = ctx.remote.as_ref();
        let doc_type = self.doc_type;
        let max_attempts = ctx.settings.push_max_attempts.max(1);
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let initial = Duration::from_millis(ctx.settings.push_initial_backoff_ms);
        let policy = ExponentialBackoff {
            initial_interval: initial,
            current_interval: initial,
            max_interval: Duration::from_millis(ctx.settings.push_max_backoff_ms),
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        let ack = backoff::future::retry(policy, || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let check_existing = previous_attempts > 0 || attempt > 1;
            create_once(remote, doc_type, local_id, payload, check_existing)
                .await
                .map_err(|err| {
                    if err.is_retryable() && attempt < max_attempts {
                        debug!(doc_type = %doc_type, id = %local_id, attempt, error = %err, "Retrying push");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
        })
        .await?;
        Ok(ack)
    }

    /// Records the outcome of one push on the local document.
    async fn settle(
        &self,
        ctx: &SyncContext,
        id: &str,
        result: SyncResult<RemoteAck>,
        outcome: &mut PushOutcome,
    ) -> SyncResult<()> {
        let now = ctx.clock.now();
        outcome.attempted += 1;

        match result {
            Ok(ack) => {
                if self.doc_type == DocType::PaymentEntry {
                    ctx.db
                        .payment_entries()
                        .mark_synced(id, &ack.name, ack.modified, now)
                        .await?;
                } else {
                    ctx.db
                        .documents()
                        .mark_synced(self.doc_type, id, &ack.name, ack.modified, now)
                        .await?;
                }
                outcome.pushed += 1;
            }
            Err(err) => {
                let message = err.to_string();
                warn!(doc_type = %self.doc_type, id = %id, error = %message, "Push failed");
                if self.doc_type == DocType::PaymentEntry {
                    ctx.db.payment_entries().mark_failed(id, &message, now).await?;
                } else {
                    ctx.db.documents().mark_failed(self.doc_type, id, &message, now).await?;
                }
                outcome.failed += 1;
                outcome.last_error = Some(message);
            }
        }
        Ok(())
    }
}

/// One create call, preceded by a lookup when an earlier attempt may have landed.
async fn create_once(
    remote: &dyn RemoteClient,
    doc_type: DocType,
    local_id: &str,
    payload: &Value,
    check_existing: bool,
) -> RemoteResult<RemoteAck> {
    if check_existing {
        let query = ListQuery::new(doc_type, 1)
            .fields(&["name", "modified"])
            .filter(LOCAL_ID_FIELD, FilterOp::Eq, local_id);
        if let Some(found) = remote.list(&query).await?.first() {
            let ack = RemoteAck::from_value(found)?;
            info!(doc_type = %doc_type, id = %local_id, remote_name = %ack.name, "Adopting existing remote record");
            return Ok(ack);
        }
    }
    remote.create(doc_type, payload).await
}

/// Remote names for the local documents a record points at.
async fn resolve_links(
    ctx: &SyncContext,
    links: &[(DocType, String)],
) -> SyncResult<HashMap<String, String>> {
    let mut resolved = HashMap::with_capacity(links.len());
    for (doc_type, name) in links {
        let remote_name = ctx
            .db
            .documents()
            .remote_name_of(*doc_type, ctx.tenant_id(), ctx.company_id(), name)
            .await?
            .ok_or_else(|| SyncError::UnresolvedLink {
                doc_type: doc_type.as_str().to_string(),
                name: name.clone(),
            })?;
        resolved.insert(name.clone(), remote_name);
    }
    Ok(resolved)
}

// =============================================================================
// Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use serde_json::json;

    use caja_core::{CatalogCache, DocumentRequest, FixedClock, LineRequest};
    use caja_db::{CatalogService, DbConfig, OfflineDocumentFactory};

    use crate::remote::fake::FakeRemote;

    pub const COMPANY: &str = "Caja Demo";

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    pub fn scope() -> SalesScope {
        SalesScope {
            tenant_id: "t".into(),
            company_id: COMPANY.into(),
            company_currency: "NIO".into(),
            price_list: "Retail".into(),
            warehouse: "Main".into(),
            receivable_account: "Deudores - CD".into(),
        }
    }

    pub fn settings() -> SyncSettings {
        SyncSettings {
            page_size: 2,
            push_max_attempts: 3,
            push_initial_backoff_ms: 1,
            push_max_backoff_ms: 2,
            ..SyncSettings::default()
        }
    }

    /// An ERP holding the masters a till needs before it can sell.
    pub fn erp() -> FakeRemote {
        FakeRemote::new()
            .with_records(
                DocType::ItemGroup,
                vec![
                    json!({"name": "All Item Groups", "is_group": 1, "modified": "2024-04-01 08:00:00.000000"}),
                    json!({"name": "Beverages", "parent_item_group": "All Item Groups", "is_group": 0,
                           "modified": "2024-04-02 08:00:00.000000"}),
                ],
            )
            .with_records(
                DocType::Item,
                vec![
                    json!({"name": "COKE", "item_code": "COKE", "item_name": "Coca-Cola 355ml",
                           "item_group": "Beverages", "stock_uom": "Nos", "is_stock_item": 1,
                           "modified": "2024-04-03 08:00:00.000000"}),
                    json!({"name": "WATER", "item_code": "WATER", "item_name": "Agua 600ml",
                           "item_group": "Beverages", "stock_uom": "Nos", "is_stock_item": 1,
                           "modified": "2024-04-03 09:00:00.000000"}),
                    json!({"name": "DELIVERY", "item_code": "DELIVERY", "item_name": "Delivery",
                           "stock_uom": "Nos", "is_stock_item": 0,
                           "modified": "2024-04-03 10:00:00.000000"}),
                ],
            )
            .with_records(
                DocType::ItemPrice,
                vec![
                    json!({"name": "IP-1", "item_code": "COKE", "price_list": "Retail", "currency": "NIO",
                           "price_list_rate": 35.5, "modified": "2024-04-04 08:00:00.000000"}),
                    json!({"name": "IP-2", "item_code": "WATER", "price_list": "Retail", "currency": "NIO",
                           "price_list_rate": "20.00", "modified": "2024-04-04 08:00:00.000000"}),
                    json!({"name": "IP-3", "item_code": "COKE", "price_list": "Wholesale", "currency": "NIO",
                           "price_list_rate": 30, "modified": "2024-04-04 08:00:00.000000"}),
                ],
            )
            .with_records(
                DocType::Bin,
                vec![
                    json!({"name": "BIN-1", "item_code": "COKE", "warehouse": "Main", "actual_qty": 10,
                           "modified": "2024-04-05 08:00:00.000000"}),
                    json!({"name": "BIN-2", "item_code": "WATER", "warehouse": "Main", "actual_qty": 5,
                           "modified": "2024-04-05 08:00:00.000000"}),
                    json!({"name": "BIN-3", "item_code": "COKE", "warehouse": "Back", "actual_qty": 99,
                           "modified": "2024-04-05 08:00:00.000000"}),
                ],
            )
            .with_records(
                DocType::CurrencyExchange,
                vec![json!({"name": "CE-1", "from_currency": "USD", "to_currency": "NIO",
                            "exchange_rate": 36.5, "date": "2024-05-01",
                            "modified": "2024-04-30 08:00:00.000000"})],
            )
            .with_records(
                DocType::ModeOfPayment,
                vec![
                    json!({"name": "Efectivo", "type": "Cash", "enabled": 1,
                           "modified": "2024-04-06 08:00:00.000000",
                           "accounts": [{"company": COMPANY, "default_account": "Caja - CD",
                                         "account_currency": "NIO"}]}),
                    json!({"name": "Efectivo USD", "type": "Cash", "enabled": 1,
                           "modified": "2024-04-06 09:00:00.000000",
                           "accounts": [{"company": COMPANY, "default_account": "Caja USD - CD",
                                         "account_currency": "USD"}]}),
                ],
            )
            .with_records(
                DocType::Customer,
                vec![
                    json!({"name": "CUST-1", "customer_name": "Cliente Contado", "disabled": 0,
                           "modified": "2024-04-07 08:00:00.000000"}),
                    json!({"name": "CUST-OFF", "customer_name": "Cliente Inactivo", "disabled": 1,
                           "modified": "2024-04-07 09:00:00.000000"}),
                ],
            )
    }

    pub async fn context(remote: Arc<FakeRemote>) -> (SyncContext, Arc<FixedClock>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let clock = Arc::new(FixedClock::new(t0()));
        let ctx = SyncContext {
            db,
            remote,
            clock: clock.clone(),
            precision: Arc::new(CurrencyPrecision::new()),
            scope: scope(),
            settings: settings(),
        };
        (ctx, clock)
    }

    /// Runs every master unit so the till can sell.
    pub async fn pull_masters(ctx: &SyncContext) {
        for doc_type in DocType::SYNC_ORDER.iter().filter(|d| !d.is_pushable()) {
            let report = run_unit(ctx, *doc_type).await;
            assert!(report.success, "{:?}", report);
        }
    }

    pub fn factory(ctx: &SyncContext) -> OfflineDocumentFactory {
        let catalog = CatalogService::new(
            ctx.db.catalog(),
            Arc::new(CatalogCache::new()),
            ctx.clock.clone(),
        );
        OfflineDocumentFactory::new(
            ctx.db.clone(),
            catalog,
            ctx.precision.clone(),
            ctx.clock.clone(),
            ctx.scope.clone(),
        )
    }

    pub fn sale(item_code: &str, qty: Decimal) -> DocumentRequest {
        DocumentRequest {
            customer: "CUST-1".into(),
            lines: vec![LineRequest {
                item_code: item_code.into(),
                qty,
                rate: None,
            }],
            ..DocumentRequest::default()
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
