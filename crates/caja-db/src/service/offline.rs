//! # Offline Document Factory
//!
//! Creates quotations, orders, delivery notes, invoices and payment entries
//! while the ERP is unreachable.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_*_offline(request)                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  load customer ─► load catalog snapshot (cache or SQLite)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  build_sales_document   validation + totals    (caja-core, no I/O)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PaymentAllocationEngine  tendered payments    (invoices only)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌───────────── SINGLE TRANSACTION ─────────────┐                       │
//! │  │ header + lines, Pending                      │                       │
//! │  │ bins.actual_qty −= qty  (re-checked, stock-  │                       │
//! │  │                          moving docs only)   │                       │
//! │  └──────────────────────────────────────────────┘                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  invalidate catalog scope → next read sees the new stock                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Validation runs before the transaction opens. Stock is checked once more
//! inside it against the bins as they are at commit time; a sale that lost
//! the race rolls back with `InsufficientStock` and writes nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::{catalog, document, payment_entry};
use crate::service::catalog::CatalogService;
use caja_core::documents::{build_payment_entry, build_sales_document, derive_status};
use caja_core::exchange::same_currency;
use caja_core::validation::{checked_sum, validate_customer};
use caja_core::{
    Clock, CoreError, CurrencyPrecision, Customer, DocType, DocumentRequest, ExchangeRateResolver,
    PaymentAllocationEngine, PaymentEntry, PaymentEntryRequest, RateTable, Receivable,
    SalesDocument, SalesScope, ValidationError,
};

/// Creates offline documents for one selling scope.
#[derive(Clone)]
pub struct OfflineDocumentFactory {
    db: Database,
    catalog: CatalogService,
    precision: Arc<CurrencyPrecision>,
    clock: Arc<dyn Clock>,
    scope: SalesScope,
}

impl std::fmt::Debug for OfflineDocumentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineDocumentFactory")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl OfflineDocumentFactory {
    pub fn new(
        db: Database,
        catalog: CatalogService,
        precision: Arc<CurrencyPrecision>,
        clock: Arc<dyn Clock>,
        scope: SalesScope,
    ) -> Self {
        OfflineDocumentFactory {
            db,
            catalog,
            precision,
            clock,
            scope,
        }
    }

    pub fn scope(&self) -> &SalesScope {
        &self.scope
    }

    pub async fn create_invoice_offline(&self, request: &DocumentRequest) -> DbResult<SalesDocument> {
        self.create_sales_document(DocType::SalesInvoice, request).await
    }

    pub async fn create_order_offline(&self, request: &DocumentRequest) -> DbResult<SalesDocument> {
        self.create_sales_document(DocType::SalesOrder, request).await
    }

    pub async fn create_quotation_offline(&self, request: &DocumentRequest) -> DbResult<SalesDocument> {
        self.create_sales_document(DocType::Quotation, request).await
    }

    pub async fn create_delivery_note_offline(
        &self,
        request: &DocumentRequest,
    ) -> DbResult<SalesDocument> {
        self.create_sales_document(DocType::DeliveryNote, request).await
    }

    async fn create_sales_document(
        &self,
        doc_type: DocType,
        request: &DocumentRequest,
    ) -> DbResult<SalesDocument> {
        let scope = &self.scope;
        let customer = self
            .db
            .customers()
            .get(&scope.tenant_id, &scope.company_id, &request.customer)
            .await?;
        let snapshot = self.catalog.load(&scope.catalog_key()).await?;

        let mut doc = build_sales_document(
            doc_type,
            scope,
            customer.as_ref(),
            &snapshot,
            request,
            &self.precision,
            self.clock.as_ref(),
        )?;

        if !request.payments.is_empty() {
            let modes = self
                .db
                .payment_modes()
                .list(&scope.tenant_id, &scope.company_id)
                .await?;
            let rates = self.rates(doc.posting_date).await?;
            let engine = PaymentAllocationEngine::new(&self.precision, &rates);
            let allocations = engine.allocate_all(&doc.receivable(), &request.payments, &modes)?;
            doc.apply_payments(&allocations, &self.precision);
        }

        let written = self.write_sales_document(&doc).await;
        // Also after a refused decrement: the cached stock was stale.
        self.catalog.invalidate_scope(&scope.tenant_id, &scope.company_id);
        written?;

        info!(
            doc_type = %doc_type,
            id = %doc.id,
            customer = %doc.customer,
            grand_total = %doc.grand_total,
            status = doc.status.as_str(),
            "Offline document created"
        );
        Ok(doc)
    }

    /// Header, lines and stock decrement in one transaction.
    async fn write_sales_document(&self, doc: &SalesDocument) -> DbResult<()> {
        let scope = &self.scope;
        let mut moves: BTreeMap<(&str, &str), Decimal> = BTreeMap::new();
        for item in doc.stock_moves() {
            let qty = moves
                .entry((item.item_code.as_str(), item.warehouse.as_str()))
                .or_default();
            *qty = checked_sum(&format!("qty for {}", item.item_code), *qty, item.qty)?;
        }

        let now = self.clock.now();
        let mut tx = self.db.pool().begin().await?;
        // Header first: the write lock is held before any bin is read.
        document::insert_aggregate(&mut tx, doc).await?;
        for ((item_code, warehouse), qty) in moves {
            catalog::decrement_stock(
                &mut tx,
                &scope.tenant_id,
                &scope.company_id,
                item_code,
                warehouse,
                qty,
                now,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Records a customer receipt, against a local invoice or a bare outstanding amount.
    pub async fn create_payment_entry_offline(
        &self,
        request: &PaymentEntryRequest,
    ) -> DbResult<PaymentEntry> {
        let scope = &self.scope;
        let found = self
            .db
            .customers()
            .get(&scope.tenant_id, &scope.company_id, &request.customer)
            .await?;
        let customer = validate_customer(&request.customer, found.as_ref())?;

        let posting_date = request.posting_date.unwrap_or_else(|| self.clock.today());
        let rates = self.rates(posting_date).await?;

        let mut invoice = match &request.invoice {
            Some(name) => {
                let invoice = self
                    .db
                    .documents()
                    .find(DocType::SalesInvoice, &scope.tenant_id, &scope.company_id, name)
                    .await?
                    .ok_or_else(|| ValidationError::InvalidFormat {
                        field: "invoice".to_string(),
                        reason: format!("unknown invoice '{}'", name),
                    })?;
                if invoice.customer != customer.name {
                    return Err(ValidationError::InvalidFormat {
                        field: "invoice".to_string(),
                        reason: format!("{} belongs to {}", invoice.id, invoice.customer),
                    }
                    .into());
                }
                Some(invoice)
            }
            None => None,
        };

        let receivable = match (&invoice, request.outstanding) {
            (Some(invoice), _) => self.invoice_receivable(customer, invoice, &rates)?,
            (None, Some(outstanding)) => self.open_receivable(customer, outstanding),
            (None, None) => {
                return Err(ValidationError::Required {
                    field: "invoice".to_string(),
                }
                .into())
            }
        };

        let mode = self
            .db
            .payment_modes()
            .get(&scope.tenant_id, &scope.company_id, &request.tender.mode)
            .await?
            .filter(|m| m.enabled)
            .ok_or_else(|| CoreError::UnconfiguredPaymentMode {
                mode: request.tender.mode.clone(),
            })?;

        let engine = PaymentAllocationEngine::new(&self.precision, &rates);
        let allocation = engine.allocate(&receivable, &request.tender, &mode)?;

        let mut request = request.clone();
        request.posting_date = Some(posting_date);
        let entry = build_payment_entry(
            scope,
            customer,
            &allocation,
            invoice.as_ref().map(|i| i.id.as_str()),
            &request,
            self.clock.as_ref(),
        );

        if let Some(invoice) = invoice.as_mut() {
            let to_receivable = receivable.invoice_to_receivable.unwrap_or(Decimal::ONE);
            let reduction = if allocation.settles() {
                invoice.outstanding_amount
            } else if to_receivable == Decimal::ONE {
                allocation.allocated
            } else {
                self.precision
                    .round(allocation.allocated / to_receivable, &invoice.currency)
            };
            self.reduce_outstanding(invoice, reduction);
        }

        let now = self.clock.now();
        let mut tx = self.db.pool().begin().await?;
        payment_entry::insert_entry(&mut tx, &entry).await?;
        if let Some(invoice) = &invoice {
            document::update_payment_state(&mut tx, invoice, now).await?;
        }
        tx.commit().await?;

        info!(
            id = %entry.id,
            party = %entry.party,
            allocated = %allocation.allocated,
            received = %allocation.received,
            change = %allocation.change,
            "Offline payment entry created"
        );
        Ok(entry)
    }

    async fn rates(&self, on: NaiveDate) -> DbResult<ExchangeRateResolver<RateTable>> {
        let table = self
            .db
            .exchange_rates()
            .rate_table(&self.scope.tenant_id, &self.scope.company_id, on)
            .await?;
        Ok(ExchangeRateResolver::new(table))
    }

    /// The invoice's balance expressed in the customer's receivable currency.
    fn invoice_receivable(
        &self,
        customer: &Customer,
        invoice: &SalesDocument,
        rates: &ExchangeRateResolver<RateTable>,
    ) -> DbResult<Receivable> {
        let receivable_currency = customer
            .receivable_currency
            .clone()
            .unwrap_or_else(|| invoice.currency.clone());

        let to_receivable = if same_currency(&receivable_currency, &invoice.currency) {
            Decimal::ONE
        } else if same_currency(&receivable_currency, &self.scope.company_currency) {
            invoice.conversion_rate
        } else {
            rates.rate(&invoice.currency, &receivable_currency)?
        };

        Ok(Receivable {
            document: invoice.id.clone(),
            outstanding: self
                .precision
                .round(invoice.outstanding_amount * to_receivable, &receivable_currency),
            receivable_currency,
            receivable_account: invoice.debit_to.clone(),
            invoice_currency: invoice.currency.clone(),
            invoice_to_receivable: Some(to_receivable),
        })
    }

    fn open_receivable(&self, customer: &Customer, outstanding: Decimal) -> Receivable {
        let currency = customer
            .receivable_currency
            .clone()
            .unwrap_or_else(|| self.scope.company_currency.clone());
        Receivable {
            document: customer.name.clone(),
            outstanding,
            receivable_currency: currency.clone(),
            receivable_account: customer
                .receivable_account
                .clone()
                .unwrap_or_else(|| self.scope.receivable_account.clone()),
            invoice_currency: currency,
            invoice_to_receivable: Some(Decimal::ONE),
        }
    }

    fn reduce_outstanding(&self, invoice: &mut SalesDocument, reduction: Decimal) {
        let currency = invoice.currency.clone();
        invoice.outstanding_amount = self
            .precision
            .round((invoice.outstanding_amount - reduction).max(Decimal::ZERO), &currency);
        invoice.paid_amount = self
            .precision
            .round(invoice.grand_total - invoice.outstanding_amount, &currency);
        invoice.status = derive_status(
            invoice.doc_type,
            invoice.paid_amount,
            invoice.outstanding_amount,
            self.precision.tolerance(&currency),
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::DbConfig;
    use crate::repository::catalog::ItemPrice;
    use crate::repository::exchange::CurrencyExchange;
    use caja_core::{
        CatalogCache, CatalogItem, DocumentStatus, FixedClock, LineRequest, LinkRequest,
        PaymentModeAccount, PaymentModeKind, SyncStatus, TenderLine,
    };
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn scope() -> SalesScope {
        SalesScope {
            tenant_id: "t".into(),
            company_id: "c".into(),
            company_currency: "NIO".into(),
            price_list: "Retail".into(),
            warehouse: "Main".into(),
            receivable_account: "Debtors - C".into(),
        }
    }

    fn customer(name: &str, disabled: bool) -> Customer {
        Customer {
            name: name.into(),
            customer_name: format!("{} S.A.", name),
            customer_group: None,
            default_currency: None,
            receivable_account: None,
            receivable_currency: Some("NIO".into()),
            disabled,
            remote_modified: None,
        }
    }

    async fn setup() -> (Database, OfflineDocumentFactory) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = t0();

        let customers = db.customers();
        customers.upsert("t", "c", &customer("CUST-1", false), now).await.unwrap();
        customers.upsert("t", "c", &customer("CUST-OFF", true), now).await.unwrap();

        let catalog_repo = db.catalog();
        for (code, price) in [("COKE", dec!(35.50)), ("TV", dec!(50))] {
            catalog_repo
                .upsert_item(
                    "t",
                    "c",
                    &CatalogItem {
                        item_code: code.into(),
                        item_name: code.into(),
                        item_group: None,
                        stock_uom: "Nos".into(),
                        is_stock_item: true,
                        disabled: false,
                        allow_negative_stock: false,
                    },
                    None,
                    now,
                )
                .await
                .unwrap();
            catalog_repo
                .upsert_item_price(
                    "t",
                    "c",
                    &ItemPrice {
                        name: format!("PRICE-{}", code),
                        item_code: code.into(),
                        price_list: "Retail".into(),
                        currency: Some("NIO".into()),
                        rate: price,
                        remote_modified: None,
                    },
                    now,
                )
                .await
                .unwrap();
            catalog_repo
                .upsert_bin("t", "c", code, "Main", dec!(10), Decimal::ZERO, None, now)
                .await
                .unwrap();
        }

        let modes = db.payment_modes();
        for (mode, currency) in [("Cash", "NIO"), ("Cash USD", "USD")] {
            modes
                .upsert(
                    "t",
                    "c",
                    &PaymentModeAccount {
                        mode: mode.into(),
                        kind: PaymentModeKind::Cash,
                        account: Some(format!("{} - C", mode)),
                        account_currency: Some(currency.into()),
                        enabled: true,
                    },
                    None,
                    now,
                )
                .await
                .unwrap();
        }

        db.exchange_rates()
            .upsert(
                "t",
                "c",
                &CurrencyExchange {
                    name: "USD-NIO-2024-05-01".into(),
                    from_currency: "USD".into(),
                    to_currency: "NIO".into(),
                    exchange_rate: dec!(36.5),
                    date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                    remote_modified: None,
                },
                now,
            )
            .await
            .unwrap();

        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now));
        let service = CatalogService::new(db.catalog(), Arc::new(CatalogCache::new()), clock.clone());
        let factory = OfflineDocumentFactory::new(
            db.clone(),
            service,
            Arc::new(CurrencyPrecision::new()),
            clock,
            scope(),
        );
        (db, factory)
    }

    fn request(customer: &str, item: &str, qty: Decimal) -> DocumentRequest {
        DocumentRequest {
            customer: customer.into(),
            lines: vec![LineRequest {
                item_code: item.into(),
                qty,
                rate: None,
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_invoice_is_persisted_and_stock_decremented() {
        let (db, factory) = setup().await;

        let doc = factory
            .create_invoice_offline(&request("CUST-1", "COKE", dec!(3)))
            .await
            .unwrap();
        assert_eq!(doc.grand_total, dec!(106.50));
        assert_eq!(doc.status, DocumentStatus::Unpaid);

        let stored = db.documents().get(DocType::SalesInvoice, &doc.id).await.unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Pending);
        assert_eq!(stored.items.len(), 1);
        assert_eq!(db.catalog().actual_qty("t", "c", "COKE", "Main").await.unwrap(), dec!(7));
    }

    #[tokio::test]
    async fn test_disabled_customer_writes_nothing() {
        let (db, factory) = setup().await;

        let err = factory
            .create_invoice_offline(&request("CUST-OFF", "COKE", dec!(1)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Customer is disabled");
        assert_eq!(db.documents().outbox_counts(DocType::SalesInvoice, "t", "c").await.unwrap(), (0, 0));
        assert_eq!(db.catalog().actual_qty("t", "c", "COKE", "Main").await.unwrap(), dec!(10));
    }

    #[tokio::test]
    async fn test_second_invoice_sees_first_decrement() {
        let (_db, factory) = setup().await;

        factory
            .create_invoice_offline(&request("CUST-1", "COKE", dec!(6)))
            .await
            .unwrap();
        let err = factory
            .create_invoice_offline(&request("CUST-1", "COKE", dec!(5)))
            .await
            .unwrap_err();

        match err.validation() {
            Some(ValidationError::InsufficientStock {
                item,
                available,
                requested,
            }) => {
                assert_eq!(item, "COKE");
                assert_eq!(*available, dec!(4));
                assert_eq!(*requested, dec!(5));
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_invoices_cannot_oversell() {
        let (db, factory) = setup().await;
        let other = factory.clone();
        let first = request("CUST-1", "COKE", dec!(6));
        let second = request("CUST-1", "COKE", dec!(6));

        let (a, b) = tokio::join!(
            factory.create_invoice_offline(&first),
            other.create_invoice_offline(&second),
        );

        let (sold, refused) = match (a, b) {
            (Ok(doc), Err(err)) | (Err(err), Ok(doc)) => (doc, err),
            (a, b) => panic!("expected exactly one sale, got {:?} and {:?}", a.map(|d| d.id), b.map(|d| d.id)),
        };
        assert_eq!(sold.items[0].qty, dec!(6));
        assert!(matches!(
            refused.validation(),
            Some(ValidationError::InsufficientStock { available, requested, .. })
                if *available == dec!(4) && *requested == dec!(6)
        ));

        assert_eq!(db.catalog().actual_qty("t", "c", "COKE", "Main").await.unwrap(), dec!(4));
        assert_eq!(db.documents().outbox_counts(DocType::SalesInvoice, "t", "c").await.unwrap(), (1, 0));
    }

    #[tokio::test]
    async fn test_repeated_item_lines_are_checked_together() {
        let (db, factory) = setup().await;

        let mut req = request("CUST-1", "COKE", dec!(4));
        req.lines.push(LineRequest {
            item_code: "COKE".into(),
            qty: dec!(4),
            rate: None,
        });
        factory.create_invoice_offline(&req).await.unwrap();
        assert_eq!(db.catalog().actual_qty("t", "c", "COKE", "Main").await.unwrap(), dec!(2));

        let err = factory.create_invoice_offline(&req).await.unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationError::InsufficientStock { requested, .. }) if *requested == dec!(8)
        ));
        assert_eq!(db.catalog().actual_qty("t", "c", "COKE", "Main").await.unwrap(), dec!(2));
    }

    #[tokio::test]
    async fn test_only_stock_moving_documents_decrement() {
        let (db, factory) = setup().await;

        factory
            .create_quotation_offline(&request("CUST-1", "COKE", dec!(2)))
            .await
            .unwrap();
        let order = factory
            .create_order_offline(&request("CUST-1", "COKE", dec!(2)))
            .await
            .unwrap();
        assert_eq!(db.catalog().actual_qty("t", "c", "COKE", "Main").await.unwrap(), dec!(10));

        let mut dn_request = request("CUST-1", "COKE", dec!(2));
        dn_request.links.push(LinkRequest {
            link_doctype: DocType::SalesOrder,
            link_name: order.id.clone(),
        });
        let dn = factory.create_delivery_note_offline(&dn_request).await.unwrap();
        assert_eq!(db.catalog().actual_qty("t", "c", "COKE", "Main").await.unwrap(), dec!(8));

        let mut inv_request = request("CUST-1", "COKE", dec!(2));
        inv_request.links.push(LinkRequest {
            link_doctype: DocType::DeliveryNote,
            link_name: dn.id.clone(),
        });
        let invoice = factory.create_invoice_offline(&inv_request).await.unwrap();
        assert!(!invoice.update_stock);
        assert_eq!(db.catalog().actual_qty("t", "c", "COKE", "Main").await.unwrap(), dec!(8));

        let stored = db.documents().get(DocType::SalesInvoice, &invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.links[0].link_name, dn.id);
    }

    #[tokio::test]
    async fn test_invoice_with_cash_payment_is_paid() {
        let (db, factory) = setup().await;

        let mut req = request("CUST-1", "COKE", dec!(1));
        req.payments.push(TenderLine {
            mode: "Cash".into(),
            amount: dec!(50),
            currency: "NIO".into(),
            rate: None,
        });
        let doc = factory.create_invoice_offline(&req).await.unwrap();

        assert_eq!(doc.status, DocumentStatus::Paid);
        assert_eq!(doc.paid_amount, dec!(35.50));
        assert_eq!(doc.outstanding_amount, Decimal::ZERO);
        assert_eq!(doc.payments[0].change, dec!(14.50));

        let stored = db.documents().get(DocType::SalesInvoice, &doc.id).await.unwrap().unwrap();
        assert_eq!(stored.payments.len(), 1);
        assert_eq!(stored.status, DocumentStatus::Paid);
    }

    #[tokio::test]
    async fn test_unconfigured_tender_mode_is_rejected() {
        let (db, factory) = setup().await;

        let mut req = request("CUST-1", "COKE", dec!(1));
        req.payments.push(TenderLine {
            mode: "Crypto".into(),
            amount: dec!(50),
            currency: "NIO".into(),
            rate: None,
        });
        let err = factory.create_invoice_offline(&req).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::UnconfiguredPaymentMode { .. })));
        assert_eq!(db.catalog().actual_qty("t", "c", "COKE", "Main").await.unwrap(), dec!(10));
    }

    #[tokio::test]
    async fn test_foreign_currency_payment_entry_settles_invoice() {
        let (db, factory) = setup().await;

        let invoice = factory
            .create_invoice_offline(&request("CUST-1", "TV", dec!(1)))
            .await
            .unwrap();
        assert_eq!(invoice.outstanding_amount, dec!(50.00));

        let entry = factory
            .create_payment_entry_offline(&PaymentEntryRequest {
                customer: "CUST-1".into(),
                invoice: Some(invoice.id.clone()),
                outstanding: None,
                tender: TenderLine {
                    mode: "Cash USD".into(),
                    amount: dec!(20),
                    currency: "USD".into(),
                    rate: None,
                },
                reference_no: None,
                posting_date: None,
            })
            .await
            .unwrap();

        assert_eq!(entry.paid_amount, dec!(50.00));
        assert_eq!(entry.received_amount, dec!(1.37));
        assert_eq!(entry.exchange_rate, Some(dec!(36.5)));
        assert_eq!(entry.references[0].reference_name, invoice.id);
        assert!(entry.id.starts_with("LOCAL-PE-"));

        let stored = db.payment_entries().get(&entry.id).await.unwrap().unwrap();
        assert_eq!(stored.references.len(), 1);

        let paid = db.documents().get(DocType::SalesInvoice, &invoice.id).await.unwrap().unwrap();
        assert_eq!(paid.status, DocumentStatus::Paid);
        assert_eq!(paid.outstanding_amount, Decimal::ZERO);

        // Nothing left to allocate.
        let err = factory
            .create_payment_entry_offline(&PaymentEntryRequest {
                customer: "CUST-1".into(),
                invoice: Some(invoice.id.clone()),
                outstanding: None,
                tender: TenderLine {
                    mode: "Cash".into(),
                    amount: dec!(10),
                    currency: "NIO".into(),
                    rate: None,
                },
                reference_no: None,
                posting_date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::NothingToAllocate { .. })));
    }

    #[tokio::test]
    async fn test_partial_payment_entry_without_invoice() {
        let (db, factory) = setup().await;

        let entry = factory
            .create_payment_entry_offline(&PaymentEntryRequest {
                customer: "CUST-1".into(),
                invoice: None,
                outstanding: Some(dec!(100)),
                tender: TenderLine {
                    mode: "Cash".into(),
                    amount: dec!(40),
                    currency: "NIO".into(),
                    rate: None,
                },
                reference_no: Some("R-1".into()),
                posting_date: None,
            })
            .await
            .unwrap();

        assert_eq!(entry.paid_amount, dec!(40));
        assert!(entry.references.is_empty());
        assert_eq!(entry.paid_from, "Debtors - C");
        assert_eq!(db.payment_entries().outbox_counts("t", "c").await.unwrap(), (1, 0));
    }
}
