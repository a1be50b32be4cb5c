//! # Document Aggregates and Builders
//!
//! Pure construction of offline documents. The builders take the clock, the
//! catalog snapshot and the customer as parameters; persistence happens in
//! caja-db.
//!
//! ## Aggregate Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SalesDocument (Quotation / Sales Order / Delivery Note / Sales Invoice)│
//! │  ├── header   id, customer, currency, totals, status, sync_status       │
//! │  ├── items    1..n   item_code, qty, rate, amount                       │
//! │  ├── taxes    0..n   account_head, rate %, tax_amount                   │
//! │  ├── payments 0..n   (invoice only) mode, allocated, tendered           │
//! │  └── links    0..n   originating order / delivery note                  │
//! │                                                                         │
//! │  PaymentEntry                                                           │
//! │  ├── header   party, paid_from → paid_to, amounts, exchange_rate        │
//! │  └── references 1..n  invoice, allocated_amount                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::allocation::{PaymentAllocation, Receivable, TenderLine};
use crate::catalog::CatalogSnapshot;
use crate::clock::Clock;
use crate::currency::CurrencyPrecision;
use crate::doctype::{DocType, DocumentStatus, SyncStatus};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::exchange::same_currency;
use crate::ids::{new_line_id, new_local_id};
use crate::types::{Customer, SalesScope};
use crate::validation::{checked_product, checked_sum, validate_customer, validate_line, validate_stock};

// =============================================================================
// Requests
// =============================================================================

/// One requested item line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRequest {
    pub item_code: String,
    pub qty: Decimal,
    /// Overrides the price-list rate.
    #[serde(default)]
    pub rate: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRequest {
    pub description: String,
    pub account_head: String,
    /// Percentage applied to the net total.
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRequest {
    pub link_doctype: DocType,
    /// Local id or remote name of the linked document.
    pub link_name: String,
}

/// Input for every "create X offline" operation on sales documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub customer: String,
    #[serde(default)]
    pub posting_date: Option<NaiveDate>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Document → company currency rate. Required when they differ.
    #[serde(default)]
    pub conversion_rate: Option<Decimal>,
    pub lines: Vec<LineRequest>,
    #[serde(default)]
    pub taxes: Vec<TaxRequest>,
    /// Tendered payments; only invoices accept them.
    #[serde(default)]
    pub payments: Vec<TenderLine>,
    #[serde(default)]
    pub links: Vec<LinkRequest>,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// Input for a standalone payment entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntryRequest {
    pub customer: String,
    /// Local id or remote name of the invoice being paid.
    #[serde(default)]
    pub invoice: Option<String>,
    /// Outstanding amount to pay down when no local invoice is referenced.
    #[serde(default)]
    pub outstanding: Option<Decimal>,
    pub tender: TenderLine,
    #[serde(default)]
    pub reference_no: Option<String>,
    #[serde(default)]
    pub posting_date: Option<NaiveDate>,
}

// =============================================================================
// Sales Document
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentItem {
    pub id: String,
    pub idx: i64,
    pub item_code: String,
    pub item_name: String,
    pub qty: Decimal,
    pub uom: String,
    pub rate: Decimal,
    pub amount: Decimal,
    pub warehouse: String,
    /// Stock-tracked lines are decremented locally when the document moves stock.
    pub is_stock_item: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTax {
    pub id: String,
    pub idx: i64,
    pub description: String,
    pub account_head: String,
    pub rate: Decimal,
    pub tax_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPayment {
    pub id: String,
    pub idx: i64,
    pub mode_of_payment: String,
    pub account: String,
    /// Allocated amount in document currency.
    pub amount: Decimal,
    pub payment_currency: String,
    /// Handed over, in payment currency.
    pub tendered: Decimal,
    pub change: Decimal,
    pub exchange_rate: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub id: String,
    pub link_doctype: DocType,
    pub link_name: String,
}

/// Header plus lines of a quotation, order, delivery note or invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesDocument {
    pub id: String,
    pub doc_type: DocType,
    pub tenant_id: String,
    pub company_id: String,
    pub customer: String,
    pub customer_name: String,
    pub posting_date: NaiveDate,
    pub currency: String,
    pub conversion_rate: Decimal,
    pub price_list: String,
    pub warehouse: String,
    /// Receivable account.
    pub debit_to: String,
    pub net_total: Decimal,
    pub tax_total: Decimal,
    pub grand_total: Decimal,
    /// Grand total in company currency.
    pub base_grand_total: Decimal,
    pub paid_amount: Decimal,
    pub outstanding_amount: Decimal,
    pub status: DocumentStatus,
    /// Whether creating this document moves warehouse stock.
    pub update_stock: bool,
    pub remarks: Option<String>,
    pub sync_status: SyncStatus,
    pub remote_name: Option<String>,
    pub remote_modified: Option<DateTime<Utc>>,
    pub push_attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub items: Vec<DocumentItem>,
    pub taxes: Vec<DocumentTax>,
    pub payments: Vec<DocumentPayment>,
    pub links: Vec<DocumentLink>,
}

impl SalesDocument {
    /// Receivable view used to allocate tendered payments.
    pub fn receivable(&self) -> Receivable {
        Receivable {
            document: self.id.clone(),
            outstanding: self.outstanding_amount,
            receivable_currency: self.currency.clone(),
            receivable_account: self.debit_to.clone(),
            invoice_currency: self.currency.clone(),
            invoice_to_receivable: Some(Decimal::ONE),
        }
    }

    /// Records payment allocations and re-derives paid/outstanding/status.
    pub fn apply_payments(&mut self, allocations: &[PaymentAllocation], precision: &CurrencyPrecision) {
        let start = self.payments.len() as i64;
        for (i, allocation) in allocations.iter().enumerate() {
            self.payments.push(DocumentPayment {
                id: new_line_id(),
                idx: start + i as i64 + 1,
                mode_of_payment: allocation.mode_of_payment.clone(),
                account: allocation.paid_to.clone(),
                amount: allocation.allocated,
                payment_currency: allocation.payment_currency.clone(),
                tendered: allocation.tendered,
                change: allocation.change,
                exchange_rate: allocation.exchange_rate,
            });
        }

        let paid: Decimal = self.payments.iter().map(|p| p.amount).sum();
        self.paid_amount = precision.round(paid.min(self.grand_total), &self.currency);
        self.outstanding_amount = precision.round(self.grand_total - self.paid_amount, &self.currency);
        self.status = derive_status(
            self.doc_type,
            self.paid_amount,
            self.outstanding_amount,
            precision.tolerance(&self.currency),
        );
        if self.status == DocumentStatus::Paid {
            self.outstanding_amount = Decimal::ZERO;
        }
    }

    /// Items whose stock this document decrements locally.
    pub fn stock_moves(&self) -> impl Iterator<Item = &DocumentItem> {
        let moves = self.update_stock;
        self.items.iter().filter(move |i| moves && i.is_stock_item)
    }

    pub fn is_local(&self) -> bool {
        crate::ids::is_local_id(&self.id)
    }
}

/// Paid / Partly Paid / Unpaid for invoices, Draft for everything else.
pub fn derive_status(
    doc_type: DocType,
    paid: Decimal,
    outstanding: Decimal,
    tolerance: Decimal,
) -> DocumentStatus {
    if doc_type != DocType::SalesInvoice {
        return DocumentStatus::Draft;
    }
    if outstanding <= tolerance {
        DocumentStatus::Paid
    } else if paid > Decimal::ZERO {
        DocumentStatus::PartlyPaid
    } else {
        DocumentStatus::Unpaid
    }
}

/// Validates `request` and builds a Pending sales document.
///
/// Tendered payments are not applied here: allocate them with
/// [`PaymentAllocationEngine`](crate::allocation::PaymentAllocationEngine)
/// against [`SalesDocument::receivable`] and pass the result to
/// [`SalesDocument::apply_payments`].
pub fn build_sales_document(
    doc_type: DocType,
    scope: &SalesScope,
    customer: Option<&Customer>,
    catalog: &CatalogSnapshot,
    request: &DocumentRequest,
    precision: &CurrencyPrecision,
    clock: &dyn Clock,
) -> CoreResult<SalesDocument> {
    if !doc_type.is_sales_document() {
        return Err(ValidationError::InvalidFormat {
            field: "doc_type".to_string(),
            reason: format!("{} is not a sales document", doc_type),
        }
        .into());
    }

    let customer = validate_customer(&request.customer, customer)?;

    if request.lines.is_empty() {
        return Err(ValidationError::EmptyDocument(doc_type.to_string()).into());
    }

    if !request.payments.is_empty() && doc_type != DocType::SalesInvoice {
        return Err(ValidationError::InvalidFormat {
            field: "payments".to_string(),
            reason: format!("{} does not accept payments", doc_type),
        }
        .into());
    }

    for link in &request.links {
        if !doc_type.can_link_to(link.link_doctype) {
            return Err(ValidationError::UnsupportedLink {
                doc_type: doc_type.to_string(),
                target: link.link_doctype.to_string(),
            }
            .into());
        }
    }

    let currency = request
        .currency
        .clone()
        .or_else(|| customer.default_currency.clone())
        .unwrap_or_else(|| scope.company_currency.clone());

    let conversion_rate = if same_currency(&currency, &scope.company_currency) {
        Decimal::ONE
    } else {
        request
            .conversion_rate
            .filter(|r| *r > Decimal::ZERO)
            .ok_or_else(|| CoreError::RateUnavailable {
                from: currency.clone(),
                to: scope.company_currency.clone(),
            })?
    };

    let mut items = Vec::with_capacity(request.lines.len());
    for (i, line) in request.lines.iter().enumerate() {
        let item = validate_line(catalog, line)?;
        let rate = match line.rate {
            Some(rate) => rate,
            None => catalog
                .price(&item.item_code)
                .ok_or_else(|| ValidationError::MissingPrice {
                    item: item.item_code.clone(),
                    price_list: scope.price_list.clone(),
                })?,
        };
        let rate = precision.round(rate, &currency);

        items.push(DocumentItem {
            id: new_line_id(),
            idx: i as i64 + 1,
            item_code: item.item_code.clone(),
            item_name: item.item_name.clone(),
            qty: line.qty,
            uom: item.stock_uom.clone(),
            rate,
            amount: precision.round(
                checked_product(&format!("amount for {}", item.item_code), line.qty, rate)?,
                &currency,
            ),
            warehouse: scope.warehouse.clone(),
            is_stock_item: item.is_stock_item,
        });
    }

    validate_stock(catalog, &request.lines)?;

    let net_total = items
        .iter()
        .try_fold(Decimal::ZERO, |acc, i| checked_sum("net_total", acc, i.amount))?;
    let mut taxes = Vec::with_capacity(request.taxes.len());
    for (i, tax) in request.taxes.iter().enumerate() {
        let charged = checked_product(&format!("tax {}", tax.description), net_total, tax.rate)?;
        taxes.push(DocumentTax {
            id: new_line_id(),
            idx: i as i64 + 1,
            description: tax.description.clone(),
            account_head: tax.account_head.clone(),
            rate: tax.rate,
            tax_amount: precision.round(charged / Decimal::ONE_HUNDRED, &currency),
        });
    }
    let tax_total = taxes
        .iter()
        .try_fold(Decimal::ZERO, |acc, t| checked_sum("tax_total", acc, t.tax_amount))?;
    let grand_total = precision.round(checked_sum("grand_total", net_total, tax_total)?, &currency);

    let links: Vec<DocumentLink> = request
        .links
        .iter()
        .map(|l| DocumentLink {
            id: new_line_id(),
            link_doctype: l.link_doctype,
            link_name: l.link_name.clone(),
        })
        .collect();

    let update_stock = match doc_type {
        DocType::DeliveryNote => true,
        DocType::SalesInvoice => !links.iter().any(|l| l.link_doctype == DocType::DeliveryNote),
        _ => false,
    };

    let now = clock.now();
    let status = derive_status(doc_type, Decimal::ZERO, grand_total, precision.tolerance(&currency));

    Ok(SalesDocument {
        id: new_local_id(doc_type),
        doc_type,
        tenant_id: scope.tenant_id.clone(),
        company_id: scope.company_id.clone(),
        customer: customer.name.clone(),
        customer_name: customer.customer_name.clone(),
        posting_date: request.posting_date.unwrap_or_else(|| clock.today()),
        currency: currency.clone(),
        conversion_rate,
        price_list: scope.price_list.clone(),
        warehouse: scope.warehouse.clone(),
        debit_to: customer
            .receivable_account
            .clone()
            .unwrap_or_else(|| scope.receivable_account.clone()),
        net_total,
        tax_total,
        grand_total,
        base_grand_total: precision.round(
            checked_product("base_grand_total", grand_total, conversion_rate)?,
            &scope.company_currency,
        ),
        paid_amount: Decimal::ZERO,
        outstanding_amount: if status == DocumentStatus::Paid {
            Decimal::ZERO
        } else {
            grand_total
        },
        status,
        update_stock,
        remarks: request.remarks.clone(),
        sync_status: SyncStatus::Pending,
        remote_name: None,
        remote_modified: None,
        push_attempts: 0,
        last_error: None,
        created_at: now,
        updated_at: now,
        last_synced_at: None,
        items,
        taxes,
        payments: Vec::new(),
        links,
    })
}

// =============================================================================
// Payment Entry
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReference {
    pub id: String,
    pub idx: i64,
    pub reference_doctype: DocType,
    /// Local id or remote name of the referenced document.
    pub reference_name: String,
    pub outstanding_before: Decimal,
    pub allocated_amount: Decimal,
}

/// A customer receipt against a receivable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub id: String,
    pub tenant_id: String,
    pub company_id: String,
    pub party: String,
    pub party_name: String,
    pub posting_date: NaiveDate,
    pub mode_of_payment: String,
    pub paid_from: String,
    pub paid_to: String,
    pub paid_from_currency: String,
    pub paid_to_currency: String,
    /// Allocated amount in receivable currency.
    pub paid_amount: Decimal,
    /// Kept amount in payment currency.
    pub received_amount: Decimal,
    pub exchange_rate: Option<Decimal>,
    pub reference_no: Option<String>,
    pub sync_status: SyncStatus,
    pub remote_name: Option<String>,
    pub remote_modified: Option<DateTime<Utc>>,
    pub push_attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub references: Vec<PaymentReference>,
}

/// Builds a Pending payment entry from a computed allocation.
///
/// `reference` names the invoice the allocation pays down, if any.
pub fn build_payment_entry(
    scope: &SalesScope,
    customer: &Customer,
    allocation: &PaymentAllocation,
    reference: Option<&str>,
    request: &PaymentEntryRequest,
    clock: &dyn Clock,
) -> PaymentEntry {
    let now = clock.now();
    let references = reference
        .map(|name| {
            vec![PaymentReference {
                id: new_line_id(),
                idx: 1,
                reference_doctype: DocType::SalesInvoice,
                reference_name: name.to_string(),
                outstanding_before: allocation.outstanding_before,
                allocated_amount: allocation.allocated,
            }]
        })
        .unwrap_or_default();

    PaymentEntry {
        id: new_local_id(DocType::PaymentEntry),
        tenant_id: scope.tenant_id.clone(),
        company_id: scope.company_id.clone(),
        party: customer.name.clone(),
        party_name: customer.customer_name.clone(),
        posting_date: request.posting_date.unwrap_or_else(|| clock.today()),
        mode_of_payment: allocation.mode_of_payment.clone(),
        paid_from: allocation.paid_from.clone(),
        paid_to: allocation.paid_to.clone(),
        paid_from_currency: allocation.receivable_currency.clone(),
        paid_to_currency: allocation.payment_currency.clone(),
        paid_amount: allocation.allocated,
        received_amount: allocation.received,
        exchange_rate: allocation.exchange_rate,
        reference_no: request.reference_no.clone(),
        sync_status: SyncStatus::Pending,
        remote_name: None,
        remote_modified: None,
        push_attempts: 0,
        last_error: None,
        created_at: now,
        updated_at: now,
        last_synced_at: None,
        references,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
