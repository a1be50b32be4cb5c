//! # Record Mapping
//!
//! Translation between ERP JSON records and local types.
//!
//! ## Direction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PULL   ERP record (Value) ──► ItemGroup, CatalogItem, ItemPrice,       │
//! │                                RemoteBin, CurrencyExchange,             │
//! │                                PaymentModeAccount, Customer,            │
//! │                                SalesDocument, PaymentEntry              │
//! │                                                                         │
//! │  PUSH   SalesDocument / PaymentEntry ──► create payload (Value)         │
//! │         carries custom_local_id; local link ids are swapped for the     │
//! │         remote names the caller resolved                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Numbers may arrive as JSON numbers or strings; flags as `0/1` or booleans.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use caja_core::documents::{
    derive_status, DocumentItem, DocumentLink, DocumentPayment, DocumentTax, PaymentReference,
};
use caja_core::ids::new_line_id;
use caja_core::{
    is_local_id, CatalogItem, CurrencyPrecision, Customer, DocType, ItemGroup, PaymentEntry,
    PaymentModeAccount, PaymentModeKind, SalesDocument, SyncStatus,
};
use caja_db::{CurrencyExchange, ItemPrice};

use crate::error::{SyncError, SyncResult};
use crate::remote::parse_erp_datetime;

/// Remote field that echoes the id a document had on the till.
pub const LOCAL_ID_FIELD: &str = "custom_local_id";

// =============================================================================
// Record Accessor
// =============================================================================

/// Typed field access over one remote record.
#[derive(Debug, Clone, Copy)]
struct Record<'a> {
    doc_type: DocType,
    value: &'a Value,
}

impl<'a> Record<'a> {
    fn new(doc_type: DocType, value: &'a Value) -> Self {
        Record { doc_type, value }
    }

    fn raw(&self, field: &str) -> Option<&'a Value> {
        self.value.get(field).filter(|v| !v.is_null())
    }

    fn opt_str(&self, field: &str) -> Option<String> {
        self.raw(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn str(&self, field: &str) -> SyncResult<String> {
        self.opt_str(field)
            .ok_or_else(|| SyncError::missing(self.doc_type.as_str(), field))
    }

    fn opt_decimal(&self, field: &str) -> SyncResult<Option<Decimal>> {
        let parsed = match self.raw(field) {
            None => return Ok(None),
            Some(Value::Number(n)) => parse_decimal(&n.to_string()),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
            Some(Value::String(s)) => parse_decimal(s.trim()),
            Some(other) => Err(format!("expected a number, got {}", other)),
        };
        parsed
            .map(Some)
            .map_err(|reason| SyncError::invalid(self.doc_type.as_str(), field, reason))
    }

    /// Missing numbers read as zero.
    fn decimal(&self, field: &str) -> SyncResult<Decimal> {
        Ok(self.opt_decimal(field)?.unwrap_or(Decimal::ZERO))
    }

    fn flag_or(&self, field: &str, default: bool) -> bool {
        match self.raw(field) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().map(|i| i != 0).unwrap_or(default),
            Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "True"),
            _ => default,
        }
    }

    fn flag(&self, field: &str) -> bool {
        self.flag_or(field, false)
    }

    fn date(&self, field: &str) -> SyncResult<NaiveDate> {
        let text = self.str(field)?;
        let day = text.get(..10).unwrap_or(&text);
        NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map_err(|e| SyncError::invalid(self.doc_type.as_str(), field, e.to_string()))
    }

    fn datetime(&self, field: &str) -> Option<DateTime<Utc>> {
        self.raw(field).and_then(Value::as_str).and_then(parse_erp_datetime)
    }

    fn modified(&self) -> Option<DateTime<Utc>> {
        self.datetime("modified")
    }

    fn children(&self, field: &str) -> Vec<Record<'a>> {
        self.raw(field)
            .and_then(Value::as_array)
            .map(|rows| rows.iter().map(|v| Record::new(self.doc_type, v)).collect())
            .unwrap_or_default()
    }

    fn idx(&self, position: usize) -> i64 {
        self.raw("idx")
            .and_then(Value::as_i64)
            .unwrap_or(position as i64 + 1)
    }
}

fn parse_decimal(text: &str) -> Result<Decimal, String> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| format!("'{}' is not a decimal: {}", text, e))
}

/// The `modified` timestamp of a raw record.
pub fn remote_modified(value: &Value) -> Option<DateTime<Utc>> {
    value.get("modified").and_then(Value::as_str).and_then(parse_erp_datetime)
}

/// The ERP `name` of a raw record.
pub fn remote_name(doc_type: DocType, value: &Value) -> SyncResult<String> {
    Record::new(doc_type, value).str("name")
}

// =============================================================================
// Masters (pull)
// =============================================================================

pub fn item_group_from(value: &Value) -> SyncResult<ItemGroup> {
    let r = Record::new(DocType::ItemGroup, value);
    Ok(ItemGroup {
        name: r.str("name")?,
        parent: r.opt_str("parent_item_group"),
        is_group: r.flag("is_group"),
    })
}

pub fn item_from(value: &Value) -> SyncResult<CatalogItem> {
    let r = Record::new(DocType::Item, value);
    let item_code = match r.opt_str("item_code") {
        Some(code) => code,
        None => r.str("name")?,
    };
    Ok(CatalogItem {
        item_name: r.opt_str("item_name").unwrap_or_else(|| item_code.clone()),
        item_code,
        item_group: r.opt_str("item_group"),
        stock_uom: r.opt_str("stock_uom").unwrap_or_else(|| "Nos".to_string()),
        is_stock_item: r.flag("is_stock_item"),
        disabled: r.flag("disabled"),
        allow_negative_stock: r.flag("allow_negative_stock"),
    })
}

pub fn item_price_from(value: &Value) -> SyncResult<ItemPrice> {
    let r = Record::new(DocType::ItemPrice, value);
    Ok(ItemPrice {
        name: r.str("name")?,
        item_code: r.str("item_code")?,
        price_list: r.str("price_list")?,
        currency: r.opt_str("currency"),
        rate: r.decimal("price_list_rate")?,
        remote_modified: r.modified(),
    })
}

/// Warehouse stock as the ERP reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteBin {
    pub item_code: String,
    pub warehouse: String,
    pub actual_qty: Decimal,
    pub remote_modified: Option<DateTime<Utc>>,
}

pub fn bin_from(value: &Value) -> SyncResult<RemoteBin> {
    let r = Record::new(DocType::Bin, value);
    Ok(RemoteBin {
        item_code: r.str("item_code")?,
        warehouse: r.str("warehouse")?,
        actual_qty: r.decimal("actual_qty")?,
        remote_modified: r.modified(),
    })
}

pub fn currency_exchange_from(value: &Value) -> SyncResult<CurrencyExchange> {
    let r = Record::new(DocType::CurrencyExchange, value);
    let exchange_rate = r.decimal("exchange_rate")?;
    if exchange_rate <= Decimal::ZERO {
        return Err(SyncError::invalid(
            DocType::CurrencyExchange.as_str(),
            "exchange_rate",
            "must be positive",
        ));
    }
    Ok(CurrencyExchange {
        name: r.str("name")?,
        from_currency: r.str("from_currency")?,
        to_currency: r.str("to_currency")?,
        exchange_rate,
        date: r.date("date")?,
        remote_modified: r.modified(),
    })
}

/// A mode of payment with the settlement account `company` uses.
///
/// Reads the `accounts` child table of a full record.
pub fn mode_of_payment_from(value: &Value, company: &str) -> SyncResult<PaymentModeAccount> {
    let r = Record::new(DocType::ModeOfPayment, value);
    let kind = match r.opt_str("type").as_deref() {
        Some("Cash") => PaymentModeKind::Cash,
        Some("Bank") => PaymentModeKind::Bank,
        _ => PaymentModeKind::General,
    };
    let account_row = r
        .children("accounts")
        .into_iter()
        .find(|row| row.opt_str("company").as_deref() == Some(company));

    Ok(PaymentModeAccount {
        mode: r.str("name")?,
        kind,
        account: account_row.and_then(|row| row.opt_str("default_account")),
        account_currency: account_row.and_then(|row| row.opt_str("account_currency")),
        enabled: r.flag_or("enabled", true),
    })
}

/// A customer, with the receivable account `company` uses when one is set.
pub fn customer_from(value: &Value, company: &str) -> SyncResult<Customer> {
    let r = Record::new(DocType::Customer, value);
    let name = r.str("name")?;
    let account_row = r
        .children("accounts")
        .into_iter()
        .find(|row| row.opt_str("company").as_deref() == Some(company));

    Ok(Customer {
        customer_name: r.opt_str("customer_name").unwrap_or_else(|| name.clone()),
        name,
        customer_group: r.opt_str("customer_group"),
        default_currency: r.opt_str("default_currency"),
        receivable_account: account_row.and_then(|row| row.opt_str("account")),
        receivable_currency: r
            .opt_str("receivable_currency")
            .or_else(|| account_row.and_then(|row| row.opt_str("account_currency"))),
        disabled: r.flag("disabled"),
        remote_modified: r.modified(),
    })
}

// =============================================================================
// Transactional Documents (pull)
// =============================================================================

/// Where a pulled record lands locally.
#[derive(Debug, Clone)]
pub struct PullContext<'a> {
    pub tenant_id: &'a str,
    pub company_id: &'a str,
    pub precision: &'a CurrencyPrecision,
    pub now: DateTime<Utc>,
}

/// Item-level fields that point back at a source document.
fn link_fields(doc_type: DocType) -> &'static [(&'static str, DocType)] {
    match doc_type {
        DocType::SalesOrder => &[("prevdoc_docname", DocType::Quotation)],
        DocType::DeliveryNote => &[("against_sales_order", DocType::SalesOrder)],
        DocType::SalesInvoice => &[
            ("sales_order", DocType::SalesOrder),
            ("delivery_note", DocType::DeliveryNote),
        ],
        _ => &[],
    }
}

fn date_field(doc_type: DocType) -> &'static str {
    match doc_type {
        DocType::Quotation | DocType::SalesOrder => "transaction_date",
        _ => "posting_date",
    }
}

/// Local id for a pulled record: the echoed local id when there is one.
fn local_id_of(r: &Record<'_>, name: &str) -> String {
    r.opt_str(LOCAL_ID_FIELD)
        .filter(|id| is_local_id(id))
        .unwrap_or_else(|| name.to_string())
}

pub fn sales_document_from(
    doc_type: DocType,
    value: &Value,
    ctx: &PullContext<'_>,
) -> SyncResult<SalesDocument> {
    if !doc_type.is_sales_document() {
        return Err(SyncError::Internal(format!("{} is not a sales document", doc_type)));
    }
    let r = Record::new(doc_type, value);
    let name = r.str("name")?;
    let currency = r.str("currency")?;

    let customer = match doc_type {
        DocType::Quotation => match r.opt_str("party_name") {
            Some(party) => party,
            None => r.str("customer")?,
        },
        _ => r.str("customer")?,
    };

    let item_rows = r.children("items");
    let warehouse = r
        .opt_str("set_warehouse")
        .or_else(|| item_rows.iter().find_map(|row| row.opt_str("warehouse")))
        .unwrap_or_default();

    let mut items = Vec::with_capacity(item_rows.len());
    let mut links: Vec<DocumentLink> = Vec::new();
    for (i, row) in item_rows.iter().enumerate() {
        let item_code = row.str("item_code")?;
        items.push(DocumentItem {
            id: row.opt_str("name").unwrap_or_else(new_line_id),
            idx: row.idx(i),
            item_name: row.opt_str("item_name").unwrap_or_else(|| item_code.clone()),
            item_code,
            qty: row.decimal("qty")?,
            uom: row
                .opt_str("uom")
                .or_else(|| row.opt_str("stock_uom"))
                .unwrap_or_else(|| "Nos".to_string()),
            rate: row.decimal("rate")?,
            amount: row.decimal("amount")?,
            warehouse: row.opt_str("warehouse").unwrap_or_else(|| warehouse.clone()),
            is_stock_item: row.flag_or("is_stock_item", true),
        });

        for (field, link_doctype) in link_fields(doc_type) {
            if let Some(link_name) = row.opt_str(field) {
                let seen = links
                    .iter()
                    .any(|l| l.link_doctype == *link_doctype && l.link_name == link_name);
                if !seen {
                    links.push(DocumentLink {
                        id: new_line_id(),
                        link_doctype: *link_doctype,
                        link_name,
                    });
                }
            }
        }
    }

    let mut taxes = Vec::new();
    for (i, row) in r.children("taxes").iter().enumerate() {
        let account_head = row.str("account_head")?;
        taxes.push(DocumentTax {
            id: row.opt_str("name").unwrap_or_else(new_line_id),
            idx: row.idx(i),
            description: row.opt_str("description").unwrap_or_else(|| account_head.clone()),
            account_head,
            rate: row.decimal("rate")?,
            tax_amount: row.decimal("tax_amount")?,
        });
    }

    let mut payments = Vec::new();
    if doc_type == DocType::SalesInvoice {
        for (i, row) in r.children("payments").iter().enumerate() {
            let amount = row.decimal("amount")?;
            payments.push(DocumentPayment {
                id: row.opt_str("name").unwrap_or_else(new_line_id),
                idx: row.idx(i),
                mode_of_payment: row.str("mode_of_payment")?,
                account: row.opt_str("account").unwrap_or_default(),
                amount,
                payment_currency: currency.clone(),
                tendered: amount,
                change: Decimal::ZERO,
                exchange_rate: None,
            });
        }
    }

    let paid_amount = r.decimal("paid_amount")?;
    let outstanding_amount = r.decimal("outstanding_amount")?;
    let status = derive_status(
        doc_type,
        paid_amount,
        outstanding_amount,
        ctx.precision.tolerance(&currency),
    );
    let update_stock = match doc_type {
        DocType::DeliveryNote => true,
        DocType::SalesInvoice => r.flag("update_stock"),
        _ => false,
    };

    Ok(SalesDocument {
        id: local_id_of(&r, &name),
        doc_type,
        tenant_id: ctx.tenant_id.to_string(),
        company_id: ctx.company_id.to_string(),
        customer_name: r.opt_str("customer_name").unwrap_or_else(|| customer.clone()),
        customer,
        posting_date: r.date(date_field(doc_type))?,
        conversion_rate: r.opt_decimal("conversion_rate")?.unwrap_or(Decimal::ONE),
        price_list: r.opt_str("selling_price_list").unwrap_or_default(),
        warehouse,
        debit_to: r.opt_str("debit_to").unwrap_or_default(),
        net_total: r.decimal("net_total")?,
        tax_total: r.decimal("total_taxes_and_charges")?,
        grand_total: r.decimal("grand_total")?,
        base_grand_total: r.decimal("base_grand_total")?,
        paid_amount,
        outstanding_amount,
        status,
        update_stock,
        remarks: r.opt_str("remarks"),
        sync_status: SyncStatus::Synced,
        remote_modified: r.modified(),
        remote_name: Some(name),
        push_attempts: 0,
        last_error: None,
        created_at: r.datetime("creation").unwrap_or(ctx.now),
        updated_at: ctx.now,
        last_synced_at: Some(ctx.now),
        currency,
        items,
        taxes,
        payments,
        links,
    })
}

pub fn payment_entry_from(value: &Value, ctx: &PullContext<'_>) -> SyncResult<PaymentEntry> {
    let r = Record::new(DocType::PaymentEntry, value);
    let name = r.str("name")?;
    let party = r.str("party")?;
    let paid_from_currency = r.str("paid_from_account_currency")?;
    let paid_to_currency = r.str("paid_to_account_currency")?;
    let paid_amount = r.decimal("paid_amount")?;
    let received_amount = r.decimal("received_amount")?;

    let exchange_rate = if paid_from_currency.eq_ignore_ascii_case(&paid_to_currency)
        || received_amount.is_zero()
    {
        None
    } else {
        Some((paid_amount / received_amount).round_dp(9))
    };

    let mut references = Vec::new();
    for (i, row) in r.children("references").iter().enumerate() {
        let doctype_text = row.str("reference_doctype")?;
        let reference_doctype = DocType::from_str(&doctype_text).map_err(|e| {
            SyncError::invalid(DocType::PaymentEntry.as_str(), "reference_doctype", e.to_string())
        })?;
        references.push(PaymentReference {
            id: row.opt_str("name").unwrap_or_else(new_line_id),
            idx: row.idx(i),
            reference_doctype,
            reference_name: row.str("reference_name")?,
            outstanding_before: row.decimal("outstanding_amount")?,
            allocated_amount: row.decimal("allocated_amount")?,
        });
    }

    Ok(PaymentEntry {
        id: local_id_of(&r, &name),
        tenant_id: ctx.tenant_id.to_string(),
        company_id: ctx.company_id.to_string(),
        party_name: r.opt_str("party_name").unwrap_or_else(|| party.clone()),
        party,
        posting_date: r.date("posting_date")?,
        mode_of_payment: r.opt_str("mode_of_payment").unwrap_or_default(),
        paid_from: r.str("paid_from")?,
        paid_to: r.str("paid_to")?,
        paid_from_currency,
        paid_to_currency,
        paid_amount,
        received_amount,
        exchange_rate,
        reference_no: r.opt_str("reference_no"),
        sync_status: SyncStatus::Synced,
        remote_modified: r.modified(),
        remote_name: Some(name),
        push_attempts: 0,
        last_error: None,
        created_at: r.datetime("creation").unwrap_or(ctx.now),
        updated_at: ctx.now,
        last_synced_at: Some(ctx.now),
        references,
    })
}

// =============================================================================
// Push Payloads
// =============================================================================

/// A JSON number with the decimal's exact text.
fn num(value: Decimal) -> Value {
    value
        .normalize()
        .to_string()
        .parse::<serde_json::Number>()
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Remote name for a linked document: resolved names win, remote names pass through.
fn remote_link(doc_type: DocType, name: &str, resolved: &HashMap<String, String>) -> SyncResult<String> {
    match resolved.get(name) {
        Some(remote) => Ok(remote.clone()),
        None if !is_local_id(name) => Ok(name.to_string()),
        None => Err(SyncError::UnresolvedLink {
            doc_type: doc_type.as_str().to_string(),
            name: name.to_string(),
        }),
    }
}

/// Local ids a document points at, which must be swapped for remote names.
pub fn local_links(doc: &SalesDocument) -> Vec<(DocType, String)> {
    doc.links
        .iter()
        .filter(|l| is_local_id(&l.link_name))
        .map(|l| (l.link_doctype, l.link_name.clone()))
        .collect()
}

pub fn local_references(entry: &PaymentEntry) -> Vec<(DocType, String)> {
    entry
        .references
        .iter()
        .filter(|r| is_local_id(&r.reference_name))
        .map(|r| (r.reference_doctype, r.reference_name.clone()))
        .collect()
}

/// Create payload for a sales document.
pub fn sales_document_payload(
    doc: &SalesDocument,
    resolved: &HashMap<String, String>,
) -> SyncResult<Value> {
    let mut item_links = Map::new();
    for link in &doc.links {
        let field = link_fields(doc.doc_type)
            .iter()
            .find(|(_, target)| *target == link.link_doctype)
            .map(|(field, _)| *field)
            .ok_or_else(|| {
                SyncError::invalid(
                    doc.doc_type.as_str(),
                    "links",
                    format!("cannot link to {}", link.link_doctype),
                )
            })?;
        if !item_links.contains_key(field) {
            let remote = remote_link(link.link_doctype, &link.link_name, resolved)?;
            item_links.insert(field.to_string(), Value::from(remote));
        }
    }

    let items: Vec<Value> = doc
        .items
        .iter()
        .map(|item| {
            let mut row = json!({
                "item_code": item.item_code,
                "item_name": item.item_name,
                "qty": num(item.qty),
                "uom": item.uom,
                "rate": num(item.rate),
                "warehouse": item.warehouse,
            });
            if let Some(obj) = row.as_object_mut() {
                obj.extend(item_links.clone());
            }
            row
        })
        .collect();

    let taxes: Vec<Value> = doc
        .taxes
        .iter()
        .map(|tax| {
            json!({
                "charge_type": "On Net Total",
                "account_head": tax.account_head,
                "description": tax.description,
                "rate": num(tax.rate),
            })
        })
        .collect();

    let mut payload = json!({
        "doctype": doc.doc_type.as_str(),
        LOCAL_ID_FIELD: doc.id,
        "company": doc.company_id,
        "currency": doc.currency,
        "conversion_rate": num(doc.conversion_rate),
        "selling_price_list": doc.price_list,
        "set_warehouse": doc.warehouse,
        "items": items,
        "taxes": taxes,
    });
    let Some(obj) = payload.as_object_mut() else {
        return Err(SyncError::Internal("payload is not an object".into()));
    };

    let date = Value::from(doc.posting_date.format("%Y-%m-%d").to_string());
    match doc.doc_type {
        DocType::Quotation => {
            obj.insert("quotation_to".into(), Value::from("Customer"));
            obj.insert("party_name".into(), Value::from(doc.customer.clone()));
            obj.insert("transaction_date".into(), date);
        }
        DocType::SalesOrder => {
            obj.insert("customer".into(), Value::from(doc.customer.clone()));
            obj.insert("transaction_date".into(), date.clone());
            obj.insert("delivery_date".into(), date);
        }
        _ => {
            obj.insert("customer".into(), Value::from(doc.customer.clone()));
            obj.insert("posting_date".into(), date);
            obj.insert("set_posting_time".into(), Value::from(1));
        }
    }

    if doc.doc_type == DocType::SalesInvoice {
        obj.insert("debit_to".into(), Value::from(doc.debit_to.clone()));
        obj.insert("update_stock".into(), Value::from(u8::from(doc.update_stock)));
        if !doc.payments.is_empty() {
            obj.insert("is_pos".into(), Value::from(1));
            let payments: Vec<Value> = doc
                .payments
                .iter()
                .map(|p| {
                    json!({
                        "mode_of_payment": p.mode_of_payment,
                        "account": p.account,
                        "amount": num(p.amount),
                    })
                })
                .collect();
            obj.insert("payments".into(), Value::from(payments));
        }
    }

    // The ERP only moves stock for submitted documents.
    if doc.update_stock {
        obj.insert("docstatus".into(), Value::from(1));
    }

    if let Some(remarks) = &doc.remarks {
        obj.insert("remarks".into(), Value::from(remarks.clone()));
    }

    Ok(payload)
}

/// Create payload for a customer receipt.
pub fn payment_entry_payload(
    entry: &PaymentEntry,
    resolved: &HashMap<String, String>,
) -> SyncResult<Value> {
    let mut references = Vec::with_capacity(entry.references.len());
    for reference in &entry.references {
        references.push(json!({
            "reference_doctype": reference.reference_doctype.as_str(),
            "reference_name": remote_link(reference.reference_doctype, &reference.reference_name, resolved)?,
            "allocated_amount": num(reference.allocated_amount),
        }));
    }

    let date = entry.posting_date.format("%Y-%m-%d").to_string();
    let mut payload = json!({
        "doctype": DocType::PaymentEntry.as_str(),
        LOCAL_ID_FIELD: entry.id,
        "payment_type": "Receive",
        "company": entry.company_id,
        "posting_date": date,
        "mode_of_payment": entry.mode_of_payment,
        "party_type": "Customer",
        "party": entry.party,
        "party_name": entry.party_name,
        "paid_from": entry.paid_from,
        "paid_to": entry.paid_to,
        "paid_from_account_currency": entry.paid_from_currency,
        "paid_to_account_currency": entry.paid_to_currency,
        "paid_amount": num(entry.paid_amount),
        "received_amount": num(entry.received_amount),
        "references": references,
    });

    if let (Some(reference_no), Some(obj)) = (&entry.reference_no, payload.as_object_mut()) {
        obj.insert("reference_no".into(), Value::from(reference_no.clone()));
        obj.insert("reference_date".into(), Value::from(date));
    }
    Ok(payload)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ctx(precision: &CurrencyPrecision) -> PullContext<'_> {
        PullContext {
            tenant_id: "t",
            company_id: "Caja Demo",
            precision,
            now: Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_item_flags_and_defaults() {
        let item = item_from(&json!({
            "name": "COKE",
            "item_name": "Coca-Cola 355ml",
            "is_stock_item": 1,
            "disabled": 0,
            "allow_negative_stock": "0",
        }))
        .unwrap();
        assert_eq!(item.item_code, "COKE");
        assert!(item.is_stock_item);
        assert!(!item.disabled);
        assert_eq!(item.stock_uom, "Nos");
    }

    #[test]
    fn test_numbers_may_be_strings() {
        let price = item_price_from(&json!({
            "name": "PRICE-1",
            "item_code": "COKE",
            "price_list": "Retail",
            "price_list_rate": "35.50",
            "modified": "2024-05-01 10:00:00.000000",
        }))
        .unwrap();
        assert_eq!(price.rate, dec!(35.50));
        assert!(price.remote_modified.is_some());

        let err = bin_from(&json!({"item_code": "COKE", "warehouse": "Main", "actual_qty": "lots"}))
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidField { .. }));
    }

    #[test]
    fn test_mode_of_payment_picks_company_account() {
        let mode = mode_of_payment_from(
            &json!({
                "name": "Efectivo USD",
                "type": "Cash",
                "enabled": 1,
                "accounts": [
                    {"company": "Other Co", "default_account": "Cash - OC"},
                    {"company": "Caja Demo", "default_account": "Caja USD - CD", "account_currency": "USD"},
                ],
            }),
            "Caja Demo",
        )
        .unwrap();
        assert_eq!(mode.kind, PaymentModeKind::Cash);
        assert_eq!(mode.account.as_deref(), Some("Caja USD - CD"));
        assert_eq!(mode.account_currency.as_deref(), Some("USD"));

        let unconfigured =
            mode_of_payment_from(&json!({"name": "Tarjeta", "type": "Bank"}), "Caja Demo").unwrap();
        assert_eq!(unconfigured.account, None);
        assert!(unconfigured.enabled);
    }

    #[test]
    fn test_zero_exchange_rate_is_rejected() {
        let err = currency_exchange_from(&json!({
            "name": "X", "from_currency": "USD", "to_currency": "NIO",
            "exchange_rate": 0, "date": "2024-05-01",
        }))
        .unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }

    #[test]
    fn test_pulled_invoice_keeps_echoed_local_id() {
        let precision = CurrencyPrecision::new();
        let doc = sales_document_from(
            DocType::SalesInvoice,
            &json!({
                "name": "ACC-SINV-2024-00001",
                "custom_local_id": "LOCAL-SINV-0123456789abcdef0123456789abcdef",
                "customer": "CUST-1",
                "posting_date": "2024-05-01",
                "currency": "NIO",
                "grand_total": 106.5,
                "paid_amount": 50,
                "outstanding_amount": 56.5,
                "update_stock": 1,
                "modified": "2024-05-01 12:00:00.000000",
                "items": [
                    {"name": "row-1", "item_code": "COKE", "qty": 3, "rate": 35.5, "amount": 106.5,
                     "warehouse": "Main", "sales_order": "SAL-ORD-0001"},
                ],
                "payments": [{"mode_of_payment": "Cash", "account": "Cash - C", "amount": 50}],
            }),
            &ctx(&precision),
        )
        .unwrap();

        assert_eq!(doc.id, "LOCAL-SINV-0123456789abcdef0123456789abcdef");
        assert_eq!(doc.remote_name.as_deref(), Some("ACC-SINV-2024-00001"));
        assert_eq!(doc.sync_status, SyncStatus::Synced);
        assert_eq!(doc.status, caja_core::DocumentStatus::PartlyPaid);
        assert_eq!(doc.warehouse, "Main");
        assert_eq!(doc.items[0].qty, dec!(3));
        assert_eq!(doc.payments.len(), 1);
        assert_eq!(doc.links[0].link_doctype, DocType::SalesOrder);
        assert_eq!(doc.links[0].link_name, "SAL-ORD-0001");
    }

    #[test]
    fn test_pulled_document_without_local_id_uses_remote_name() {
        let precision = CurrencyPrecision::new();
        let doc = sales_document_from(
            DocType::Quotation,
            &json!({
                "name": "SAL-QTN-0007",
                "party_name": "CUST-9",
                "transaction_date": "2024-04-30",
                "currency": "NIO",
            }),
            &ctx(&precision),
        )
        .unwrap();
        assert_eq!(doc.id, "SAL-QTN-0007");
        assert_eq!(doc.customer, "CUST-9");
        assert_eq!(doc.status, caja_core::DocumentStatus::Draft);
    }

    fn local_invoice() -> SalesDocument {
        let precision = CurrencyPrecision::new();
        let mut doc = sales_document_from(
            DocType::SalesInvoice,
            &json!({
                "name": "tmp",
                "customer": "CUST-1",
                "posting_date": "2024-05-01",
                "currency": "NIO",
                "items": [{"item_code": "COKE", "qty": 2, "rate": 35.5, "amount": 71}],
            }),
            &ctx(&precision),
        )
        .unwrap();
        doc.id = "LOCAL-SINV-aaaa".into();
        doc.remote_name = None;
        doc.links.push(DocumentLink {
            id: "l1".into(),
            link_doctype: DocType::DeliveryNote,
            link_name: "LOCAL-DN-bbbb".into(),
        });
        doc
    }

    #[test]
    fn test_payload_swaps_local_links() {
        let doc = local_invoice();
        assert_eq!(local_links(&doc), vec![(DocType::DeliveryNote, "LOCAL-DN-bbbb".to_string())]);

        let err = sales_document_payload(&doc, &HashMap::new()).unwrap_err();
        assert!(matches!(err, SyncError::UnresolvedLink { .. }));

        let resolved = HashMap::from([("LOCAL-DN-bbbb".to_string(), "MAT-DN-0001".to_string())]);
        let payload = sales_document_payload(&doc, &resolved).unwrap();
        assert_eq!(payload["custom_local_id"], "LOCAL-SINV-aaaa");
        assert_eq!(payload["doctype"], "Sales Invoice");
        assert_eq!(payload["posting_date"], "2024-05-01");
        assert_eq!(payload["items"][0]["delivery_note"], "MAT-DN-0001");
        assert_eq!(payload["items"][0]["qty"], 2.0);
        assert!(payload.get("payments").is_none());
        // Billed against a delivery note: the note moved the stock.
        assert!(payload.get("docstatus").is_none());
    }

    #[test]
    fn test_stock_moving_documents_are_submitted() {
        let mut doc = local_invoice();
        doc.links.clear();
        doc.update_stock = true;
        let payload = sales_document_payload(&doc, &HashMap::new()).unwrap();
        assert_eq!(payload["docstatus"], 1);
        assert_eq!(payload["update_stock"], 1);

        doc.doc_type = DocType::DeliveryNote;
        let payload = sales_document_payload(&doc, &HashMap::new()).unwrap();
        assert_eq!(payload["docstatus"], 1);

        doc.doc_type = DocType::SalesOrder;
        doc.update_stock = false;
        let payload = sales_document_payload(&doc, &HashMap::new()).unwrap();
        assert!(payload.get("docstatus").is_none());
    }

    #[test]
    fn test_payment_entry_payload() {
        let precision = CurrencyPrecision::new();
        let mut entry = payment_entry_from(
            &json!({
                "name": "tmp",
                "party": "CUST-1",
                "posting_date": "2024-05-01",
                "mode_of_payment": "Efectivo USD",
                "paid_from": "Debtors - CD",
                "paid_to": "Caja USD - CD",
                "paid_from_account_currency": "NIO",
                "paid_to_account_currency": "USD",
                "paid_amount": 50,
                "received_amount": 1.37,
                "references": [{"reference_doctype": "Sales Invoice", "reference_name": "LOCAL-SINV-aaaa",
                                "outstanding_amount": 50, "allocated_amount": 50}],
            }),
            &ctx(&precision),
        )
        .unwrap();
        assert!(entry.exchange_rate.is_some());
        entry.id = "LOCAL-PE-cccc".into();
        entry.reference_no = Some("R-1".into());

        let resolved = HashMap::from([("LOCAL-SINV-aaaa".to_string(), "ACC-SINV-0001".to_string())]);
        let payload = payment_entry_payload(&entry, &resolved).unwrap();
        assert_eq!(payload["payment_type"], "Receive");
        assert_eq!(payload["references"][0]["reference_name"], "ACC-SINV-0001");
        assert_eq!(payload["reference_date"], "2024-05-01");
        assert_eq!(payload["received_amount"], 1.37);
    }
}
