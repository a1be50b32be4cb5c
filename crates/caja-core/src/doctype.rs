//! # Doc Types and Status Enums
//!
//! ## Sync Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  catalog-affecting      ItemGroup → Item → ItemPrice → Bin              │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  configuration          CurrencyExchange → ModeOfPayment                │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  customer-affecting     Customer                                        │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  transactional          Quotation → SalesOrder → DeliveryNote           │
//! │                         → SalesInvoice → PaymentEntry                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Later types reference earlier ones (an invoice names items and a customer,
//! a payment entry names an invoice), so a pass always runs in this order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Doc Type
// =============================================================================

/// A synchronizable entity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum DocType {
    ItemGroup,
    Item,
    ItemPrice,
    Bin,
    CurrencyExchange,
    ModeOfPayment,
    Customer,
    Quotation,
    SalesOrder,
    DeliveryNote,
    SalesInvoice,
    PaymentEntry,
}

/// Table layout of a transactional doc type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocTables {
    pub header: &'static str,
    pub items: &'static str,
    pub taxes: &'static str,
    pub payments: Option<&'static str>,
    pub links: Option<&'static str>,
}

impl DocType {
    /// Every doc type, in the order a full pass runs them.
    pub const SYNC_ORDER: [DocType; 12] = [
        DocType::ItemGroup,
        DocType::Item,
        DocType::ItemPrice,
        DocType::Bin,
        DocType::CurrencyExchange,
        DocType::ModeOfPayment,
        DocType::Customer,
        DocType::Quotation,
        DocType::SalesOrder,
        DocType::DeliveryNote,
        DocType::SalesInvoice,
        DocType::PaymentEntry,
    ];

    /// The ERP doctype name, also used as the sync-state key.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocType::ItemGroup => "Item Group",
            DocType::Item => "Item",
            DocType::ItemPrice => "Item Price",
            DocType::Bin => "Bin",
            DocType::CurrencyExchange => "Currency Exchange",
            DocType::ModeOfPayment => "Mode of Payment",
            DocType::Customer => "Customer",
            DocType::Quotation => "Quotation",
            DocType::SalesOrder => "Sales Order",
            DocType::DeliveryNote => "Delivery Note",
            DocType::SalesInvoice => "Sales Invoice",
            DocType::PaymentEntry => "Payment Entry",
        }
    }

    /// Position in [`SYNC_ORDER`](Self::SYNC_ORDER).
    pub fn sync_rank(&self) -> usize {
        Self::SYNC_ORDER
            .iter()
            .position(|d| d == self)
            .unwrap_or(Self::SYNC_ORDER.len())
    }

    /// Doc types whose changes alter the catalog snapshot.
    pub const fn is_catalog_affecting(&self) -> bool {
        matches!(
            self,
            DocType::ItemGroup | DocType::Item | DocType::ItemPrice | DocType::Bin
        )
    }

    /// Doc types the POS creates offline and pushes.
    pub const fn is_pushable(&self) -> bool {
        matches!(
            self,
            DocType::Quotation
                | DocType::SalesOrder
                | DocType::DeliveryNote
                | DocType::SalesInvoice
                | DocType::PaymentEntry
        )
    }

    /// Sales documents that share the header/items/taxes shape.
    pub const fn is_sales_document(&self) -> bool {
        matches!(
            self,
            DocType::Quotation | DocType::SalesOrder | DocType::DeliveryNote | DocType::SalesInvoice
        )
    }

    /// Prefix used in local ids.
    pub const fn local_prefix(&self) -> Option<&'static str> {
        match self {
            DocType::Quotation => Some("QTN"),
            DocType::SalesOrder => Some("SO"),
            DocType::DeliveryNote => Some("DN"),
            DocType::SalesInvoice => Some("SINV"),
            DocType::PaymentEntry => Some("PE"),
            _ => None,
        }
    }

    /// Local tables of a sales document.
    pub const fn tables(&self) -> Option<DocTables> {
        match self {
            DocType::Quotation => Some(DocTables {
                header: "quotations",
                items: "quotation_items",
                taxes: "quotation_taxes",
                payments: None,
                links: None,
            }),
            DocType::SalesOrder => Some(DocTables {
                header: "sales_orders",
                items: "sales_order_items",
                taxes: "sales_order_taxes",
                payments: None,
                links: Some("sales_order_links"),
            }),
            DocType::DeliveryNote => Some(DocTables {
                header: "delivery_notes",
                items: "delivery_note_items",
                taxes: "delivery_note_taxes",
                payments: None,
                links: Some("delivery_note_links"),
            }),
            DocType::SalesInvoice => Some(DocTables {
                header: "sales_invoices",
                items: "sales_invoice_items",
                taxes: "sales_invoice_taxes",
                payments: Some("sales_invoice_payments"),
                links: Some("sales_invoice_links"),
            }),
            _ => None,
        }
    }

    /// Which doc types a document of this type may link back to.
    pub fn can_link_to(&self, target: DocType) -> bool {
        match self {
            DocType::SalesOrder => target == DocType::Quotation,
            DocType::DeliveryNote => target == DocType::SalesOrder,
            DocType::SalesInvoice => {
                matches!(target, DocType::SalesOrder | DocType::DeliveryNote)
            }
            _ => false,
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocType::SYNC_ORDER
            .iter()
            .copied()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "doc_type".to_string(),
                reason: format!("unknown doc type '{}'", s),
            })
    }
}

// =============================================================================
// Sync Status
// =============================================================================

/// Sync status of a locally stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Created offline, not yet acknowledged by the ERP.
    #[default]
    Pending,
    /// Acknowledged; `remote_name` is set.
    Synced,
    /// Last push attempt failed; retried on the next pass.
    Failed,
}

impl SyncStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Document Status
// =============================================================================

/// Payment-derived status of a sales document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Orders, quotations and delivery notes carry no payment state.
    #[default]
    Draft,
    Unpaid,
    PartlyPaid,
    Paid,
}

impl DocumentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Unpaid => "unpaid",
            DocumentStatus::PartlyPaid => "partly_paid",
            DocumentStatus::Paid => "paid",
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_order_groups() {
        let order = DocType::SYNC_ORDER;
        let last_catalog = order.iter().rposition(|d| d.is_catalog_affecting()).unwrap();
        let customer = order.iter().position(|d| *d == DocType::Customer).unwrap();
        let first_pushable = order.iter().position(|d| d.is_pushable()).unwrap();

        assert!(last_catalog < customer);
        assert!(customer < first_pushable);
        assert!(DocType::SalesInvoice.sync_rank() < DocType::PaymentEntry.sync_rank());
    }

    #[test]
    fn test_round_trip_names() {
        for doc_type in DocType::SYNC_ORDER {
            assert_eq!(doc_type.as_str().parse::<DocType>().unwrap(), doc_type);
        }
        assert_eq!("sales invoice".parse::<DocType>().unwrap(), DocType::SalesInvoice);
        assert!("Journal Entry".parse::<DocType>().is_err());
    }

    #[test]
    fn test_tables() {
        let invoice = DocType::SalesInvoice.tables().unwrap();
        assert_eq!(invoice.header, "sales_invoices");
        assert_eq!(invoice.payments, Some("sales_invoice_payments"));
        assert!(DocType::Quotation.tables().unwrap().links.is_none());
        assert!(DocType::Item.tables().is_none());
        assert!(DocType::PaymentEntry.tables().is_none());
    }

    #[test]
    fn test_links() {
        assert!(DocType::SalesInvoice.can_link_to(DocType::DeliveryNote));
        assert!(DocType::DeliveryNote.can_link_to(DocType::SalesOrder));
        assert!(!DocType::Quotation.can_link_to(DocType::SalesOrder));
    }
}
