//! # Validation Module
//!
//! Customer, item, quantity and stock rules checked before any offline
//! document is written.
//!
//! ## Order of Checks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  customer exists ─► customer enabled                                    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  for each line: item exists ─► item enabled ─► qty > 0 ─► rate ≥ 0      │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  per item: Σ qty ≤ available + ε   (stock items without negative stock) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The first failing rule is returned; nothing has been written at that
//! point.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::catalog::{CatalogItem, CatalogSnapshot};
use crate::documents::LineRequest;
use crate::error::ValidationError;
use crate::types::Customer;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Slack allowed when comparing requested quantity to stock on hand.
pub const STOCK_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

// =============================================================================
// Validators
// =============================================================================

/// `a + b`, or `OutOfRange` for `field` when the sum does not fit.
pub fn checked_sum(field: &str, a: Decimal, b: Decimal) -> ValidationResult<Decimal> {
    a.checked_add(b).ok_or_else(|| ValidationError::OutOfRange {
        field: field.to_string(),
    })
}

/// `a * b`, or `OutOfRange` for `field` when the product does not fit.
pub fn checked_product(field: &str, a: Decimal, b: Decimal) -> ValidationResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| ValidationError::OutOfRange {
        field: field.to_string(),
    })
}

/// Rejects empty or whitespace-only values.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// The customer must exist and must not be disabled.
pub fn validate_customer<'a>(
    name: &str,
    customer: Option<&'a Customer>,
) -> ValidationResult<&'a Customer> {
    validate_required("customer", name)?;

    let customer = customer.ok_or_else(|| ValidationError::CustomerNotFound(name.to_string()))?;
    if customer.disabled {
        return Err(ValidationError::CustomerDisabled);
    }
    Ok(customer)
}

/// Checks one line against the catalog and returns its item.
pub fn validate_line<'a>(
    catalog: &'a CatalogSnapshot,
    line: &LineRequest,
) -> ValidationResult<&'a CatalogItem> {
    validate_required("item_code", &line.item_code)?;

    let item = catalog
        .item(&line.item_code)
        .ok_or_else(|| ValidationError::ItemNotFound(line.item_code.clone()))?;

    if item.disabled {
        return Err(ValidationError::ItemDisabled(item.item_code.clone()));
    }

    if line.qty <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: format!("qty for {}", item.item_code),
        });
    }

    if matches!(line.rate, Some(rate) if rate < Decimal::ZERO) {
        return Err(ValidationError::MustNotBeNegative {
            field: format!("rate for {}", item.item_code),
        });
    }

    Ok(item)
}

/// Checks that the warehouse covers every stock-tracked item.
///
/// Quantities of the same item across several lines are summed first.
pub fn validate_stock(catalog: &CatalogSnapshot, lines: &[LineRequest]) -> ValidationResult<()> {
    let mut requested: BTreeMap<&str, Decimal> = BTreeMap::new();
    for line in lines {
        let total = requested.entry(line.item_code.as_str()).or_default();
        *total = checked_sum(&format!("qty for {}", line.item_code), *total, line.qty)?;
    }

    for (item_code, qty) in requested {
        let Some(item) = catalog.item(item_code) else {
            return Err(ValidationError::ItemNotFound(item_code.to_string()));
        };
        if !item.is_stock_item || item.allow_negative_stock {
            continue;
        }

        let available = catalog.available(item_code);
        if available.saturating_add(STOCK_EPSILON) < qty {
            return Err(ValidationError::InsufficientStock {
                item: item_code.to_string(),
                available,
                requested: qty,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogKey;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn item(code: &str, stock_item: bool, negative_ok: bool, disabled: bool) -> CatalogItem {
        CatalogItem {
            item_code: code.into(),
            item_name: code.into(),
            item_group: None,
            stock_uom: "Nos".into(),
            is_stock_item: stock_item,
            disabled,
            allow_negative_stock: negative_ok,
        }
    }

    fn catalog() -> CatalogSnapshot {
        let mut c = CatalogSnapshot::new(CatalogKey::new("t", "c", "p", "w"), Utc::now());
        for i in [
            item("COKE", true, false, false),
            item("SERVICE", false, false, false),
            item("BACKORDER", true, true, false),
            item("OLD", true, false, true),
        ] {
            c.items.insert(i.item_code.clone(), i);
        }
        c.stock.insert("COKE".into(), dec!(5));
        c
    }

    fn line(code: &str, qty: Decimal) -> LineRequest {
        LineRequest {
            item_code: code.into(),
            qty,
            rate: None,
        }
    }

    fn customer(disabled: bool) -> Customer {
        Customer {
            name: "CUST-1".into(),
            customer_name: "Ana".into(),
            customer_group: None,
            default_currency: None,
            receivable_account: None,
            receivable_currency: None,
            disabled,
            remote_modified: None,
        }
    }

    #[test]
    fn test_validate_customer() {
        let enabled = customer(false);
        assert!(validate_customer("CUST-1", Some(&enabled)).is_ok());
        assert_eq!(
            validate_customer("CUST-1", None).unwrap_err(),
            ValidationError::CustomerNotFound("CUST-1".into())
        );
        assert_eq!(
            validate_customer("CUST-1", Some(&customer(true))).unwrap_err(),
            ValidationError::CustomerDisabled
        );
        assert!(matches!(
            validate_customer("  ", None).unwrap_err(),
            ValidationError::Required { .. }
        ));
    }

    #[test]
    fn test_validate_line() {
        let c = catalog();
        assert!(validate_line(&c, &line("COKE", dec!(1))).is_ok());
        assert!(matches!(validate_line(&c, &line("NOPE", dec!(1))), Err(ValidationError::ItemNotFound(_))));
        assert!(matches!(validate_line(&c, &line("OLD", dec!(1))), Err(ValidationError::ItemDisabled(_))));
        assert!(matches!(validate_line(&c, &line("COKE", dec!(0))), Err(ValidationError::MustBePositive { .. })));

        let mut negative = line("COKE", dec!(1));
        negative.rate = Some(dec!(-1));
        assert!(matches!(validate_line(&c, &negative), Err(ValidationError::MustNotBeNegative { .. })));
    }

    #[test]
    fn test_validate_stock_sums_lines() {
        let c = catalog();
        assert!(validate_stock(&c, &[line("COKE", dec!(3)), line("COKE", dec!(2))]).is_ok());

        let err = validate_stock(&c, &[line("COKE", dec!(3)), line("COKE", dec!(3))]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InsufficientStock {
                item: "COKE".into(),
                available: dec!(5),
                requested: dec!(6),
            }
        );
    }

    #[test]
    fn test_validate_stock_skips_untracked_and_negative_allowed() {
        let c = catalog();
        assert!(validate_stock(&c, &[line("SERVICE", dec!(100)), line("BACKORDER", dec!(50))]).is_ok());
    }

    #[test]
    fn test_stock_epsilon() {
        let c = catalog();
        assert!(validate_stock(&c, &[line("COKE", dec!(5.00005))]).is_ok());
        assert!(validate_stock(&c, &[line("COKE", dec!(5.001))]).is_err());
    }

    #[test]
    fn test_oversized_quantities_are_rejected() {
        let c = catalog();
        let err = validate_stock(&c, &[line("SERVICE", Decimal::MAX), line("SERVICE", Decimal::MAX)]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfRange {
                field: "qty for SERVICE".into()
            }
        );
        assert!(checked_product("amount", Decimal::MAX, dec!(2)).is_err());
        assert_eq!(checked_sum("total", dec!(1.5), dec!(2)).unwrap(), dec!(3.5));
    }
}
