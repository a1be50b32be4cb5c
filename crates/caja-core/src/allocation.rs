//! # Payment Allocation
//!
//! Turns a tendered payment into an exact allocation against a receivable.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. rate  payment → receivable                                          │
//! │       same currency ........... identity, no multiplication at all      │
//! │       both legs known ......... (payment → invoice) × (invoice → recv)   │
//! │       otherwise ............... ExchangeRateResolver (direct/inverse)   │
//! │                                                                         │
//! │  2. converted = round(tendered × rate, receivable)                      │
//! │                                                                         │
//! │  3. converted ≥ outstanding − tolerance ?                               │
//! │       yes → allocated = outstanding   (pays it off exactly)             │
//! │       no  → allocated = converted                                       │
//! │                                                                         │
//! │  4. received = round(allocated ÷ rate, payment [cash scale for cash])   │
//! │     change   = tendered − received                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tolerance is half a minor unit of the receivable currency with a floor of
//! 0.05, which absorbs rate round-trip error so a balance never sticks at
//! 0.01.
//!
//! Invariants: `allocated ≤ outstanding_before` and
//! `outstanding_before − allocated == outstanding_after`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::currency::CurrencyPrecision;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::exchange::{same_currency, ExchangeRateResolver, RateSource};

// =============================================================================
// Inputs
// =============================================================================

/// How a mode of payment settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentModeKind {
    /// Received amounts round to the currency's cash scale.
    Cash,
    Bank,
    #[default]
    General,
}

/// A mode of payment with its settlement account for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentModeAccount {
    pub mode: String,
    pub kind: PaymentModeKind,
    pub account: Option<String>,
    pub account_currency: Option<String>,
    pub enabled: bool,
}

impl PaymentModeAccount {
    fn settlement_account(&self) -> CoreResult<&str> {
        self.account
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| CoreError::UnconfiguredPaymentMode {
                mode: self.mode.clone(),
            })
    }
}

/// One tendered payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderLine {
    pub mode: String,
    pub amount: Decimal,
    pub currency: String,
    /// Explicit payment → invoice rate captured at the till.
    #[serde(default)]
    pub rate: Option<Decimal>,
}

/// The receivable being paid down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receivable {
    /// Document name, for error messages and references.
    pub document: String,
    pub outstanding: Decimal,
    pub receivable_currency: String,
    pub receivable_account: String,
    pub invoice_currency: String,
    /// Invoice → receivable conversion rate, when known.
    #[serde(default)]
    pub invoice_to_receivable: Option<Decimal>,
}

// =============================================================================
// Output
// =============================================================================

/// An exact, ready-to-persist allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentAllocation {
    pub document: String,
    pub mode_of_payment: String,
    /// Receivable account (paid from).
    pub paid_from: String,
    /// Settlement account (paid to).
    pub paid_to: String,
    pub receivable_currency: String,
    pub payment_currency: String,
    #[ts(as = "String")]
    pub outstanding_before: Decimal,
    #[ts(as = "String")]
    pub allocated: Decimal,
    #[ts(as = "String")]
    pub outstanding_after: Decimal,
    /// Amount handed over, in payment currency.
    #[ts(as = "String")]
    pub tendered: Decimal,
    /// Portion of the tender actually kept, in payment currency.
    #[ts(as = "String")]
    pub received: Decimal,
    /// Change due back, in payment currency.
    #[ts(as = "String")]
    pub change: Decimal,
    /// Effective payment → receivable rate; `None` for same-currency tenders.
    #[ts(as = "Option<String>")]
    pub exchange_rate: Option<Decimal>,
}

impl PaymentAllocation {
    pub fn settles(&self) -> bool {
        self.outstanding_after.is_zero()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Computes payment allocations. No side effects.
#[derive(Debug)]
pub struct PaymentAllocationEngine<'a, S> {
    precision: &'a CurrencyPrecision,
    rates: &'a ExchangeRateResolver<S>,
}

impl<'a, S: RateSource> PaymentAllocationEngine<'a, S> {
    pub fn new(precision: &'a CurrencyPrecision, rates: &'a ExchangeRateResolver<S>) -> Self {
        PaymentAllocationEngine { precision, rates }
    }

    /// Allocates one tender against `receivable`.
    pub fn allocate(
        &self,
        receivable: &Receivable,
        tender: &TenderLine,
        mode: &PaymentModeAccount,
    ) -> CoreResult<PaymentAllocation> {
        let recv_ccy = receivable.receivable_currency.as_str();
        let pay_ccy = tender.currency.as_str();

        let outstanding = self.precision.round(receivable.outstanding, recv_ccy);
        if outstanding <= Decimal::ZERO {
            return Err(CoreError::NothingToAllocate {
                document: receivable.document.clone(),
            });
        }

        let paid_to = mode.settlement_account()?.to_string();

        if tender.amount <= Decimal::ZERO {
            return Err(ValidationError::MustBePositive {
                field: "tendered amount".to_string(),
            }
            .into());
        }

        let rate = self.resolve_rate(receivable, tender)?;

        let converted = match rate {
            None => self.precision.round(tender.amount, recv_ccy),
            Some(rate) => self.precision.round(tender.amount * rate, recv_ccy),
        };

        let tolerance = self.precision.tolerance(recv_ccy);
        let allocated = if converted >= outstanding - tolerance {
            outstanding
        } else {
            converted
        };
        let outstanding_after = self.precision.round(outstanding - allocated, recv_ccy);

        let raw_received = match rate {
            None => allocated,
            Some(rate) => allocated
                .checked_div(rate)
                .ok_or_else(|| CoreError::RateUnavailable {
                    from: pay_ccy.to_string(),
                    to: recv_ccy.to_string(),
                })?,
        };
        let tendered = self.round_tender(tender.amount, pay_ccy, mode);
        let received = self.round_tender(raw_received, pay_ccy, mode).min(tendered);
        let change = tendered - received;

        Ok(PaymentAllocation {
            document: receivable.document.clone(),
            mode_of_payment: mode.mode.clone(),
            paid_from: receivable.receivable_account.clone(),
            paid_to,
            receivable_currency: recv_ccy.to_string(),
            payment_currency: pay_ccy.to_string(),
            outstanding_before: outstanding,
            allocated,
            outstanding_after,
            tendered,
            received,
            change,
            exchange_rate: rate,
        })
    }

    /// Allocates tenders in order until the receivable is settled.
    ///
    /// Tenders left over once the balance reaches zero are not allocated.
    pub fn allocate_all(
        &self,
        receivable: &Receivable,
        tenders: &[TenderLine],
        modes: &[PaymentModeAccount],
    ) -> CoreResult<Vec<PaymentAllocation>> {
        let mut remaining = receivable.clone();
        let mut allocations = Vec::with_capacity(tenders.len());

        for tender in tenders {
            if !allocations.is_empty()
                && self
                    .precision
                    .is_zero(remaining.outstanding, &remaining.receivable_currency)
            {
                break;
            }

            let mode = modes
                .iter()
                .find(|m| m.mode == tender.mode && m.enabled)
                .ok_or_else(|| CoreError::UnconfiguredPaymentMode {
                    mode: tender.mode.clone(),
                })?;

            let allocation = self.allocate(&remaining, tender, mode)?;
            remaining.outstanding = allocation.outstanding_after;
            allocations.push(allocation);
        }

        Ok(allocations)
    }

    /// `None` means identity (no conversion step at all).
    fn resolve_rate(&self, receivable: &Receivable, tender: &TenderLine) -> CoreResult<Option<Decimal>> {
        let pay = tender.currency.as_str();
        let invoice = receivable.invoice_currency.as_str();
        let recv = receivable.receivable_currency.as_str();

        if same_currency(pay, recv) {
            return Ok(None);
        }

        let pay_to_invoice = if same_currency(pay, invoice) {
            Some(Decimal::ONE)
        } else {
            tender.rate.filter(|r| *r > Decimal::ZERO)
        };
        let invoice_to_recv = if same_currency(invoice, recv) {
            Some(Decimal::ONE)
        } else {
            receivable.invoice_to_receivable.filter(|r| *r > Decimal::ZERO)
        };

        // A known leg is kept; only the missing one is looked up.
        let rate = match (pay_to_invoice, invoice_to_recv) {
            (Some(a), Some(b)) => a * b,
            (Some(a), None) => a * self.rates.rate(invoice, recv)?,
            (None, Some(b)) => self.rates.rate(pay, invoice)? * b,
            (None, None) => self.rates.rate(pay, recv)?,
        };
        Ok(Some(rate))
    }

    fn round_tender(&self, value: Decimal, currency: &str, mode: &PaymentModeAccount) -> Decimal {
        match mode.kind {
            PaymentModeKind::Cash => self.precision.round_cash(value, currency),
            _ => self.precision.round(value, currency),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
