//! # Currency Precision
//!
//! The single rounding primitive for every monetary value in caja.
//!
//! ## Why One Primitive?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  line amount ──┐                                                        │
//! │  tax amount  ──┤                                                        │
//! │  allocation  ──┼──► CurrencyPrecision::round(value, "NIO") ──► 2 dp     │
//! │  outstanding ──┤                                                        │
//! │  received    ──┘    CurrencyPrecision::round_cash(value, "USD")         │
//! │                                                                         │
//! │  Nothing else formats or truncates money.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each currency resolves to a [`CurrencySpec`]: a ledger scale (minor units,
//! default 2), an optional cash-handling scale, and a rounding mode (half-up
//! unless configured as half-even).

use std::collections::HashMap;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Minor-unit scale used when a currency has no explicit configuration.
pub const DEFAULT_SCALE: u32 = 2;

/// Smallest clamp tolerance for allocation, in receivable-currency units.
pub const TOLERANCE_FLOOR: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

// =============================================================================
// Rounding Mode
// =============================================================================

/// How midpoints are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// 0.5 rounds away from zero.
    #[default]
    HalfUp,
    /// Banker's rounding: 0.5 rounds to the nearest even digit.
    HalfEven,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }
}

// =============================================================================
// Currency Spec
// =============================================================================

/// Precision rules for one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySpec {
    /// Ledger scale (number of minor-unit digits).
    pub scale: u32,

    /// Scale used when settling cash tenders. Falls back to `scale`.
    #[serde(default)]
    pub cash_scale: Option<u32>,

    #[serde(default)]
    pub rounding: RoundingMode,
}

impl Default for CurrencySpec {
    fn default() -> Self {
        CurrencySpec {
            scale: DEFAULT_SCALE,
            cash_scale: None,
            rounding: RoundingMode::HalfUp,
        }
    }
}

impl CurrencySpec {
    pub fn new(scale: u32) -> Self {
        CurrencySpec {
            scale,
            ..Default::default()
        }
    }

    pub fn with_cash_scale(mut self, cash_scale: u32) -> Self {
        self.cash_scale = Some(cash_scale);
        self
    }

    pub fn with_rounding(mut self, rounding: RoundingMode) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn cash_scale(&self) -> u32 {
        self.cash_scale.unwrap_or(self.scale)
    }

    /// One minor unit, e.g. `0.01` for scale 2.
    pub fn minor_unit(&self) -> Decimal {
        Decimal::new(1, self.scale)
    }
}

// =============================================================================
// Currency Precision
// =============================================================================

/// Registry of per-currency precision rules.
///
/// Codes are matched case-insensitively. Unknown codes use the default spec
/// (scale 2, half-up).
///
/// ## Example
/// ```rust
/// use caja_core::currency::{CurrencyPrecision, CurrencySpec, RoundingMode};
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let precision = CurrencyPrecision::new()
///     .with_currency("JPY", CurrencySpec::new(0))
///     .with_currency("EUR", CurrencySpec::new(2).with_rounding(RoundingMode::HalfEven));
///
/// let v = Decimal::from_str("10.125").unwrap();
/// assert_eq!(precision.round(v, "USD").to_string(), "10.13");
/// assert_eq!(precision.round(v, "EUR").to_string(), "10.12");
/// assert_eq!(precision.round(v, "JPY").to_string(), "10");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrencyPrecision {
    #[serde(default)]
    specs: HashMap<String, CurrencySpec>,

    #[serde(default)]
    default: CurrencySpec,
}

impl CurrencyPrecision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with_currency(mut self, code: &str, spec: CurrencySpec) -> Self {
        self.set(code, spec);
        self
    }

    /// Registers or replaces the rules for `code`.
    pub fn set(&mut self, code: &str, spec: CurrencySpec) {
        self.specs.insert(normalize(code), spec);
    }

    /// Resolves the rules for `code`.
    pub fn spec(&self, code: &str) -> CurrencySpec {
        self.specs
            .get(&normalize(code))
            .copied()
            .unwrap_or(self.default)
    }

    pub fn scale(&self, code: &str) -> u32 {
        self.spec(code).scale
    }

    /// Rounds `value` to the ledger scale of `code`.
    pub fn round(&self, value: Decimal, code: &str) -> Decimal {
        let spec = self.spec(code);
        value.round_dp_with_strategy(spec.scale, spec.rounding.strategy())
    }

    /// Rounds `value` to the cash-handling scale of `code`.
    pub fn round_cash(&self, value: Decimal, code: &str) -> Decimal {
        let spec = self.spec(code);
        value.round_dp_with_strategy(spec.cash_scale(), spec.rounding.strategy())
    }

    /// Floating-point entry point for values decoded from remote payloads.
    ///
    /// Non-finite input (NaN, ±∞) is returned unchanged so callers can detect
    /// upstream corruption instead of receiving a silent zero.
    pub fn round_f64(&self, value: f64, code: &str) -> f64 {
        if !value.is_finite() {
            return value;
        }
        match Decimal::from_f64(value) {
            Some(decimal) => self.round(decimal, code).to_f64().unwrap_or(value),
            None => value,
        }
    }

    /// Absolute allocation tolerance: half a minor unit, never below 0.05.
    pub fn tolerance(&self, code: &str) -> Decimal {
        let half_unit = self.spec(code).minor_unit() / Decimal::TWO;
        half_unit.max(TOLERANCE_FLOOR)
    }

    /// True when `value` rounds to zero in `code`.
    pub fn is_zero(&self, value: Decimal, code: &str) -> bool {
        self.round(value, code).is_zero()
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

// =============================================================================
// Unit Tests
// =============================================================================
