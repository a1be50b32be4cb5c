//! # Exchange-Rate Resolution
//!
//! ```text
//! rate(from, to)
//!      │
//!      ├── from == to ───────────────► 1 (no lookup)
//!      │
//!      ├── source.lookup(from, to) ──► direct rate
//!      │
//!      ├── source.lookup(to, from) ──► 1 / inverse rate
//!      │
//!      └── otherwise ────────────────► CoreError::RateUnavailable
//! ```
//!
//! The resolver is pure: it reads from an injected [`RateSource`] (the local
//! `Currency Exchange` table is loaded into a [`RateTable`] by caja-db) and
//! optionally memoizes results under a caller-supplied key. Memoized entries
//! live until the caller invalidates them.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use rust_decimal::Decimal;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Rate Source
// =============================================================================

/// Anything that can answer "how many `to` units buy one `from` unit".
pub trait RateSource: Send + Sync {
    fn lookup(&self, from: &str, to: &str) -> Option<Decimal>;
}

impl<T: RateSource + ?Sized> RateSource for &T {
    fn lookup(&self, from: &str, to: &str) -> Option<Decimal> {
        (**self).lookup(from, to)
    }
}

impl<T: RateSource + ?Sized> RateSource for std::sync::Arc<T> {
    fn lookup(&self, from: &str, to: &str) -> Option<Decimal> {
        (**self).lookup(from, to)
    }
}

/// In-memory table of direct rates.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: HashMap<(String, String), Decimal>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `1 from = rate to`. Later inserts for the same pair win.
    pub fn insert(&mut self, from: &str, to: &str, rate: Decimal) {
        self.rates.insert((code(from), code(to)), rate);
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: Decimal) -> Self {
        self.insert(from, to, rate);
        self
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl RateSource for RateTable {
    fn lookup(&self, from: &str, to: &str) -> Option<Decimal> {
        self.rates.get(&(code(from), code(to))).copied()
    }
}

fn code(c: &str) -> String {
    c.trim().to_ascii_uppercase()
}

fn usable(rate: &Decimal) -> bool {
    rate.is_sign_positive() && !rate.is_zero()
}

/// Case-insensitive currency comparison.
pub fn same_currency(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves conversion rates with direct/inverse lookup and an explicit cache.
#[derive(Debug)]
pub struct ExchangeRateResolver<S> {
    source: S,
    cache: RwLock<HashMap<String, Decimal>>,
}

impl<S: RateSource> ExchangeRateResolver<S> {
    pub fn new(source: S) -> Self {
        ExchangeRateResolver {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the rate converting one unit of `from` into `to`.
    pub fn rate(&self, from: &str, to: &str) -> CoreResult<Decimal> {
        if same_currency(from, to) {
            return Ok(Decimal::ONE);
        }

        if let Some(direct) = self.source.lookup(from, to).filter(usable) {
            return Ok(direct);
        }

        self.source
            .lookup(to, from)
            .filter(usable)
            .and_then(|inverse| Decimal::ONE.checked_div(inverse))
            .ok_or_else(|| CoreError::RateUnavailable {
                from: from.to_string(),
                to: to.to_string(),
            })
    }

    /// Like [`rate`](Self::rate) but memoized under `key`.
    ///
    /// Failed lookups are not cached.
    pub fn rate_cached(&self, key: &str, from: &str, to: &str) -> CoreResult<Decimal> {
        if same_currency(from, to) {
            return Ok(Decimal::ONE);
        }

        if let Some(rate) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Ok(*rate);
        }

        let rate = self.rate(from, to)?;
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), rate);
        Ok(rate)
    }

    /// Drops one memoized entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
