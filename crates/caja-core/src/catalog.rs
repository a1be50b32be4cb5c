//! # Catalog Snapshot and Cache
//!
//! ## Read Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CatalogService::load(key)                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CatalogCache::get(key) ──hit──► Arc<CatalogSnapshot>                   │
//! │       │ miss                                                            │
//! │       ▼                                                                 │
//! │  groups + items + prices(price_list) + stock(warehouse) from SQLite     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CatalogCache::put(key, snapshot) ─────► Arc<CatalogSnapshot>           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Snapshots are immutable. Nothing expires on its own: entries leave the
//! cache only through [`CatalogCache::invalidate`],
//! [`CatalogCache::invalidate_scope`] or [`CatalogCache::clear`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Key
// =============================================================================

/// Identifies one assembled catalog view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogKey {
    pub tenant_id: String,
    pub company_id: String,
    pub price_list: String,
    pub warehouse: String,
}

impl CatalogKey {
    pub fn new(
        tenant_id: impl Into<String>,
        company_id: impl Into<String>,
        price_list: impl Into<String>,
        warehouse: impl Into<String>,
    ) -> Self {
        CatalogKey {
            tenant_id: tenant_id.into(),
            company_id: company_id.into(),
            price_list: price_list.into(),
            warehouse: warehouse.into(),
        }
    }

    /// The concatenated form used in logs: `tenant|company|price_list|warehouse`.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }

    /// Field-wise match; ids may themselves contain `|`.
    pub fn in_scope(&self, tenant_id: &str, company_id: &str) -> bool {
        self.tenant_id == tenant_id && self.company_id == company_id
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.tenant_id, self.company_id, self.price_list, self.warehouse
        )
    }
}

// =============================================================================
// Snapshot
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemGroup {
    pub name: String,
    pub parent: Option<String>,
    pub is_group: bool,
}

/// Catalog view of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub item_code: String,
    pub item_name: String,
    pub item_group: Option<String>,
    pub stock_uom: String,
    /// Stock-tracked items are checked against the warehouse and decremented.
    pub is_stock_item: bool,
    pub disabled: bool,
    pub allow_negative_stock: bool,
}

/// Categories, items, one price list and one warehouse, assembled once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub key: CatalogKey,
    pub groups: Vec<ItemGroup>,
    pub items: HashMap<String, CatalogItem>,
    pub prices: HashMap<String, Decimal>,
    pub stock: HashMap<String, Decimal>,
    pub built_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    pub fn new(key: CatalogKey, built_at: DateTime<Utc>) -> Self {
        CatalogSnapshot {
            key,
            groups: Vec::new(),
            items: HashMap::new(),
            prices: HashMap::new(),
            stock: HashMap::new(),
            built_at,
        }
    }

    pub fn item(&self, item_code: &str) -> Option<&CatalogItem> {
        self.items.get(item_code)
    }

    pub fn price(&self, item_code: &str) -> Option<Decimal> {
        self.prices.get(item_code).copied()
    }

    /// Quantity on hand in the snapshot's warehouse (zero when unknown).
    pub fn available(&self, item_code: &str) -> Decimal {
        self.stock.get(item_code).copied().unwrap_or(Decimal::ZERO)
    }

    /// Items a cashier may sell, sorted by name.
    pub fn sellable_items(&self) -> Vec<&CatalogItem> {
        let mut items: Vec<_> = self.items.values().filter(|i| !i.disabled).collect();
        items.sort_by(|a, b| a.item_name.cmp(&b.item_name));
        items
    }
}

// =============================================================================
// Cache
// =============================================================================

/// TTL-less, write-through cache of catalog snapshots.
#[derive(Debug, Default)]
pub struct CatalogCache {
    entries: RwLock<HashMap<CatalogKey, Arc<CatalogSnapshot>>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CatalogKey) -> Option<Arc<CatalogSnapshot>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Stores `snapshot` under `key`, replacing any previous entry.
    pub fn put(&self, key: &CatalogKey, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), snapshot.clone());
        snapshot
    }

    pub fn invalidate(&self, key: &CatalogKey) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Drops every price list/warehouse view of one tenant and company.
    pub fn invalidate_scope(&self, tenant_id: &str, company_id: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|k, _| !k.in_scope(tenant_id, company_id));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn key(price_list: &str, warehouse: &str) -> CatalogKey {
        CatalogKey::new("t1", "c1", price_list, warehouse)
    }

    fn snapshot(key: &CatalogKey) -> CatalogSnapshot {
        let mut s = CatalogSnapshot::new(key.clone(), Utc::now());
        s.items.insert(
            "COKE".into(),
            CatalogItem {
                item_code: "COKE".into(),
                item_name: "Coca-Cola".into(),
                item_group: None,
                stock_uom: "Nos".into(),
                is_stock_item: true,
                disabled: false,
                allow_negative_stock: false,
            },
        );
        s.stock.insert("COKE".into(), dec!(12));
        s
    }

    #[test]
    fn test_key_concatenation() {
        assert_eq!(key("Standard Selling", "Stores - C1").cache_key(), "t1|c1|Standard Selling|Stores - C1");
    }

    #[test]
    fn test_get_put_invalidate() {
        let cache = CatalogCache::new();
        let k = key("Retail", "Main");
        assert!(cache.get(&k).is_none());

        cache.put(&k, snapshot(&k));
        let hit = cache.get(&k).unwrap();
        assert_eq!(hit.available("COKE"), dec!(12));
        assert_eq!(hit.available("UNKNOWN"), Decimal::ZERO);

        assert!(cache.invalidate(&k));
        assert!(cache.get(&k).is_none());
        assert!(!cache.invalidate(&k));
    }

    #[test]
    fn test_invalidate_scope_leaves_other_companies() {
        let cache = CatalogCache::new();
        let a = key("Retail", "Main");
        let b = key("Wholesale", "Main");
        let other = CatalogKey::new("t1", "c2", "Retail", "Main");
        for k in [&a, &b, &other] {
            cache.put(k, snapshot(k));
        }

        assert_eq!(cache.invalidate_scope("t1", "c1"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&other).is_some());
    }

    #[test]
    fn test_invalidate_scope_with_separator_in_ids() {
        let cache = CatalogCache::new();
        // Same concatenated prefix "t|x|..." for both scopes.
        let plain = CatalogKey::new("t", "x|c", "Retail", "Main");
        let piped = CatalogKey::new("t|x", "c", "Retail", "Main");
        cache.put(&plain, snapshot(&plain));
        cache.put(&piped, snapshot(&piped));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.invalidate_scope("t", "x"), 0);
        assert_eq!(cache.invalidate_scope("t|x", "c"), 1);
        assert!(cache.get(&plain).is_some());
        assert!(cache.get(&piped).is_none());
    }

    #[test]
    fn test_put_replaces_wholesale() {
        let cache = CatalogCache::new();
        let k = key("Retail", "Main");
        cache.put(&k, snapshot(&k));
        cache.put(&k, CatalogSnapshot::new(k.clone(), Utc::now()));
        assert!(cache.get(&k).unwrap().items.is_empty());
    }
}
