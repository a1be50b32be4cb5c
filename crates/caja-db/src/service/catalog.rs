//! # Catalog Service
//!
//! Read-through access to catalog snapshots. A miss assembles the snapshot
//! from SQLite and stores it; nothing expires on its own.

use std::sync::Arc;

use tracing::debug;

use crate::error::DbResult;
use crate::repository::catalog::CatalogRepository;
use caja_core::{CatalogCache, CatalogKey, CatalogSnapshot, Clock};

#[derive(Clone)]
pub struct CatalogService {
    repo: CatalogRepository,
    cache: Arc<CatalogCache>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CatalogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogService")
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl CatalogService {
    pub fn new(repo: CatalogRepository, cache: Arc<CatalogCache>, clock: Arc<dyn Clock>) -> Self {
        CatalogService { repo, cache, clock }
    }

    /// Returns the cached snapshot for `key`, building it on a miss.
    pub async fn load(&self, key: &CatalogKey) -> DbResult<Arc<CatalogSnapshot>> {
        if let Some(snapshot) = self.cache.get(key) {
            debug!(key = %key, "Catalog cache hit");
            return Ok(snapshot);
        }

        debug!(key = %key, "Catalog cache miss");
        let snapshot = self.repo.load_snapshot(key, self.clock.now()).await?;
        Ok(self.cache.put(key, snapshot))
    }

    /// Drops every cached view of a tenant and company.
    pub fn invalidate_scope(&self, tenant_id: &str, company_id: &str) -> usize {
        let dropped = self.cache.invalidate_scope(tenant_id, company_id);
        if dropped > 0 {
            debug!(tenant_id = %tenant_id, company_id = %company_id, dropped, "Catalog cache invalidated");
        }
        dropped
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }
}
