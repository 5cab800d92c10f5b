//! C6 read service: resolves selectors to concrete tags and runs searches.
//! A thin pass-through over the gateway — almost all of C6's substance
//! (selector resolution) already lives in `catalogd_storage::gateway`, so
//! this module's job is batching and validating the `SearchParameters`
//! request before it reaches storage.
//!
//! Grounded on the same coordinator-struct pattern as `write.rs`.

use std::sync::Arc;

use catalogd_core::{search::SearchParameters, CatalogError, Tag, TagSelector};
use catalogd_storage::PostgresGateway;

pub struct ReadService {
    gateway: Arc<PostgresGateway>,
}

impl ReadService {
    pub fn new(gateway: Arc<PostgresGateway>) -> Self {
        Self { gateway }
    }

    /// Resolves a tenant code to its surrogate key, used by the gRPC layer
    /// once per incoming request.
    pub async fn tenant_pk(&self, tenant_code: &str) -> Result<i64, CatalogError> {
        self.gateway.tenant_pk(tenant_code).await
    }

    /// Resolves and loads a batch of tags (spec.md §4.6 `readObject`/
    /// `readBatch`). One miss fails the whole batch (C6 "Batch semantics").
    pub async fn read_batch(&self, tenant_pk: i64, selectors: &[TagSelector]) -> Result<Vec<Tag>, CatalogError> {
        self.gateway.load_tags(tenant_pk, selectors).await
    }

    /// Runs a search (spec.md §4.7 `search`).
    pub async fn search(&self, tenant_pk: i64, params: &SearchParameters) -> Result<Vec<Tag>, CatalogError> {
        params.validate()?;
        let tags = self.gateway.search(tenant_pk, params).await?;
        metrics::histogram!("catalogd_search_results").record(tags.len() as f64);
        Ok(tags)
    }
}
