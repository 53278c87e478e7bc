//! Product Catalog Client
//!
//! Thin typed wrapper over the authenticated request pipeline. Fetch and
//! decode only: no caching, no retry policy of its own (the pipeline owns
//! authentication recovery).

use crate::error::{CommerceError, Result};
use crate::types::{Category, Page, Product, ProductFilter};
use bridge_traits::{HttpMethod, HttpResponse};
use core_session::RequestPipeline;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Typed client for the product catalog endpoints.
pub struct CatalogClient {
    pipeline: Arc<RequestPipeline>,
}

impl CatalogClient {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    /// List products matching a filter, one page at a time.
    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Page<Product>> {
        let path = format!("/catalog/products{}", filter.to_query());
        let response = self.pipeline.send(HttpMethod::Get, &path, None).await?;
        let page: Page<Product> = decode(&response)?;
        debug!(count = page.count, returned = page.results.len(), "Products listed");
        Ok(page)
    }

    /// Fetch a single product by id.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> Result<Product> {
        let path = format!("/catalog/products/{}", id);
        let response = self.pipeline.send(HttpMethod::Get, &path, None).await?;
        decode(&response)
    }

    /// List all product categories.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let response = self
            .pipeline
            .send(HttpMethod::Get, "/catalog/categories", None)
            .await?;
        decode(&response)
    }
}

/// Decode a 2xx response body, mapping shape mismatches to `Decode`.
pub(crate) fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    response
        .json()
        .map_err(|e| CommerceError::Decode(e.to_string()))
}
