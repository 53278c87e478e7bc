//! Catalog and subscription wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Offset-paginated response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total number of items across all pages.
    pub count: u64,
    /// URL of the next page, if any.
    #[serde(default)]
    pub next: Option<String>,
    /// URL of the previous page, if any.
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    pub price: f64,
    pub available: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub serving_size: Option<String>,
    #[serde(default)]
    pub ingredients: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub usage_instructions: Option<String>,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

/// A subscription plan offered by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub plan_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub products_per_month: Option<u32>,
    #[serde(default)]
    pub features: Vec<String>,
    pub is_active: bool,
}

/// The current user's subscription to a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub remaining_products: Option<u32>,
    pub renewal_enabled: bool,
    pub price_paid: f64,
    /// Expanded plan details, when the service includes them.
    #[serde(default)]
    pub plan: Option<Plan>,
}

/// Query filter for product listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub category: Option<Uuid>,
    pub brand: Option<String>,
    pub available: Option<bool>,
    pub search: Option<String>,
}

impl ProductFilter {
    /// Render as a query string, empty when no filter is set.
    pub(crate) fn to_query(&self) -> String {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(category) = &self.category {
            params.push(("category", category.to_string()));
        }
        if let Some(brand) = &self.brand {
            params.push(("brand", brand.clone()));
        }
        if let Some(available) = self.available {
            params.push(("available", available.to_string()));
        }
        if let Some(search) = &self.search {
            params.push(("search", search.clone()));
        }

        if params.is_empty() {
            return String::new();
        }

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in params {
            query.append_pair(key, &value);
        }
        format!("?{}", query.finish())
    }
}
