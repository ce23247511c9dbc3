//! External collaborators: catalog lookup, notifications, navigation.
//!
//! The engine never depends on the return value of a notification or a
//! navigation, so both are plain synchronous sinks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::Product;
use crate::ids::ProductId;
use crate::money::Currency;

/// Severity of a transient notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Fire-and-forget sink for user-visible notices (toasts).
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, kind: NoticeKind, message: &str) {
        (**self).notify(kind, message)
    }
}

/// Notifier that forwards notices to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Success => tracing::info!(target: "turbo_cart::notice", "{message}"),
            NoticeKind::Error => tracing::warn!(target: "turbo_cart::notice", "{message}"),
        }
    }
}

/// Route changes requested by the engine.
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, route: &str);
}

impl<T: Navigator + ?Sized> Navigator for Arc<T> {
    fn navigate_to(&self, route: &str) {
        (**self).navigate_to(route)
    }
}

/// Navigator that only logs the requested route.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate_to(&self, route: &str) {
        tracing::debug!(route, "navigate");
    }
}

/// Errors from the catalog boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// No product with this id.
    #[error("Product not found: {0}")]
    NotFound(String),

    /// Record is missing data or carries impossible values.
    #[error("Invalid product record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },

    /// Catalog payload could not be parsed.
    #[error("Catalog parse error: {0}")]
    Parse(String),

    /// Catalog service unreachable.
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Parse(e.to_string())
    }
}

/// Product data as delivered by the catalog service.
///
/// Prices are in minor units. Nothing here is trusted until it has been
/// converted into a [`Product`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    #[serde(deserialize_with = "product_id_from_text_or_int")]
    pub id: ProductId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub hover_image: Option<String>,
    pub price: Option<i64>,
    #[serde(default)]
    pub discount_price: Option<i64>,
    #[serde(default)]
    pub offer_percentage: Option<u8>,
    #[serde(default)]
    pub desc: Option<String>,
}

/// Catalog services key products by integer or by string.
fn product_id_from_text_or_int<'de, D>(deserializer: D) -> Result<ProductId, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(u64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Int(n) => ProductId::from(n),
        RawId::Text(s) => ProductId::new(s),
    })
}

impl CatalogRecord {
    /// Validate and convert into a product priced in `currency`.
    pub fn into_product(self, currency: Currency) -> Result<Product, CatalogError> {
        Product::from_record(self, currency)
    }
}

/// Read-only product lookup.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, id: &ProductId) -> Result<Product, CatalogError>;
}

/// Catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    products: HashMap<ProductId, Product>,
    order: Vec<ProductId>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-validated products.
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        let mut catalog = Self::new();
        for product in products {
            catalog.insert(product);
        }
        catalog
    }

    /// Parse a JSON array of catalog records.
    ///
    /// Fails on the first record that does not validate.
    pub fn from_json(json: &str, currency: Currency) -> Result<Self, CatalogError> {
        let records: Vec<CatalogRecord> = serde_json::from_str(json)?;
        let products = records
            .into_iter()
            .map(|r| r.into_product(currency))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_products(products))
    }

    pub fn insert(&mut self, product: Product) {
        if !self.products.contains_key(&product.id) {
            self.order.push(product.id.clone());
        }
        self.products.insert(product.id.clone(), product);
    }

    /// Products in insertion order.
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.order.iter().filter_map(|id| self.products.get(id))
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        self.products
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }
}
