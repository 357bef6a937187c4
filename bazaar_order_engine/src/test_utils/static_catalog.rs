use std::{collections::HashMap, sync::Arc};

use bazaar_common::Money;
use tokio::sync::RwLock;

use crate::traits::{CatalogError, CatalogPriceResolver, ProductQuote};

/// An in-memory product catalog. Clones share the same products, so prices can be changed while a test runs.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    products: Arc<RwLock<HashMap<i64, ProductQuote>>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_product(&self, product_id: i64, seller_id: i64, unit_price: Money) {
        let quote = ProductQuote { product_id, seller_id, unit_price, purchasable: true };
        self.products.write().await.insert(product_id, quote);
    }

    pub async fn set_price(&self, product_id: i64, unit_price: Money) {
        if let Some(q) = self.products.write().await.get_mut(&product_id) {
            q.unit_price = unit_price;
        }
    }

    pub async fn set_purchasable(&self, product_id: i64, purchasable: bool) {
        if let Some(q) = self.products.write().await.get_mut(&product_id) {
            q.purchasable = purchasable;
        }
    }
}

impl CatalogPriceResolver for StaticCatalog {
    async fn quote(&self, product_id: i64) -> Result<Option<ProductQuote>, CatalogError> {
        Ok(self.products.read().await.get(&product_id).cloned())
    }
}
