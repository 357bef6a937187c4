use std::{str::FromStr, sync::Arc, time::Duration};

use bazaar_common::Money;
use bazaar_order_engine::traits::{CatalogError, CatalogPriceResolver, ProductQuote};
use log::*;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);

/// A product as the catalog service describes it.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogProduct {
    pub id: i64,
    pub seller_id: i64,
    /// Decimal string in major units, e.g. `"5000.00"`
    pub price: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub stock: Option<i64>,
}

fn default_status() -> String {
    "active".to_string()
}

impl TryFrom<CatalogProduct> for ProductQuote {
    type Error = CatalogError;

    fn try_from(product: CatalogProduct) -> Result<Self, Self::Error> {
        let unit_price = Money::from_str(&product.price)
            .map_err(|e| CatalogError(format!("Product {} has an invalid price. {e}", product.id)))?;
        let in_stock = product.stock.map_or(true, |s| s > 0);
        let purchasable = product.status.eq_ignore_ascii_case("active") && in_stock;
        Ok(ProductQuote { product_id: product.id, seller_id: product.seller_id, unit_price, purchasable })
    }
}

/// Prices checkouts against the catalog service over HTTP.
#[derive(Clone)]
pub struct HttpCatalog {
    base_url: String,
    client: Arc<Client>,
}

impl HttpCatalog {
    pub fn new(base_url: &str) -> Result<Self, CatalogError> {
        let client = Client::builder().timeout(CATALOG_TIMEOUT).build().map_err(|e| CatalogError(e.to_string()))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client: Arc::new(client) })
    }

    pub fn url(&self, product_id: i64) -> String {
        format!("{}/products/{product_id}", self.base_url)
    }
}

impl CatalogPriceResolver for HttpCatalog {
    async fn quote(&self, product_id: i64) -> Result<Option<ProductQuote>, CatalogError> {
        let url = self.url(product_id);
        trace!("Fetching catalog entry: {url}");
        let response = self.client.get(url).send().await.map_err(|e| CatalogError(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Product {product_id} is not in the catalog");
                Ok(None)
            },
            s if s.is_success() => {
                let product = response.json::<CatalogProduct>().await.map_err(|e| CatalogError(e.to_string()))?;
                ProductQuote::try_from(product).map(Some)
            },
            s => {
                let message = response.text().await.unwrap_or_default();
                Err(CatalogError(format!("Catalog returned {s} for product {product_id}. {message}")))
            },
        }
    }
}
