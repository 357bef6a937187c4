use bazaar_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::ShippingSnapshot;

/// The catalog's current view of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductQuote {
    pub product_id: i64,
    pub seller_id: i64,
    pub unit_price: Money,
    /// False for unlisted, suspended or out-of-stock products.
    pub purchasable: bool,
}

#[derive(Debug, Clone, Error)]
#[error("Catalog lookup failed: {0}")]
pub struct CatalogError(pub String);

/// Resolves the authoritative price of a product at checkout time.
#[allow(async_fn_in_trait)]
pub trait CatalogPriceResolver {
    /// Returns `None` if the product does not exist.
    async fn quote(&self, product_id: i64) -> Result<Option<ProductQuote>, CatalogError>;
}

pub trait DeliveryFeePolicy: Send + Sync {
    fn delivery_fee(&self, subtotal: Money, shipping: &ShippingSnapshot) -> Money;
}

/// Charges the same fee for every order, wherever it ships.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatDeliveryFee(pub Money);

impl DeliveryFeePolicy for FlatDeliveryFee {
    fn delivery_fee(&self, _subtotal: Money, _shipping: &ShippingSnapshot) -> Money {
        self.0
    }
}
