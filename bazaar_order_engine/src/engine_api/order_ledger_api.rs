use std::{fmt::Debug, sync::Arc};

use bazaar_common::{Money, DEFAULT_CURRENCY_CODE};
use log::*;

use crate::{
    db_types::{
        Actor,
        LineItemRequest,
        NewOrder,
        NewOrderItem,
        Order,
        OrderStatusType,
        ShippingSnapshot,
        MAX_LINE_QUANTITY,
    },
    engine_api::{order_objects::TransitionDetails, transitions::apply_transition},
    events::{EventProducers, OrderCreatedEvent},
    traits::{CatalogPriceResolver, DeliveryFeePolicy, FlatDeliveryFee, OrderFlowDatabase, OrderFlowError},
};

/// `OrderLedgerApi` creates orders at checkout, and moves them through their life cycle.
///
/// Prices come from the catalog resolver, never from the caller. Once written, an order's items and amounts never
/// change.
pub struct OrderLedgerApi<B, C> {
    db: B,
    catalog: C,
    delivery: Arc<dyn DeliveryFeePolicy>,
    currency: String,
    producers: EventProducers,
}

impl<B, C> Debug for OrderLedgerApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderLedgerApi ({})", self.currency)
    }
}

impl<B, C> OrderLedgerApi<B, C> {
    /// Creates a ledger with no delivery fee, trading in the default currency.
    pub fn new(db: B, catalog: C, producers: EventProducers) -> Self {
        Self {
            db,
            catalog,
            delivery: Arc::new(FlatDeliveryFee::default()),
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            producers,
        }
    }

    pub fn with_delivery_policy<P: DeliveryFeePolicy + 'static>(mut self, policy: P) -> Self {
        self.delivery = Arc::new(policy);
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }
}

impl<B, C> OrderLedgerApi<B, C>
where
    B: OrderFlowDatabase,
    C: CatalogPriceResolver,
{
    /// Creates a pending order for `buyer_id` from the requested lines.
    ///
    /// Each line is priced from the catalog at this moment. If any product is unknown or not purchasable, or any
    /// quantity is outside `1..=MAX_LINE_QUANTITY`, the whole checkout is rejected and nothing is written. Totals
    /// that do not fit in [`Money`] are rejected with [`OrderFlowError::AmountOutOfRange`]. The header and every line item are
    /// stored in a single transaction.
    pub async fn create_order(
        &self,
        buyer_id: i64,
        lines: &[LineItemRequest],
        shipping: ShippingSnapshot,
    ) -> Result<Order, OrderFlowError> {
        if lines.is_empty() {
            return Err(OrderFlowError::EmptyOrder);
        }
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            items.push(self.price_line(line).await?);
        }
        let subtotal = items
            .iter()
            .map(NewOrderItem::line_total)
            .collect::<Option<Vec<_>>>()
            .and_then(Money::checked_sum)
            .ok_or(OrderFlowError::AmountOutOfRange)?;
        let delivery_fee = self.delivery.delivery_fee(subtotal, &shipping);
        let new_order = NewOrder { buyer_id, items, delivery_fee, currency: self.currency.clone(), shipping };
        if new_order.total().is_none() {
            return Err(OrderFlowError::AmountOutOfRange);
        }
        let order = self.db.insert_order(new_order).await?;
        info!(
            "🧾 Order #{} created for buyer #{buyer_id}. {} items, subtotal {}, delivery {}, total {} {}",
            order.id,
            order.items.len(),
            order.subtotal,
            order.delivery_fee,
            order.total,
            order.currency
        );
        for producer in &self.producers.order_created_producer {
            producer.publish_event(OrderCreatedEvent::new(order.clone())).await;
        }
        Ok(order)
    }

    async fn price_line(&self, line: &LineItemRequest) -> Result<NewOrderItem, OrderFlowError> {
        if !(1..=MAX_LINE_QUANTITY).contains(&line.quantity) {
            return Err(OrderFlowError::InvalidQuantity { product_id: line.product_id, quantity: line.quantity });
        }
        let quote = self
            .catalog
            .quote(line.product_id)
            .await
            .map_err(|e| OrderFlowError::Catalog(e.to_string()))?
            .filter(|q| q.purchasable && q.unit_price.value() >= 0)
            .ok_or_else(|| {
                debug!("🧾 Product {} cannot be bought right now", line.product_id);
                OrderFlowError::ProductUnavailable(line.product_id)
            })?;
        Ok(NewOrderItem {
            product_id: line.product_id,
            seller_id: quote.seller_id,
            quantity: line.quantity,
            unit_price: quote.unit_price,
        })
    }

    /// Moves an order to `new_status` on behalf of `actor`.
    ///
    /// `Paid` is never accepted here; only payment reconciliation moves an order to paid.
    pub async fn transition(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
        actor: Actor,
        details: TransitionDetails,
    ) -> Result<Order, OrderFlowError> {
        apply_transition(&self.db, &self.producers, order_id, new_status, actor, details).await
    }

    /// A buyer cancels one of their own orders before it has been paid for.
    pub async fn cancel_order(
        &self,
        buyer_id: i64,
        order_id: i64,
        reason: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let details = TransitionDetails { tracking_number: None, reason };
        self.transition(order_id, OrderStatusType::Cancelled, Actor::Buyer(buyer_id), details).await
    }
}
