use std::fmt::Debug;

use crate::{
    db_types::{Actor, Order, OrderStatusType},
    engine_api::{order_objects::TransitionDetails, transitions::apply_transition},
    events::EventProducers,
    traits::{OrderFlowDatabase, OrderFlowError},
};

/// The seller-facing side of the order state machine.
///
/// A seller may act on any order that contains at least one of their items. When an order has items from several
/// sellers, any of them may advance the whole order.
pub struct FulfillmentApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for FulfillmentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FulfillmentApi")
    }
}

impl<B> FulfillmentApi<B>
where B: OrderFlowDatabase
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub async fn orders_for_seller(&self, seller_id: i64) -> Result<Vec<Order>, OrderFlowError> {
        self.db.fetch_orders_for_seller(seller_id).await
    }

    pub async fn update_status(
        &self,
        seller_id: i64,
        order_id: i64,
        new_status: OrderStatusType,
        details: TransitionDetails,
    ) -> Result<Order, OrderFlowError> {
        apply_transition(&self.db, &self.producers, order_id, new_status, Actor::Seller(seller_id), details).await
    }

    /// Administrative override. Still bound by the state machine.
    pub async fn admin_update_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
        details: TransitionDetails,
    ) -> Result<Order, OrderFlowError> {
        apply_transition(&self.db, &self.producers, order_id, new_status, Actor::Admin, details).await
    }
}
