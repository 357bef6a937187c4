use chrono::Utc;
use log::*;

use crate::{
    db_types::{Actor, Order, OrderStatusType, StatusUpdate},
    engine_api::order_objects::TransitionDetails,
    events::{EventProducers, OrderStatusChangedEvent},
    traits::{OrderFlowDatabase, OrderFlowError},
};

const MAX_TRANSITION_ATTEMPTS: usize = 3;

/// Moves an order along the state machine on behalf of `actor`.
///
/// The write is a compare-and-set on the current status. If another writer got there first, the request is evaluated
/// again against the new state.
pub(crate) async fn apply_transition<B: OrderFlowDatabase>(
    db: &B,
    producers: &EventProducers,
    order_id: i64,
    new_status: OrderStatusType,
    actor: Actor,
    details: TransitionDetails,
) -> Result<Order, OrderFlowError> {
    if new_status == OrderStatusType::Paid {
        warn!("🚚 {actor} tried to mark order #{order_id} as paid. Only payment reconciliation may do that.");
        return Err(OrderFlowError::InvalidTransition { from: OrderStatusType::Pending, to: new_status });
    }
    let mut current = None;
    for _ in 0..MAX_TRANSITION_ATTEMPTS {
        let order = match db.fetch_order(order_id).await? {
            Some(order) => order,
            None if matches!(actor, Actor::Seller(_)) => return Err(OrderFlowError::NotOrderOwner),
            None => return Err(OrderFlowError::OrderNotFound(order_id)),
        };
        authorize(&order, new_status, actor)?;
        let from = order.status;
        if !from.can_transition_to(new_status) {
            return Err(OrderFlowError::InvalidTransition { from, to: new_status });
        }
        let update = status_update(from, new_status, &details);
        if let Some(updated) = db.transition_order_status(order_id, update).await? {
            info!("🚚 Order #{order_id} moved from {from} to {new_status} by {actor}");
            for producer in &producers.status_changed_producer {
                producer.publish_event(OrderStatusChangedEvent::new(from, updated.clone())).await;
            }
            return Ok(updated);
        }
        debug!("🚚 Order #{order_id} changed status while moving it to {new_status}. Re-evaluating.");
        current = Some(from);
    }
    let from = db.fetch_order(order_id).await?.map(|o| o.status).or(current).unwrap_or(OrderStatusType::Pending);
    Err(OrderFlowError::InvalidTransition { from, to: new_status })
}

fn authorize(order: &Order, new_status: OrderStatusType, actor: Actor) -> Result<(), OrderFlowError> {
    use OrderStatusType::*;
    let invalid = || OrderFlowError::InvalidTransition { from: order.status, to: new_status };
    match actor {
        Actor::Admin => Ok(()),
        Actor::Buyer(id) if id != order.buyer_id => Err(OrderFlowError::OrderNotFound(order.id)),
        Actor::Buyer(_) if order.status == Pending && new_status == Cancelled => Ok(()),
        Actor::Buyer(_) => Err(invalid()),
        Actor::Seller(id) if !order.is_sold_by(id) => Err(OrderFlowError::NotOrderOwner),
        Actor::Seller(_) if order.status == Pending => Err(invalid()),
        Actor::Seller(_) => Ok(()),
    }
}

fn status_update(from: OrderStatusType, to: OrderStatusType, details: &TransitionDetails) -> StatusUpdate {
    let non_empty = |s: &Option<String>| s.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    StatusUpdate {
        from,
        to,
        tracking_number: if to == OrderStatusType::Shipped { non_empty(&details.tracking_number) } else { None },
        cancellation_reason: if to == OrderStatusType::Cancelled { non_empty(&details.reason) } else { None },
        delivered_at: if to == OrderStatusType::Delivered { Some(Utc::now()) } else { None },
    }
}
