use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, PaymentChannel, PaymentTarget, Registration};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted exactly once per order, when a reconciled payment moves it from pending to paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub reference: String,
    pub channel: PaymentChannel,
}

impl OrderPaidEvent {
    pub fn new(order: Order, reference: String, channel: PaymentChannel) -> Self {
        Self { order, reference, channel }
    }
}

/// Emitted for every successful order status change, including the move to `Paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub old_status: OrderStatusType,
    pub order: Order,
}

impl OrderStatusChangedEvent {
    pub fn new(old_status: OrderStatusType, order: Order) -> Self {
        Self { old_status, order }
    }

    pub fn new_status(&self) -> OrderStatusType {
        self.order.status
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationPaidEvent {
    pub registration: Registration,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub target: PaymentTarget,
    pub reference: String,
    pub channel: PaymentChannel,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    OrderPaid(OrderPaidEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
    RegistrationPaid(RegistrationPaidEvent),
    PaymentFailed(PaymentFailedEvent),
}
