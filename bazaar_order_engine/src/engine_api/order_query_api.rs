use std::fmt::Debug;

use crate::{
    db_types::{Order, PaymentSession, PaymentTarget, Registration},
    traits::{OrderFlowError, OrderManagement},
};

/// Read-only views over orders, registrations and their payment sessions.
pub struct OrderQueryApi<B> {
    db: B,
}

impl<B> Debug for OrderQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderQueryApi")
    }
}

impl<B> OrderQueryApi<B>
where B: OrderManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, OrderFlowError> {
        self.db.fetch_orders_for_buyer(buyer_id).await
    }

    /// Fetches an order on behalf of a buyer. Orders belonging to someone else are reported as missing.
    pub async fn order_for_buyer(&self, buyer_id: i64, order_id: i64) -> Result<Order, OrderFlowError> {
        self.db
            .fetch_order(order_id)
            .await?
            .filter(|o| o.buyer_id == buyer_id)
            .ok_or(OrderFlowError::OrderNotFound(order_id))
    }

    pub async fn order(&self, order_id: i64) -> Result<Order, OrderFlowError> {
        self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))
    }

    pub async fn orders_for_seller(&self, seller_id: i64) -> Result<Vec<Order>, OrderFlowError> {
        self.db.fetch_orders_for_seller(seller_id).await
    }

    pub async fn order_by_reference(&self, reference: &str) -> Result<Option<Order>, OrderFlowError> {
        self.db.fetch_order_by_reference(reference).await
    }

    pub async fn registration_for_applicant(
        &self,
        applicant_id: i64,
        registration_id: i64,
    ) -> Result<Registration, OrderFlowError> {
        self.db
            .fetch_registration(registration_id)
            .await?
            .filter(|r| r.applicant_id == applicant_id)
            .ok_or(OrderFlowError::RegistrationNotFound(registration_id))
    }

    pub async fn sessions_for(&self, target: PaymentTarget) -> Result<Vec<PaymentSession>, OrderFlowError> {
        self.db.fetch_sessions_for_target(target).await
    }

    /// The user who owes the payment behind `reference`, if the reference is known.
    pub async fn payer_for_reference(&self, reference: &str) -> Result<Option<i64>, OrderFlowError> {
        let Some(session) = self.db.fetch_session_by_reference(reference).await? else {
            return Ok(None);
        };
        let payer = match session.target() {
            PaymentTarget::Order(id) => self.db.fetch_order(id).await?.map(|o| o.buyer_id),
            PaymentTarget::Registration(id) => self.db.fetch_registration(id).await?.map(|r| r.applicant_id),
        };
        Ok(payer)
    }
}
