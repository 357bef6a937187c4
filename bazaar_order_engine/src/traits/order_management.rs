use crate::{
    db_types::{Order, PaymentSession, PaymentTarget, Registration},
    traits::OrderFlowError,
};

/// Read-only queries over the ledger.
///
/// Orders are always returned with their line items attached.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError>;

    /// The order any of whose sessions carries `reference`.
    async fn fetch_order_by_reference(&self, reference: &str) -> Result<Option<Order>, OrderFlowError>;

    /// Newest first.
    async fn fetch_orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, OrderFlowError>;

    /// Every order containing at least one item sold by `seller_id`, newest first.
    async fn fetch_orders_for_seller(&self, seller_id: i64) -> Result<Vec<Order>, OrderFlowError>;

    async fn fetch_registration(&self, registration_id: i64) -> Result<Option<Registration>, OrderFlowError>;

    async fn fetch_session_by_reference(&self, reference: &str) -> Result<Option<PaymentSession>, OrderFlowError>;

    /// All sessions ever issued for `target`, oldest first.
    async fn fetch_sessions_for_target(&self, target: PaymentTarget) -> Result<Vec<PaymentSession>, OrderFlowError>;

    async fn fetch_live_session(&self, target: PaymentTarget) -> Result<Option<PaymentSession>, OrderFlowError>;
}
