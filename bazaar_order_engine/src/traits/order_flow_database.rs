use thiserror::Error;

use crate::{
    db_types::{
        NewOrder,
        NewPaymentSession,
        NewRegistration,
        Order,
        OrderStatusType,
        PaymentSession,
        PaymentTarget,
        Registration,
        StatusUpdate,
        MAX_LINE_QUANTITY,
    },
    traits::{GatewayError, OrderManagement},
};

/// The write side of the ledger.
///
/// Each method is one atomic step. Implementations must not leave partial writes behind when a method returns an
/// error.
#[allow(async_fn_in_trait)]
pub trait OrderFlowDatabase: Clone + OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Writes the order header and every line item in one transaction. Either all of them are stored, or none are.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderFlowError>;

    /// Compare-and-set status change. The order is only updated if its current status is still `update.from`.
    /// Returns `None` when the order was not in the expected state (or does not exist).
    async fn transition_order_status(&self, order_id: i64, update: StatusUpdate)
        -> Result<Option<Order>, OrderFlowError>;

    async fn insert_registration(&self, registration: NewRegistration) -> Result<Registration, OrderFlowError>;

    /// Claims the live-session slot of the target with a session that has no payment page yet.
    ///
    /// Fails with [`OrderFlowError::SessionAlreadyLive`] if the target already has a live session. The target's own
    /// payment reference is not touched; it is only written when a payment settles the target.
    async fn claim_session(&self, session: NewPaymentSession) -> Result<PaymentSession, OrderFlowError>;

    /// Stores the gateway's payment page on a claimed session. Returns `None` if the session is no longer live.
    async fn activate_session(
        &self,
        reference: &str,
        authorization_url: &str,
    ) -> Result<Option<PaymentSession>, OrderFlowError>;

    /// Deletes a claimed session that never received a payment page, freeing the target's live-session slot.
    /// Returns false if there was no such session.
    async fn release_session(&self, reference: &str) -> Result<bool, OrderFlowError>;

    /// Marks a live session as failed. Returns false if the session was not live.
    async fn mark_session_failed(&self, reference: &str) -> Result<bool, OrderFlowError>;

    /// Marks a session as succeeded, whatever its previous state. Returns false if nothing changed.
    async fn mark_session_succeeded(&self, reference: &str) -> Result<bool, OrderFlowError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderFlowError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Product {0} is not available for purchase")]
    ProductUnavailable(i64),
    #[error("Invalid quantity {quantity} for product {product_id}. Quantities must be between 1 and {max}", max = MAX_LINE_QUANTITY)]
    InvalidQuantity { product_id: i64, quantity: i64 },
    #[error("The order total is too large")]
    AmountOutOfRange,
    #[error("An order must contain at least one item")]
    EmptyOrder,
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Registration {0} does not exist")]
    RegistrationNotFound(i64),
    #[error("{0} has already been paid")]
    AlreadyPaid(PaymentTarget),
    #[error("{0} cannot be paid for while it is {1}")]
    NotPayable(PaymentTarget, String),
    #[error("{0} already has a live payment session")]
    SessionAlreadyLive(PaymentTarget),
    #[error("{0} already carries a payment reference that cannot be replaced")]
    ReferenceImmutable(PaymentTarget),
    #[error("Cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("The order does not contain any of your products")]
    NotOrderOwner,
    #[error("Unknown payment reference: {0}")]
    ReferenceNotFound(String),
    #[error("The webhook signature is invalid")]
    InvalidSignature,
    #[error("Payment gateway error: {0}")]
    Gateway(GatewayError),
    #[error("Product catalog error: {0}")]
    Catalog(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}

impl From<GatewayError> for OrderFlowError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::InvalidSignature => OrderFlowError::InvalidSignature,
            e => OrderFlowError::Gateway(e),
        }
    }
}
