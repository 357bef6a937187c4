use bazaar_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::ReconciliationEvent;

/// What the engine asks a gateway for when it opens a hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub reference: String,
    /// Minor currency units.
    pub amount: Money,
    pub currency: String,
    pub email: String,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySession {
    pub authorization_url: String,
    pub reference: String,
}

/// A card payment provider.
///
/// `authenticate_webhook` checks the signature over the raw body before anything in it is parsed.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    async fn initialize(&self, request: SessionRequest) -> Result<GatewaySession, GatewayError>;

    async fn verify(&self, reference: &str) -> Result<ReconciliationEvent, GatewayError>;

    fn authenticate_webhook(&self, body: &[u8], signature: &str) -> Result<ReconciliationEvent, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("The payment gateway did not respond in time")]
    Timeout,
    #[error("The payment gateway is unavailable: {0}")]
    Unavailable(String),
    #[error("The payment gateway rejected the request: {0}")]
    Rejected(String),
    #[error("Payment {0} has not been completed yet")]
    Incomplete(String),
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Malformed gateway payload: {0}")]
    MalformedPayload(String),
    #[error("Unsupported gateway event: {0}")]
    UnsupportedEvent(String),
}

impl GatewayError {
    /// Whether the same request may succeed if repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Unavailable(_) | GatewayError::Incomplete(_))
    }
}
