use std::fmt::Display;

use bazaar_common::Money;
use bazaar_order_engine::{
    db_types::{LineItemRequest, OrderStatusType, ShippingSnapshot},
    order_objects::{IssuedSession, TransitionDetails},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub items: Vec<LineItemRequest>,
    #[serde(default)]
    pub shipping: ShippingSnapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRegistrationRequest {
    pub programme: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl StatusUpdateRequest {
    pub fn details(&self) -> TransitionDetails {
        TransitionDetails { tracking_number: self.tracking_number.clone(), reason: self.reason.clone() }
    }
}

/// The gateway appends the reference to the callback URL. Some gateways call it `trxref`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackParams {
    pub reference: Option<String>,
    pub trxref: Option<String>,
}

impl CallbackParams {
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref().or(self.trxref.as_deref()).map(str::trim).filter(|s| !s.is_empty())
    }
}

/// What a buyer's client needs to send the buyer to the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSessionResponse {
    pub payment_url: String,
    pub reference: String,
    pub amount: Money,
    pub currency: String,
}

impl From<IssuedSession> for PaymentSessionResponse {
    fn from(session: IssuedSession) -> Self {
        Self {
            payment_url: session.authorization_url,
            reference: session.reference,
            amount: session.amount,
            currency: session.currency,
        }
    }
}
