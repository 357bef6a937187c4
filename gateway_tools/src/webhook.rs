use bazaar_common::signature::{calculate_signature, verify_signature};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{data_objects::TransactionData, GatewayApiError};

/// The header the gateway puts the base64 HMAC-SHA256 of the raw webhook body in.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// e.g. `charge.success`, `charge.failed`, `transfer.success`
    pub event: String,
    pub data: TransactionData,
}

/// Authenticates and decodes a webhook body.
///
/// The signature is checked over the raw bytes before any parsing takes place.
pub fn parse_webhook(secret: &[u8], body: &[u8], signature: &str) -> Result<WebhookEvent, GatewayApiError> {
    if !verify_signature(secret, body, signature) {
        warn!("Rejecting webhook with an invalid signature ({} bytes)", body.len());
        return Err(GatewayApiError::InvalidSignature);
    }
    let event = serde_json::from_slice::<WebhookEvent>(body).map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
    trace!("Webhook {} for {}", event.event, event.data.reference);
    Ok(event)
}

/// Serializes and signs a webhook the way the gateway does.
pub fn sign_webhook(secret: &[u8], event: &WebhookEvent) -> Result<(Vec<u8>, String), GatewayApiError> {
    let body = serde_json::to_vec(event).map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
    let signature = calculate_signature(secret, &body).map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
    Ok((body, signature))
}
