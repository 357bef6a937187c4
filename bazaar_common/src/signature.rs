//! HMAC-SHA256 request signatures.
//!
//! The payment gateway signs every webhook body with the shared secret and sends the base64-encoded digest in a
//! header. The same helpers are used by the gateway client, by the server, and by test fakes, so that all three agree
//! on the encoding.
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Error)]
#[error("Could not compute signature: {0}")]
pub struct SignatureError(String);

/// Returns the base64-encoded HMAC-SHA256 of `body` keyed with `secret`.
pub fn calculate_signature(secret: &[u8], body: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| SignatureError(e.to_string()))?;
    mac.update(body);
    Ok(base64::encode(mac.finalize().into_bytes()))
}

/// Checks `signature` against the body in constant time. An empty secret never validates anything.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(expected) = base64::decode(signature.trim()) else {
        return false;
    };
    match HmacSha256::new_from_slice(secret) {
        Ok(mut mac) => {
            mac.update(body);
            mac.verify_slice(&expected).is_ok()
        },
        Err(_) => false,
    }
}
