use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
};

use bazaar_common::{
    signature::{calculate_signature, verify_signature},
    Money,
    Secret,
};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{PaymentChannel, PaymentOutcome, ReconciliationEvent},
    traits::{GatewayError, GatewaySession, PaymentGateway, SessionRequest},
};

pub const FAKE_WEBHOOK_SECRET: &str = "fake-gateway-webhook-secret";

#[derive(Debug, Clone)]
struct Charge {
    amount: Money,
    currency: String,
    outcome: Option<PaymentOutcome>,
}

#[derive(Serialize, Deserialize)]
struct FakeWebhook {
    event: String,
    reference: String,
    amount: i64,
    currency: String,
}

/// A scriptable payment gateway. Clones share state.
///
/// Sessions are opened in memory. Tests then decide each payment's outcome with [`FakeGateway::complete`], and either
/// verify it or deliver it as a signed webhook built by [`FakeGateway::webhook`].
#[derive(Debug, Clone)]
pub struct FakeGateway {
    secret: Secret<String>,
    charges: Arc<Mutex<HashMap<String, Charge>>>,
    unavailable: Arc<AtomicBool>,
    initialized: Arc<AtomicUsize>,
    verified: Arc<AtomicUsize>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new(FAKE_WEBHOOK_SECRET)
    }
}

impl FakeGateway {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Secret::new(secret.to_string()),
            charges: Arc::new(Mutex::new(HashMap::new())),
            unavailable: Arc::new(AtomicBool::new(false)),
            initialized: Arc::new(AtomicUsize::new(0)),
            verified: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// While set, every outbound call fails as if the gateway were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn initialized_count(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn verified_count(&self) -> usize {
        self.verified.load(Ordering::SeqCst)
    }

    /// Decides the outcome of the payment for `reference`.
    pub fn complete(&self, reference: &str, outcome: PaymentOutcome) {
        if let Some(charge) = self.charges.lock().expect("poisoned lock").get_mut(reference) {
            charge.outcome = Some(outcome);
        }
    }

    /// Overrides the amount the gateway reports as charged.
    pub fn charge_amount(&self, reference: &str, amount: Money) {
        if let Some(charge) = self.charges.lock().expect("poisoned lock").get_mut(reference) {
            charge.amount = amount;
        }
    }

    /// A signed webhook body carrying `outcome` for `reference`. Returns the body and its signature.
    pub fn webhook(&self, reference: &str, outcome: PaymentOutcome) -> (Vec<u8>, String) {
        let (amount, currency) = self
            .charges
            .lock()
            .expect("poisoned lock")
            .get(reference)
            .map(|c| (c.amount.value(), c.currency.clone()))
            .unwrap_or((0, "NGN".to_string()));
        let event = match outcome {
            PaymentOutcome::Succeeded => "charge.success",
            PaymentOutcome::Failed => "charge.failed",
        };
        let hook = FakeWebhook { event: event.into(), reference: reference.into(), amount, currency };
        let body = serde_json::to_vec(&hook).expect("serializable webhook");
        let signature = calculate_signature(self.secret.as_bytes(), &body).expect("valid signing key");
        (body, signature)
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(GatewayError::Unavailable("fake gateway is switched off".into()))
        } else {
            Ok(())
        }
    }
}

impl PaymentGateway for FakeGateway {
    async fn initialize(&self, request: SessionRequest) -> Result<GatewaySession, GatewayError> {
        self.check_available()?;
        self.initialized.fetch_add(1, Ordering::SeqCst);
        let charge = Charge { amount: request.amount, currency: request.currency.clone(), outcome: None };
        self.charges.lock().expect("poisoned lock").insert(request.reference.clone(), charge);
        Ok(GatewaySession {
            authorization_url: format!("https://checkout.fake-gateway.test/{}", request.reference),
            reference: request.reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<ReconciliationEvent, GatewayError> {
        self.check_available()?;
        self.verified.fetch_add(1, Ordering::SeqCst);
        let charge = self
            .charges
            .lock()
            .expect("poisoned lock")
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected(format!("Transaction reference {reference} not found")))?;
        let outcome = charge.outcome.ok_or_else(|| GatewayError::Incomplete(reference.to_string()))?;
        let payload = format!(r#"{{"reference":"{reference}","status":"{outcome}"}}"#);
        Ok(ReconciliationEvent::new(reference, outcome, PaymentChannel::Verify)
            .with_amount(charge.amount, charge.currency)
            .with_payload(payload))
    }

    fn authenticate_webhook(&self, body: &[u8], signature: &str) -> Result<ReconciliationEvent, GatewayError> {
        if !verify_signature(self.secret.as_bytes(), body, signature) {
            return Err(GatewayError::InvalidSignature);
        }
        let hook: FakeWebhook =
            serde_json::from_slice(body).map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        let outcome = match hook.event.as_str() {
            "charge.success" => PaymentOutcome::Succeeded,
            "charge.failed" => PaymentOutcome::Failed,
            other => return Err(GatewayError::UnsupportedEvent(other.to_string())),
        };
        Ok(ReconciliationEvent::new(hook.reference, outcome, PaymentChannel::Webhook)
            .with_amount(Money::from(hook.amount), hook.currency)
            .with_payload(String::from_utf8_lossy(body)))
    }
}
