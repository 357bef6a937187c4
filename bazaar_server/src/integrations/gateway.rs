use bazaar_common::{Money, Secret};
use bazaar_order_engine::{
    db_types::{PaymentChannel, PaymentOutcome, ReconciliationEvent},
    traits::{GatewayError, GatewaySession, PaymentGateway, SessionRequest},
};
use gateway_tools::{
    parse_webhook,
    GatewayApi,
    GatewayApiError,
    GatewayConfig,
    InitializeTransaction,
    TransactionData,
    TransactionStatus,
};
use log::*;

pub const CHARGE_SUCCESS_EVENT: &str = "charge.success";
pub const CHARGE_FAILED_EVENT: &str = "charge.failed";

/// Plugs the hosted card gateway into the engine.
#[derive(Clone)]
pub struct GatewayAdapter {
    api: GatewayApi,
    webhook_secret: Secret<String>,
}

impl GatewayAdapter {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let webhook_secret = config.webhook_secret.clone();
        let api = GatewayApi::new(config)?;
        Ok(Self { api, webhook_secret })
    }
}

impl PaymentGateway for GatewayAdapter {
    async fn initialize(&self, request: SessionRequest) -> Result<GatewaySession, GatewayError> {
        let body = InitializeTransaction {
            email: request.email,
            amount: request.amount.value(),
            currency: request.currency,
            reference: request.reference,
            callback_url: request.callback_url,
        };
        let auth = self.api.initialize_transaction(&body).await.map_err(to_gateway_error)?;
        Ok(GatewaySession { authorization_url: auth.authorization_url, reference: auth.reference })
    }

    async fn verify(&self, reference: &str) -> Result<ReconciliationEvent, GatewayError> {
        let data = self.api.verify_transaction(reference).await.map_err(to_gateway_error)?;
        transaction_to_event(data, PaymentChannel::Verify)
    }

    fn authenticate_webhook(&self, body: &[u8], signature: &str) -> Result<ReconciliationEvent, GatewayError> {
        let hook = parse_webhook(self.webhook_secret.as_bytes(), body, signature).map_err(to_gateway_error)?;
        let outcome = match hook.event.as_str() {
            CHARGE_SUCCESS_EVENT => PaymentOutcome::Succeeded,
            CHARGE_FAILED_EVENT => PaymentOutcome::Failed,
            other => return Err(GatewayError::UnsupportedEvent(other.to_string())),
        };
        let data = hook.data;
        Ok(ReconciliationEvent::new(data.reference, outcome, PaymentChannel::Webhook)
            .with_amount(Money::from(data.amount), data.currency)
            .with_payload(String::from_utf8_lossy(body)))
    }
}

/// Turns a verified transaction into a reconciliation event, or an error if it is still in flight.
pub fn transaction_to_event(data: TransactionData, channel: PaymentChannel) -> Result<ReconciliationEvent, GatewayError> {
    let outcome = match data.status {
        TransactionStatus::Success => PaymentOutcome::Succeeded,
        TransactionStatus::Failed | TransactionStatus::Reversed => PaymentOutcome::Failed,
        // An abandoned checkout can still be picked up again by the buyer.
        TransactionStatus::Abandoned => return Err(GatewayError::Incomplete(data.reference)),
        s if s.is_in_progress() => return Err(GatewayError::Incomplete(data.reference)),
        s => {
            warn!("Transaction {} has a status ({s}) that cannot be reconciled", data.reference);
            return Err(GatewayError::MalformedPayload(format!("Unrecognised transaction status for {}", data.reference)));
        },
    };
    let payload = serde_json::to_string(&data).map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
    Ok(ReconciliationEvent::new(data.reference, outcome, channel)
        .with_amount(Money::from(data.amount), data.currency)
        .with_payload(payload))
}

pub fn to_gateway_error(e: GatewayApiError) -> GatewayError {
    match e {
        GatewayApiError::Timeout => GatewayError::Timeout,
        GatewayApiError::InvalidSignature => GatewayError::InvalidSignature,
        e if e.is_transient() => GatewayError::Unavailable(e.to_string()),
        GatewayApiError::Initialization(s) => GatewayError::Unavailable(s),
        GatewayApiError::QueryError { status, message } => GatewayError::Rejected(format!("{status}: {message}")),
        GatewayApiError::Declined(s) => GatewayError::Rejected(s),
        GatewayApiError::JsonError(s) | GatewayApiError::RestResponseError(s) => GatewayError::MalformedPayload(s),
        GatewayApiError::ConnectionError(s) => GatewayError::Unavailable(s),
    }
}
