use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{NewPaymentSession, Order, PaymentTarget, Registration},
    engine_api::{order_objects::IssuedSession, DEFAULT_GATEWAY_TIMEOUT},
    helpers::new_payment_reference,
    traits::{
        GatewayError,
        GatewaySession,
        OrderFlowDatabase,
        OrderFlowError,
        PaymentGateway,
        SessionRequest,
        Settleable,
    },
};

pub const DEFAULT_REFERENCE_PREFIX: &str = "BZR";

/// `PaymentSessionApi` opens hosted payment sessions on the gateway for orders and registrations.
///
/// A target has at most one live session at a time. The slot is claimed in the database before the gateway is
/// called, so concurrent requests for the same target open at most one gateway session. If the gateway fails, the
/// claim is released and nothing is left behind.
pub struct PaymentSessionApi<B, G> {
    db: B,
    gateway: G,
    reference_prefix: String,
    callback_url: Option<String>,
    gateway_timeout: Duration,
}

impl<B, G> Debug for PaymentSessionApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentSessionApi ({})", self.reference_prefix)
    }
}

impl<B, G> PaymentSessionApi<B, G> {
    pub fn new(db: B, gateway: G) -> Self {
        Self {
            db,
            gateway,
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
            callback_url: None,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_reference_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.reference_prefix = prefix.into();
        self
    }

    /// The URL the gateway redirects the buyer to once they leave the hosted payment page.
    pub fn with_callback_url<S: Into<String>>(mut self, url: S) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> PaymentSessionApi<B, G>
where
    B: OrderFlowDatabase,
    G: PaymentGateway,
{
    /// Opens a payment session for one of `buyer_id`'s orders.
    pub async fn issue_for_order(
        &self,
        buyer_id: i64,
        order_id: i64,
        email: &str,
    ) -> Result<IssuedSession, OrderFlowError> {
        let order: Order = self
            .db
            .fetch_order(order_id)
            .await?
            .filter(|o| o.buyer_id == buyer_id)
            .ok_or(OrderFlowError::OrderNotFound(order_id))?;
        self.issue(order, email).await
    }

    /// Opens a payment session for one of `applicant_id`'s registrations.
    pub async fn issue_for_registration(
        &self,
        applicant_id: i64,
        registration_id: i64,
        email: &str,
    ) -> Result<IssuedSession, OrderFlowError> {
        let registration: Registration = self
            .db
            .fetch_registration(registration_id)
            .await?
            .filter(|r| r.applicant_id == applicant_id)
            .ok_or(OrderFlowError::RegistrationNotFound(registration_id))?;
        self.issue(registration, email).await
    }

    async fn issue<T: Settleable>(&self, payable: T, email: &str) -> Result<IssuedSession, OrderFlowError> {
        let target = payable.target();
        if payable.is_settled() {
            return Err(OrderFlowError::AlreadyPaid(target));
        }
        if !payable.is_payable() {
            return Err(OrderFlowError::NotPayable(target, payable.status_label()));
        }
        let amount = payable.amount_due();
        if !amount.is_positive() {
            return Err(OrderFlowError::NotPayable(target, "without an amount due".into()));
        }
        let currency = payable.currency().to_string();
        let claim = NewPaymentSession {
            reference: new_payment_reference(&self.reference_prefix, target),
            target,
            amount,
            currency: currency.clone(),
        };
        // Only the request that wins the live-session slot talks to the gateway
        let claimed = match self.db.claim_session(claim.clone()).await {
            Err(OrderFlowError::SessionAlreadyLive(_)) => {
                if !self.release_stale_claim(target).await? {
                    debug!("💳 {target} already has a live session");
                    return Err(OrderFlowError::SessionAlreadyLive(target));
                }
                self.db.claim_session(claim).await?
            },
            result => result?,
        };
        let reference = claimed.reference;
        let request = SessionRequest {
            reference: reference.clone(),
            amount,
            currency: currency.clone(),
            email: email.to_string(),
            callback_url: self.callback_url.clone(),
        };
        let session = match self.open_on_gateway(request).await {
            Ok(session) => session,
            Err(e) => {
                warn!("💳 Could not open a payment session for {target}. {e}");
                if let Err(release_err) = self.db.release_session(&reference).await {
                    error!("💳 Could not release session {reference} for {target}. {release_err}");
                }
                return Err(e);
            },
        };
        if self.db.activate_session(&reference, &session.authorization_url).await?.is_none() {
            // Reconciliation got to the session before we stored its payment page
            if self.db.fetch_session_by_reference(&reference).await?.is_none() {
                return Err(OrderFlowError::SessionAlreadyLive(target));
            }
            debug!("💳 Session {reference} was reconciled before it was activated");
        }
        info!("💳 Payment session {reference} opened for {target}. Amount: {amount} {currency}");
        Ok(IssuedSession { reference, target, amount, currency, authorization_url: session.authorization_url })
    }

    async fn open_on_gateway(&self, request: SessionRequest) -> Result<GatewaySession, OrderFlowError> {
        let reference = request.reference.clone();
        let session = tokio::time::timeout(self.gateway_timeout, self.gateway.initialize(request))
            .await
            .map_err(|_| GatewayError::Timeout)??;
        if session.reference != reference {
            return Err(GatewayError::MalformedPayload(format!(
                "Gateway echoed reference {} instead of {reference}",
                session.reference
            ))
            .into());
        }
        Ok(session)
    }

    /// A claim that never got a payment page and is older than any gateway call could take was left behind by a
    /// request that died mid-flight. Releases it and returns true if so.
    async fn release_stale_claim(&self, target: PaymentTarget) -> Result<bool, OrderFlowError> {
        let Some(live) = self.db.fetch_live_session(target).await? else {
            return Ok(false);
        };
        let max_age =
            chrono::Duration::from_std(self.gateway_timeout * 2).unwrap_or_else(|_| chrono::Duration::days(1));
        if live.authorization_url.is_some() || Utc::now() - live.created_at < max_age {
            return Ok(false);
        }
        warn!("💳 Releasing abandoned claim {} on {target}", live.reference);
        self.db.release_session(&live.reference).await
    }

    /// The live session for `target`, if any.
    pub async fn live_session(&self, target: PaymentTarget) -> Result<Option<IssuedSession>, OrderFlowError> {
        let session = self.db.fetch_live_session(target).await?;
        Ok(session.map(|s| IssuedSession {
            target: s.target(),
            reference: s.reference,
            amount: s.amount,
            currency: s.currency,
            authorization_url: s.authorization_url.unwrap_or_default(),
        }))
    }
}
