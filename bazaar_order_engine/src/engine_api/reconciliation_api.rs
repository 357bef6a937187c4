use std::{fmt::Debug, time::Duration};

use log::*;

use crate::{
    db_types::{
        Order,
        OrderStatusType,
        PaymentChannel,
        PaymentOutcome,
        PaymentSession,
        PaymentTarget,
        ReconciliationEvent,
        Registration,
        SessionStatus,
    },
    engine_api::{
        order_objects::{ReconcileResult, Settlement},
        DEFAULT_GATEWAY_TIMEOUT,
    },
    events::{EventProducers, OrderPaidEvent, OrderStatusChangedEvent, PaymentFailedEvent, RegistrationPaidEvent},
    helpers::is_valid_reference,
    traits::{
        GatewayError,
        OrderFlowError,
        PaymentBackend,
        PaymentGateway,
        SettleResult,
        Settleable,
        SettlementStore,
    },
};

/// `ReconciliationApi` turns payment outcomes into ledger state.
///
/// Outcomes arrive through three channels: an explicit verify request, the buyer's redirect callback and the
/// gateway's signed webhook. All three go through [`Self::apply`], and applying the same outcome any number of times,
/// through any mix of channels, leaves the ledger exactly as applying it once would.
pub struct ReconciliationApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    gateway_timeout: Duration,
}

impl<B, G> Debug for ReconciliationApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B, G> ReconciliationApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, gateway_timeout: DEFAULT_GATEWAY_TIMEOUT }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> ReconciliationApi<B, G>
where
    B: PaymentBackend,
    G: PaymentGateway,
{
    /// Asks the gateway for the outcome of `reference` and applies it.
    ///
    /// Unknown references are rejected before the gateway is called.
    pub async fn verify(&self, reference: &str, channel: PaymentChannel) -> Result<ReconcileResult, OrderFlowError> {
        if !is_valid_reference(reference) {
            return Err(OrderFlowError::ReferenceNotFound(reference.to_string()));
        }
        if self.db.fetch_session_by_reference(reference).await?.is_none() {
            return Err(OrderFlowError::ReferenceNotFound(reference.to_string()));
        }
        let mut event = tokio::time::timeout(self.gateway_timeout, self.gateway.verify(reference))
            .await
            .map_err(|_| GatewayError::Timeout)??;
        if event.reference != reference {
            return Err(GatewayError::MalformedPayload(format!(
                "Asked to verify {reference}, but the gateway answered for {}",
                event.reference
            ))
            .into());
        }
        event.channel = channel;
        self.apply(event).await
    }

    /// The buyer has been redirected back from the hosted payment page.
    pub async fn handle_callback(&self, reference: &str) -> Result<ReconcileResult, OrderFlowError> {
        self.verify(reference, PaymentChannel::Callback).await
    }

    /// Authenticates and applies a gateway webhook.
    ///
    /// The signature is checked over the raw body before any of it is interpreted. Event types the engine does not
    /// act on are acknowledged with `Ok(None)`.
    pub async fn process_webhook(
        &self,
        body: &[u8],
        signature: &str,
    ) -> Result<Option<ReconcileResult>, OrderFlowError> {
        let event = match self.gateway.authenticate_webhook(body, signature) {
            Ok(event) => event,
            Err(GatewayError::UnsupportedEvent(kind)) => {
                debug!("🔄️ Ignoring webhook event of type {kind}");
                return Ok(None);
            },
            Err(GatewayError::InvalidSignature) => {
                warn!("🔄️ Rejected a webhook with an invalid signature");
                return Err(OrderFlowError::InvalidSignature);
            },
            Err(e) => return Err(e.into()),
        };
        self.apply(event).await.map(Some)
    }

    /// Applies a normalized payment outcome to the ledger.
    pub async fn apply(&self, event: ReconciliationEvent) -> Result<ReconcileResult, OrderFlowError> {
        let session = self.db.fetch_session_by_reference(&event.reference).await?.ok_or_else(|| {
            info!("🔄️ {} outcome for unknown reference {} ignored", event.channel, event.reference);
            OrderFlowError::ReferenceNotFound(event.reference.clone())
        })?;
        debug!("🔄️ {} outcome '{}' received via {} for {}", event.reference, event.outcome, event.channel, session.target());
        match session.target() {
            PaymentTarget::Order(_) => {
                let (settlement, order) = self.settle::<Order>(&session, &event).await?;
                if settlement == Settlement::Applied {
                    self.notify_order_paid(&order, &event).await;
                }
                Ok(self.result(&session, settlement, &order))
            },
            PaymentTarget::Registration(_) => {
                let (settlement, registration) = self.settle::<Registration>(&session, &event).await?;
                if settlement == Settlement::Applied {
                    for producer in &self.producers.registration_paid_producer {
                        let ev = RegistrationPaidEvent {
                            registration: registration.clone(),
                            reference: session.reference.clone(),
                        };
                        producer.publish_event(ev).await;
                    }
                }
                Ok(self.result(&session, settlement, &registration))
            },
        }
    }

    async fn settle<T>(
        &self,
        session: &PaymentSession,
        event: &ReconciliationEvent,
    ) -> Result<(Settlement, T), OrderFlowError>
    where
        T: Settleable,
        B: SettlementStore<T>,
    {
        let reference = session.reference.as_str();
        match effective_outcome(session, event) {
            Ok(()) => match <B as SettlementStore<T>>::settle(&self.db, session.target_id, reference, &event.payload)
                .await?
            {
                SettleResult::Applied(target) => {
                    info!("🔄️ {} is paid. Reference {reference}, via {}", session.target(), event.channel);
                    Ok((Settlement::Applied, target))
                },
                SettleResult::AlreadySettled(target) => {
                    if session.status != SessionStatus::Succeeded && self.db.mark_session_succeeded(reference).await? {
                        warn!(
                            "🔄️ {} was already paid, and reference {reference} has also been charged. The buyer \
                             may have paid twice and a refund may be due.",
                            session.target()
                        );
                    } else {
                        debug!("🔄️ Duplicate success for {reference} via {}. Nothing to do.", event.channel);
                    }
                    Ok((Settlement::AlreadyApplied, target))
                },
                SettleResult::NotSettleable(target) => {
                    self.db.mark_session_succeeded(reference).await?;
                    warn!(
                        "🔄️ Reference {reference} was charged, but {} is {} and cannot be paid. A refund may be due.",
                        session.target(),
                        target.status_label()
                    );
                    Ok((Settlement::NoChange, target))
                },
            },
            Err(reason) => {
                let target = <B as SettlementStore<T>>::fetch_target(&self.db, session.target_id)
                    .await?
                    .ok_or_else(|| not_found(session.target()))?;
                if !self.db.mark_session_failed(reference).await? {
                    debug!("🔄️ Failure for {reference} ignored. The session is already {}", session.status);
                    return Ok((Settlement::NoChange, target));
                }
                info!("🔄️ Payment {reference} for {} failed: {reason}", session.target());
                for producer in &self.producers.payment_failed_producer {
                    let ev = PaymentFailedEvent {
                        target: session.target(),
                        reference: reference.to_string(),
                        channel: event.channel,
                        reason: reason.clone(),
                    };
                    producer.publish_event(ev).await;
                }
                Ok((Settlement::FailureRecorded, target))
            },
        }
    }

    async fn notify_order_paid(&self, order: &Order, event: &ReconciliationEvent) {
        for producer in &self.producers.order_paid_producer {
            let ev = OrderPaidEvent::new(order.clone(), event.reference.clone(), event.channel);
            producer.publish_event(ev).await;
        }
        for producer in &self.producers.status_changed_producer {
            producer.publish_event(OrderStatusChangedEvent::new(OrderStatusType::Pending, order.clone())).await;
        }
    }

    fn result<T: Settleable>(&self, session: &PaymentSession, settlement: Settlement, target: &T) -> ReconcileResult {
        ReconcileResult {
            reference: session.reference.clone(),
            target: session.target(),
            settlement,
            status: target.status_label(),
        }
    }
}

fn not_found(target: PaymentTarget) -> OrderFlowError {
    match target {
        PaymentTarget::Order(id) => OrderFlowError::OrderNotFound(id),
        PaymentTarget::Registration(id) => OrderFlowError::RegistrationNotFound(id),
    }
}

/// A reported success only counts if it charged what the session asked for. Returns the failure reason otherwise.
fn effective_outcome(session: &PaymentSession, event: &ReconciliationEvent) -> Result<(), String> {
    if event.outcome == PaymentOutcome::Failed {
        return Err("the gateway reported a failed payment".into());
    }
    if let Some(amount) = event.amount {
        if amount != session.amount {
            warn!(
                "🔄️ Reference {} was charged {amount} but the session asked for {}. Treating as failed.",
                session.reference, session.amount
            );
            return Err(format!("amount mismatch: charged {amount}, expected {}", session.amount));
        }
    }
    if let Some(currency) = &event.currency {
        if !currency.eq_ignore_ascii_case(&session.currency) {
            warn!(
                "🔄️ Reference {} was charged in {currency} but the session is in {}. Treating as failed.",
                session.reference, session.currency
            );
            return Err(format!("currency mismatch: charged in {currency}, expected {}", session.currency));
        }
    }
    Ok(())
}
