//! Buyer notifications.
//!
//! The engine publishes an event for every order status change and every failed payment. The notifier turns those
//! into messages for the buyer and hands them to the notification dispatcher. Delivery is best effort: failures are
//! logged and never reach the operation that caused the event.
use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use bazaar_order_engine::{
    db_types::{OrderStatusType, PaymentTarget},
    events::{EventHooks, OrderStatusChangedEvent, PaymentFailedEvent},
};
use log::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerNotification {
    pub buyer_id: Option<i64>,
    pub target: PaymentTarget,
    pub status: String,
    pub message: String,
}

impl BuyerNotification {
    pub fn from_status_change(event: &OrderStatusChangedEvent) -> Self {
        let order = &event.order;
        let message = match order.status {
            OrderStatusType::Paid => format!("Payment received for order #{}. Thank you!", order.id),
            OrderStatusType::Processing => format!("Order #{} is being prepared.", order.id),
            OrderStatusType::Shipped => match &order.tracking_number {
                Some(t) => format!("Order #{} has shipped. Tracking number: {t}", order.id),
                None => format!("Order #{} has shipped.", order.id),
            },
            OrderStatusType::Delivered => format!("Order #{} has been delivered.", order.id),
            OrderStatusType::Cancelled => format!("Order #{} was cancelled.", order.id),
            OrderStatusType::Pending => format!("Order #{} is awaiting payment.", order.id),
        };
        Self {
            buyer_id: Some(order.buyer_id),
            target: PaymentTarget::Order(order.id),
            status: order.status.to_string(),
            message,
        }
    }

    pub fn from_failed_payment(event: &PaymentFailedEvent) -> Self {
        Self {
            buyer_id: None,
            target: event.target,
            status: "payment_failed".to_string(),
            message: format!("Payment {} for {} did not go through. {}", event.reference, event.target, event.reason),
        }
    }
}

/// Sends notifications to the dispatcher, or logs them if there is none.
#[derive(Clone)]
pub struct Notifier {
    url: Option<String>,
    client: Arc<Client>,
}

impl Notifier {
    pub fn new(url: Option<String>) -> Self {
        let client = Client::builder().timeout(DISPATCH_TIMEOUT).build().unwrap_or_default();
        Self { url, client: Arc::new(client) }
    }

    pub async fn send(&self, notification: BuyerNotification) {
        let Some(url) = &self.url else {
            info!("📬️ [{}] {}", notification.target, notification.message);
            return;
        };
        match self.client.post(url).json(&notification).send().await {
            Ok(res) if res.status().is_success() => {
                debug!("📬️ Notification for {} dispatched", notification.target);
            },
            Ok(res) => {
                error!("📬️ Notification dispatcher rejected the message for {}. {}", notification.target, res.status())
            },
            Err(e) => error!("📬️ Could not dispatch notification for {}. {e}", notification.target),
        }
    }

    /// Event hooks that forward order status changes and failed payments to this notifier.
    pub fn hooks(&self) -> EventHooks {
        let mut hooks = EventHooks::default();
        let notifier = self.clone();
        hooks.on_status_changed(move |ev| {
            let notifier = notifier.clone();
            Box::pin(async move {
                notifier.send(BuyerNotification::from_status_change(&ev)).await;
            }) as HookFuture
        });
        let notifier = self.clone();
        hooks.on_payment_failed(move |ev| {
            let notifier = notifier.clone();
            Box::pin(async move {
                notifier.send(BuyerNotification::from_failed_payment(&ev)).await;
            }) as HookFuture
        });
        hooks
    }
}
