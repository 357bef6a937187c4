use bazaar_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::PaymentTarget;

/// Extra information carried by a status change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDetails {
    /// Stored when the order moves to `Shipped`.
    pub tracking_number: Option<String>,
    /// Stored when the order moves to `Cancelled`.
    pub reason: Option<String>,
}

impl TransitionDetails {
    pub fn with_tracking_number<S: Into<String>>(mut self, tracking_number: S) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }

    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// What the buyer needs to complete payment on the gateway's hosted page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedSession {
    pub reference: String,
    pub target: PaymentTarget,
    pub amount: Money,
    pub currency: String,
    pub authorization_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// This event moved the target from pending to paid.
    Applied,
    /// The target had already been paid. Nothing changed.
    AlreadyApplied,
    /// The payment attempt failed. Its session was retired and the target left as it was.
    FailureRecorded,
    /// The event changed nothing, e.g. a stale failure, or a payment for an order that has since been cancelled.
    NoChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileResult {
    pub reference: String,
    pub target: PaymentTarget,
    pub settlement: Settlement,
    /// The target's status after the event was applied.
    pub status: String,
}
