//! Data types that are persisted by the engine backends, or that cross the engine's public API.
use std::{fmt::Display, str::FromStr};

use bazaar_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been created by checkout and is awaiting payment.
    Pending,
    /// Payment has been reconciled. Only the payment reconciler moves an order into this state.
    Paid,
    /// A seller has started preparing the order.
    Processing,
    /// The order has left the seller. May carry a tracking number.
    Shipped,
    /// The order has reached the buyer. Terminal.
    Delivered,
    /// The order was cancelled before delivery. Terminal.
    Cancelled,
}

impl OrderStatusType {
    /// Whether the forward state machine allows moving from `self` to `new`.
    ///
    /// | From \ To  | Paid | Processing | Shipped | Delivered | Cancelled |
    /// |------------|------|------------|---------|-----------|-----------|
    /// | Pending    | ✓    |            |         |           | ✓         |
    /// | Paid       |      | ✓          | ✓       | ✓         | ✓         |
    /// | Processing |      |            | ✓       | ✓         | ✓         |
    /// | Shipped    |      |            |         | ✓         | ✓         |
    ///
    /// `Delivered` and `Cancelled` are terminal.
    pub fn can_transition_to(self, new: Self) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, new),
            (Pending, Paid | Cancelled) |
                (Paid, Processing | Shipped | Delivered | Cancelled) |
                (Processing, Shipped | Delivered | Cancelled) |
                (Shipped, Delivered | Cancelled)
        )
    }

    /// True for `Paid` and every fulfilment state after it.
    pub fn is_paid_or_later(self) -> bool {
        use OrderStatusType::*;
        matches!(self, Paid | Processing | Shipped | Delivered)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::Pending => "pending",
            OrderStatusType::Paid => "paid",
            OrderStatusType::Processing => "processing",
            OrderStatusType::Shipped => "shipped",
            OrderStatusType::Delivered => "delivered",
            OrderStatusType::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------   ShippingSnapshot    ---------------------------------------------------------
/// The delivery address as it was at checkout. It is copied onto the order and never follows later edits to the
/// buyer's address book.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ShippingSnapshot {
    #[sqlx(rename = "shipping_name")]
    pub name: String,
    #[sqlx(rename = "shipping_phone")]
    pub phone: String,
    #[sqlx(rename = "shipping_address")]
    pub address: String,
    #[sqlx(rename = "shipping_city")]
    pub city: String,
    #[sqlx(rename = "shipping_state")]
    pub state: String,
    #[sqlx(rename = "shipping_country")]
    pub country: String,
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub buyer_id: i64,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total: Money,
    pub currency: String,
    pub status: OrderStatusType,
    #[sqlx(flatten)]
    pub shipping: ShippingSnapshot,
    pub payment_reference: Option<String>,
    /// The raw provider payload that settled the order. Stored for audit only; never parsed back.
    pub payment_metadata: Option<String>,
    pub tracking_number: Option<String>,
    pub cancellation_reason: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn with_items(mut self, items: Vec<OrderItem>) -> Self {
        self.items = items;
        self
    }

    /// Recomputes the subtotal from the snapshotted line prices.
    pub fn items_subtotal(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    pub fn is_sold_by(&self, seller_id: i64) -> bool {
        self.items.iter().any(|i| i.seller_id == seller_id)
    }
}

//--------------------------------------      OrderItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub seller_id: i64,
    pub quantity: i64,
    /// Unit price at checkout time.
    pub unit_price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
/// The largest quantity a single line may ask for.
pub const MAX_LINE_QUANTITY: i64 = 10_000;

/// A line item as requested by the buyer. Prices are never accepted from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub seller_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
}

impl NewOrderItem {
    /// `None` if the line total does not fit in [`Money`].
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// A fully priced order, ready to be written to the ledger in one transaction.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub buyer_id: i64,
    pub items: Vec<NewOrderItem>,
    pub delivery_fee: Money,
    pub currency: String,
    pub shipping: ShippingSnapshot,
}

impl NewOrder {
    /// `None` if any line total, or their sum, overflows.
    pub fn subtotal(&self) -> Option<Money> {
        self.items.iter().map(NewOrderItem::line_total).collect::<Option<Vec<_>>>().and_then(Money::checked_sum)
    }

    pub fn total(&self) -> Option<Money> {
        self.subtotal().and_then(|s| s.checked_add(self.delivery_fee))
    }
}

/// The columns written together with a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub from: OrderStatusType,
    pub to: OrderStatusType,
    pub tracking_number: Option<String>,
    pub cancellation_reason: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
}

//--------------------------------------        Actor          ---------------------------------------------------------
/// Who is asking for an order transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Buyer(i64),
    Seller(i64),
    Admin,
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Buyer(id) => write!(f, "buyer #{id}"),
            Actor::Seller(id) => write!(f, "seller #{id}"),
            Actor::Admin => write!(f, "admin"),
        }
    }
}

//--------------------------------------     Registration      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Paid,
}

impl Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationStatus::Pending => f.write_str("pending"),
            RegistrationStatus::Paid => f.write_str("paid"),
        }
    }
}

/// A school registration. Paid through the same session and reconciliation machinery as orders.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Registration {
    pub id: i64,
    pub applicant_id: i64,
    pub programme: String,
    pub fee: Money,
    pub currency: String,
    pub status: RegistrationStatus,
    pub payment_reference: Option<String>,
    pub payment_metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub applicant_id: i64,
    pub programme: String,
    pub fee: Money,
    pub currency: String,
}

//--------------------------------------    PaymentTarget      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Order,
    Registration,
}

impl TargetKind {
    /// The table holding aggregates of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            TargetKind::Order => "orders",
            TargetKind::Registration => "registrations",
        }
    }
}

/// The aggregate a payment session pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum PaymentTarget {
    Order(i64),
    Registration(i64),
}

impl PaymentTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            PaymentTarget::Order(_) => TargetKind::Order,
            PaymentTarget::Registration(_) => TargetKind::Registration,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            PaymentTarget::Order(id) | PaymentTarget::Registration(id) => *id,
        }
    }

    pub fn new(kind: TargetKind, id: i64) -> Self {
        match kind {
            TargetKind::Order => PaymentTarget::Order(id),
            TargetKind::Registration => PaymentTarget::Registration(id),
        }
    }
}

impl Display for PaymentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentTarget::Order(id) => write!(f, "order #{id}"),
            PaymentTarget::Registration(id) => write!(f, "registration #{id}"),
        }
    }
}

//--------------------------------------    PaymentSession     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Issued, and no terminal outcome has been reconciled for it yet.
    Live,
    Succeeded,
    /// The gateway reported a failed attempt. The buyer may request a fresh session.
    Failed,
    /// The target was settled through a different session while this one was still live.
    Abandoned,
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Live => "live",
            SessionStatus::Succeeded => "succeeded",
            SessionStatus::Failed => "failed",
            SessionStatus::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentSession {
    pub id: i64,
    pub reference: String,
    pub target_kind: TargetKind,
    pub target_id: i64,
    /// Amount in minor currency units.
    pub amount: Money,
    pub currency: String,
    pub status: SessionStatus,
    pub authorization_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentSession {
    pub fn target(&self) -> PaymentTarget {
        PaymentTarget::new(self.target_kind, self.target_id)
    }

    pub fn is_live(&self) -> bool {
        self.status == SessionStatus::Live
    }
}

/// A session about to be claimed. The payment page is added once the gateway has opened it.
#[derive(Debug, Clone)]
pub struct NewPaymentSession {
    pub reference: String,
    pub target: PaymentTarget,
    pub amount: Money,
    pub currency: String,
}

//--------------------------------------  ReconciliationEvent  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

impl Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentOutcome::Succeeded => f.write_str("succeeded"),
            PaymentOutcome::Failed => f.write_str("failed"),
        }
    }
}

/// The channel a payment outcome arrived through. Only used for logging; every channel has the same effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentChannel {
    Verify,
    Callback,
    Webhook,
}

impl Display for PaymentChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentChannel::Verify => f.write_str("verify"),
            PaymentChannel::Callback => f.write_str("callback"),
            PaymentChannel::Webhook => f.write_str("webhook"),
        }
    }
}

/// A normalized payment outcome. This is idempotent input: applying it twice has the same effect as applying it once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationEvent {
    pub reference: String,
    pub outcome: PaymentOutcome,
    /// The amount the gateway reports as charged, in minor units, if it reports one.
    pub amount: Option<Money>,
    pub currency: Option<String>,
    /// The provider payload, verbatim.
    pub payload: String,
    pub channel: PaymentChannel,
    pub received_at: DateTime<Utc>,
}

impl ReconciliationEvent {
    pub fn new<S: Into<String>>(reference: S, outcome: PaymentOutcome, channel: PaymentChannel) -> Self {
        Self {
            reference: reference.into(),
            outcome,
            amount: None,
            currency: None,
            payload: String::default(),
            channel,
            received_at: Utc::now(),
        }
    }

    pub fn with_amount<S: Into<String>>(mut self, amount: Money, currency: S) -> Self {
        self.amount = Some(amount);
        self.currency = Some(currency.into());
        self
    }

    pub fn with_payload<S: Into<String>>(mut self, payload: S) -> Self {
        self.payload = payload.into();
        self
    }
}
