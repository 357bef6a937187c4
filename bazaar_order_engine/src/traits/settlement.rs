use std::fmt::Debug;

use bazaar_common::Money;

use crate::{
    db_types::{Order, OrderStatusType, PaymentTarget, Registration, RegistrationStatus, TargetKind},
    traits::{OrderFlowDatabase, OrderFlowError},
};

/// Anything that is paid for through a payment session.
pub trait Settleable: Clone + Debug + Send + Sync {
    const KIND: TargetKind;

    fn id(&self) -> i64;

    /// The buyer or applicant the aggregate belongs to.
    fn owner_id(&self) -> i64;

    fn amount_due(&self) -> Money;

    fn currency(&self) -> &str;

    /// True once payment has been applied, including every state that follows payment.
    fn is_settled(&self) -> bool;

    /// True if a payment may currently be taken for the aggregate.
    fn is_payable(&self) -> bool;

    fn status_label(&self) -> String;

    fn target(&self) -> PaymentTarget {
        PaymentTarget::new(Self::KIND, self.id())
    }
}

impl Settleable for Order {
    const KIND: TargetKind = TargetKind::Order;

    fn id(&self) -> i64 {
        self.id
    }

    fn owner_id(&self) -> i64 {
        self.buyer_id
    }

    fn amount_due(&self) -> Money {
        self.total
    }

    fn currency(&self) -> &str {
        &self.currency
    }

    fn is_settled(&self) -> bool {
        self.status.is_paid_or_later()
    }

    fn is_payable(&self) -> bool {
        self.status == OrderStatusType::Pending
    }

    fn status_label(&self) -> String {
        self.status.to_string()
    }
}

impl Settleable for Registration {
    const KIND: TargetKind = TargetKind::Registration;

    fn id(&self) -> i64 {
        self.id
    }

    fn owner_id(&self) -> i64 {
        self.applicant_id
    }

    fn amount_due(&self) -> Money {
        self.fee
    }

    fn currency(&self) -> &str {
        &self.currency
    }

    fn is_settled(&self) -> bool {
        self.status == RegistrationStatus::Paid
    }

    fn is_payable(&self) -> bool {
        self.status == RegistrationStatus::Pending
    }

    fn status_label(&self) -> String {
        self.status.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleResult<T> {
    /// This call moved the aggregate from pending to paid.
    Applied(T),
    /// The aggregate was already paid. Nothing changed.
    AlreadySettled(T),
    /// The aggregate is in a state that can never be paid (e.g. a cancelled order). Nothing changed.
    NotSettleable(T),
}

/// Settles payable aggregates of type `T`.
#[allow(async_fn_in_trait)]
pub trait SettlementStore<T: Settleable> {
    async fn fetch_target(&self, id: i64) -> Result<Option<T>, OrderFlowError>;

    /// In a single transaction, and only if the aggregate is still pending:
    /// * marks it paid and stores `payload` as its payment metadata,
    /// * marks the session for `reference` as succeeded,
    /// * marks any other live session for the aggregate as abandoned.
    ///
    /// Concurrent calls for the same aggregate result in exactly one [`SettleResult::Applied`].
    async fn settle(&self, id: i64, reference: &str, payload: &str) -> Result<SettleResult<T>, OrderFlowError>;
}

/// A backend that can run the whole payment flow: the ledger plus settlement of every payable aggregate.
pub trait PaymentBackend: OrderFlowDatabase + SettlementStore<Order> + SettlementStore<Registration> {}

impl<B> PaymentBackend for B where B: OrderFlowDatabase + SettlementStore<Order> + SettlementStore<Registration> {}
