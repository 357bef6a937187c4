use std::fmt::Debug;

use bazaar_common::{Money, DEFAULT_CURRENCY_CODE};
use log::*;

use crate::{
    db_types::{NewRegistration, Registration},
    traits::{OrderFlowDatabase, OrderFlowError},
};

/// Opens school registrations. Each carries the fee configured at the time of registration and is paid through
/// [`crate::PaymentSessionApi::issue_for_registration`].
pub struct RegistrationApi<B> {
    db: B,
    fee: Money,
    currency: String,
}

impl<B> Debug for RegistrationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegistrationApi ({} {})", self.fee, self.currency)
    }
}

impl<B> RegistrationApi<B>
where B: OrderFlowDatabase
{
    pub fn new(db: B, fee: Money) -> Self {
        Self { db, fee, currency: DEFAULT_CURRENCY_CODE.to_string() }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub async fn register(&self, applicant_id: i64, programme: &str) -> Result<Registration, OrderFlowError> {
        let registration = NewRegistration {
            applicant_id,
            programme: programme.trim().to_string(),
            fee: self.fee,
            currency: self.currency.clone(),
        };
        let registration = self.db.insert_registration(registration).await?;
        info!(
            "🧾 Registration #{} opened for applicant #{applicant_id} ({}). Fee: {} {}",
            registration.id, registration.programme, registration.fee, registration.currency
        );
        Ok(registration)
    }
}
