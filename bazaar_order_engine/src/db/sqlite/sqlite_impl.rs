use std::fmt::Debug;

use log::*;
use sqlx::{migrate, SqlitePool};

use super::{db_url, new_pool, orders, registrations, sessions, settlements};
use crate::{
    db_types::{
        NewOrder,
        NewPaymentSession,
        NewRegistration,
        Order,
        PaymentSession,
        PaymentTarget,
        Registration,
        StatusUpdate,
        TargetKind,
    },
    traits::{OrderFlowDatabase, OrderFlowError, OrderManagement, SettleResult, Settleable, SettlementStore},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `BZR_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool for {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), OrderFlowError> {
        migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OrderFlowError::DatabaseError(format!("Could not run migrations. {e}")))?;
        debug!("🗃️ Database migrations are up to date");
        Ok(())
    }

    fn not_found(target: PaymentTarget) -> OrderFlowError {
        match target {
            PaymentTarget::Order(id) => OrderFlowError::OrderNotFound(id),
            PaymentTarget::Registration(id) => OrderFlowError::RegistrationNotFound(id),
        }
    }

    async fn target_exists(&self, target: PaymentTarget) -> Result<bool, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let exists = match target.kind() {
            TargetKind::Order => settlements::fetch_target::<Order>(target.id(), &mut conn).await?.is_some(),
            TargetKind::Registration => {
                settlements::fetch_target::<Registration>(target.id(), &mut conn).await?.is_some()
            },
        };
        Ok(exists)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_order_by_reference(&self, reference: &str) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_reference(reference, &mut conn).await
    }

    async fn fetch_orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_buyer(buyer_id, &mut conn).await
    }

    async fn fetch_orders_for_seller(&self, seller_id: i64) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_seller(seller_id, &mut conn).await
    }

    async fn fetch_registration(&self, registration_id: i64) -> Result<Option<Registration>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        registrations::fetch_registration(registration_id, &mut conn).await
    }

    async fn fetch_session_by_reference(&self, reference: &str) -> Result<Option<PaymentSession>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        sessions::fetch_session_by_reference(reference, &mut conn).await
    }

    async fn fetch_sessions_for_target(&self, target: PaymentTarget) -> Result<Vec<PaymentSession>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        sessions::fetch_sessions_for_target(target, &mut conn).await
    }

    async fn fetch_live_session(&self, target: PaymentTarget) -> Result<Option<PaymentSession>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        sessions::fetch_live_session(target, &mut conn).await
    }
}

impl OrderFlowDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(&order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order #{} for buyer #{} has been saved. Total: {}", order.id, order.buyer_id, order.total);
        Ok(order)
    }

    async fn transition_order_status(
        &self,
        order_id: i64,
        update: StatusUpdate,
    ) -> Result<Option<Order>, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::update_order_status(order_id, &update, &mut tx).await? {
            Some(order) => {
                let items = orders::fetch_items(order.id, &mut tx).await?;
                Some(order.with_items(items))
            },
            None => None,
        };
        tx.commit().await?;
        if order.is_some() {
            debug!("🗃️ Order #{order_id} moved from {} to {}", update.from, update.to);
        }
        Ok(order)
    }

    async fn insert_registration(&self, registration: NewRegistration) -> Result<Registration, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let registration = registrations::insert_registration(&registration, &mut conn).await?;
        debug!("🗃️ Registration #{} for applicant #{} saved", registration.id, registration.applicant_id);
        Ok(registration)
    }

    async fn claim_session(&self, session: NewPaymentSession) -> Result<PaymentSession, OrderFlowError> {
        let target = session.target;
        // The engine never deletes orders or registrations, so the check cannot go stale
        if !self.target_exists(target).await? {
            return Err(Self::not_found(target));
        }
        let mut conn = self.pool.acquire().await?;
        let record = sessions::insert_session(&session, &mut conn).await?;
        debug!("🗃️ Payment session {} claimed for {target}", record.reference);
        Ok(record)
    }

    async fn activate_session(
        &self,
        reference: &str,
        authorization_url: &str,
    ) -> Result<Option<PaymentSession>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        sessions::activate_session(reference, authorization_url, &mut conn).await
    }

    async fn release_session(&self, reference: &str) -> Result<bool, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        sessions::release_session(reference, &mut conn).await
    }

    async fn mark_session_failed(&self, reference: &str) -> Result<bool, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        sessions::mark_failed(reference, &mut conn).await
    }

    async fn mark_session_succeeded(&self, reference: &str) -> Result<bool, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        sessions::mark_succeeded(reference, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), OrderFlowError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SettlementStore<Order> for SqliteDatabase {
    async fn fetch_target(&self, id: i64) -> Result<Option<Order>, OrderFlowError> {
        self.fetch_order(id).await
    }

    async fn settle(&self, id: i64, reference: &str, payload: &str) -> Result<SettleResult<Order>, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let result = match settlements::mark_paid::<Order>(id, reference, payload, &mut tx).await? {
            Some(order) => {
                let closed = sessions::close_sessions_for_settlement(order.target(), reference, &mut tx).await?;
                let items = orders::fetch_items(order.id, &mut tx).await?;
                trace!("🗃️ Order #{id} paid with {reference}. {closed} sessions closed");
                SettleResult::Applied(order.with_items(items))
            },
            None => {
                let order = orders::fetch_order(id, &mut tx).await?.ok_or(OrderFlowError::OrderNotFound(id))?;
                if order.is_settled() {
                    SettleResult::AlreadySettled(order)
                } else {
                    SettleResult::NotSettleable(order)
                }
            },
        };
        tx.commit().await?;
        Ok(result)
    }
}

impl SettlementStore<Registration> for SqliteDatabase {
    async fn fetch_target(&self, id: i64) -> Result<Option<Registration>, OrderFlowError> {
        self.fetch_registration(id).await
    }

    async fn settle(
        &self,
        id: i64,
        reference: &str,
        payload: &str,
    ) -> Result<SettleResult<Registration>, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let result = match settlements::mark_paid::<Registration>(id, reference, payload, &mut tx).await? {
            Some(registration) => {
                sessions::close_sessions_for_settlement(registration.target(), reference, &mut tx).await?;
                trace!("🗃️ Registration #{id} paid with {reference}");
                SettleResult::Applied(registration)
            },
            None => {
                let registration = settlements::fetch_target::<Registration>(id, &mut tx)
                    .await?
                    .ok_or(OrderFlowError::RegistrationNotFound(id))?;
                if registration.is_settled() {
                    SettleResult::AlreadySettled(registration)
                } else {
                    SettleResult::NotSettleable(registration)
                }
            },
        };
        tx.commit().await?;
        Ok(result)
    }
}
