use std::fmt::Debug;

use bazaar_order_engine::{
    db_types::Order,
    order_objects::{IssuedSession, ReconcileResult},
    traits::{OrderFlowDatabase, OrderFlowError},
};
use cucumber::World;

use crate::support::Harness;

#[derive(Default, World)]
pub struct MarketplaceWorld {
    pub system: Option<Harness>,
    pub order: Option<Order>,
    pub session: Option<IssuedSession>,
    pub last_result: Option<Result<ReconcileResult, OrderFlowError>>,
    pub last_error: Option<OrderFlowError>,
}

impl Debug for MarketplaceWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceWorld")
            .field("order", &self.order.as_ref().map(|o| o.id))
            .field("session", &self.session.as_ref().map(|s| &s.reference))
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl MarketplaceWorld {
    pub fn system(&self) -> &Harness {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn order(&self) -> &Order {
        self.order.as_ref().expect("No order has been placed")
    }

    pub fn session(&self) -> &IssuedSession {
        self.session.as_ref().expect("No payment session has been issued")
    }
}

impl Harness {
    pub fn db_url(&self) -> String {
        self.db.url().to_string()
    }
}
