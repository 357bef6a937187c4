//! Bazaar Order Engine
//!
//! The order engine owns the life of a marketplace order, from checkout to delivery, and the reconciliation of the
//! payments made against it. It is provider-agnostic: the card gateway, the product catalog and the database are all
//! reached through traits.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@db`]). Sqlite is the supported backend. You should never need to access
//!    the database directly. Use the public API instead. The data types used in the database are defined in the
//!    [`db_types`] module and are public.
//! 2. The backend traits ([`traits`]). Backends, catalogs and payment gateways implement these to plug into the
//!    engine.
//! 3. The engine public API. [`OrderLedgerApi`] creates and transitions orders, [`PaymentSessionApi`] issues payment
//!    references, [`ReconciliationApi`] applies payment outcomes and [`FulfillmentApi`] is the seller-facing view of
//!    the order state machine.
//!
//! The engine also emits events when orders are created, paid, or change status, and when a payment fails. Hook into
//! them through [`events::EventHooks`].
mod db;

pub mod db_types;
mod engine_api;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{db_url, SqliteDatabase};
pub use engine_api::{
    fulfillment_api::FulfillmentApi,
    order_ledger_api::OrderLedgerApi,
    order_objects,
    order_query_api::OrderQueryApi,
    payment_session_api::{PaymentSessionApi, DEFAULT_REFERENCE_PREFIX},
    reconciliation_api::ReconciliationApi,
    registration_api::RegistrationApi,
    DEFAULT_GATEWAY_TIMEOUT,
};
