//! # Backend contracts
//!
//! The engine never talks to a database, a product catalog, or a card gateway directly. It goes through the traits in
//! this module.
//!
//! * [`OrderManagement`] provides read-only queries for orders, sessions and registrations.
//! * [`OrderFlowDatabase`] is the write side of the ledger. Every method is a single atomic step.
//! * [`SettlementStore`] settles a payable aggregate ([`Settleable`]). It is generic so that orders and registrations
//!   share one reconciliation path. [`PaymentBackend`] bundles the ledger with both stores.
//! * [`CatalogPriceResolver`] is the only source of truth for prices at checkout.
//! * [`DeliveryFeePolicy`] computes the delivery fee for a checkout.
//! * [`PaymentGateway`] initializes hosted payment sessions, verifies references and authenticates webhooks.
mod catalog;
mod order_flow_database;
mod order_management;
mod payment_gateway;
mod settlement;

pub use catalog::{CatalogError, CatalogPriceResolver, DeliveryFeePolicy, FlatDeliveryFee, ProductQuote};
pub use order_flow_database::{OrderFlowDatabase, OrderFlowError};
pub use order_management::OrderManagement;
pub use payment_gateway::{GatewayError, GatewaySession, PaymentGateway, SessionRequest};
pub use settlement::{PaymentBackend, Settleable, SettleResult, SettlementStore};
