//! A thin client for the hosted card payment gateway.
//!
//! The gateway exposes two calls the marketplace needs: opening a transaction (which returns the hosted page the buyer
//! is redirected to) and verifying a transaction by its reference. It also pushes signed webhooks, which
//! [`parse_webhook`] authenticates and decodes.
mod api;
mod config;
mod error;
mod webhook;

pub mod data_objects;

pub use api::GatewayApi;
pub use config::GatewayConfig;
pub use data_objects::{InitializeTransaction, TransactionAuthorization, TransactionData, TransactionStatus};
pub use error::GatewayApiError;
pub use webhook::{parse_webhook, sign_webhook, WebhookEvent, WEBHOOK_SIGNATURE_HEADER};
