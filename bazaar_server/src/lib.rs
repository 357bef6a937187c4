//! # Bazaar server
//! This crate hosts the HTTP surface of the bazaar order engine. It is responsible for:
//! * Checking buyers out, pricing every line against the catalog service.
//! * Opening payment sessions with the card gateway and sending buyers to the hosted payment page.
//! * Reconciling payment outcomes, whether they arrive by the buyer's return from the gateway, an explicit verify
//!   request or a signed webhook.
//! * Letting sellers move their orders through fulfilment.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following public routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/payments/callback`: Where the gateway sends buyers after the hosted payment page.
//! * `/payments/webhook`: Signed payment notifications from the gateway.
//!
//! Everything else lives under `/api` and needs a bearer access token. See [routes](routes/index.html).
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod notifier;
pub mod routes;
pub mod server;
