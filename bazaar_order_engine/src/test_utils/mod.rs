//! Helpers for tests: throwaway databases, an in-memory catalog and a scriptable payment gateway.
mod fake_gateway;
pub mod prepare_env;
mod static_catalog;

pub use fake_gateway::{FakeGateway, FAKE_WEBHOOK_SECRET};
pub use static_catalog::StaticCatalog;
