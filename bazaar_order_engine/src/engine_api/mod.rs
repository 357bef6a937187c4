pub mod fulfillment_api;
pub mod order_ledger_api;
pub mod order_objects;
pub mod order_query_api;
pub mod payment_session_api;
pub mod reconciliation_api;
pub mod registration_api;

mod transitions;

use std::time::Duration;

/// Upper bound on any single call to the payment gateway.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(20);
