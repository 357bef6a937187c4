use std::time::Duration;

use bazaar_common::Secret;
use log::*;

pub const DEFAULT_GATEWAY_URL: &str = "https://api.paystack.co";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: Secret<String>,
    /// Key used to sign webhooks. Falls back to the secret key, which is what most gateways sign with.
    pub webhook_secret: Secret<String>,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            secret_key: Secret::default(),
            webhook_secret: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("BZR_GATEWAY_BASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ BZR_GATEWAY_BASE_URL not set, using {DEFAULT_GATEWAY_URL} as default");
            DEFAULT_GATEWAY_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("BZR_GATEWAY_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ BZR_GATEWAY_SECRET_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let webhook_secret = match std::env::var("BZR_GATEWAY_WEBHOOK_SECRET") {
            Ok(s) => Secret::new(s),
            Err(_) => {
                info!("🪛️ BZR_GATEWAY_WEBHOOK_SECRET not set. Webhooks will be checked against the secret key.");
                secret_key.clone()
            },
        };
        let timeout = std::env::var("BZR_GATEWAY_TIMEOUT")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid BZR_GATEWAY_TIMEOUT value '{s}': {e}. Using the default."))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Self { base_url: base_url.trim_end_matches('/').to_string(), secret_key, webhook_secret, timeout }
    }
}
