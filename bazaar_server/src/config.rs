use std::{env, io::Write};

use bazaar_common::{helpers::parse_boolean_flag, Money, Secret, DEFAULT_CURRENCY_CODE};
use bazaar_order_engine::{db_url, DEFAULT_REFERENCE_PREFIX};
use gateway_tools::GatewayConfig;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::json;
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_BZR_HOST: &str = "127.0.0.1";
const DEFAULT_BZR_PORT: u16 = 8480;
const DEFAULT_REDIRECT_URL: &str = "bazaar://payments";
const DEFAULT_CATALOG_URL: &str = "http://127.0.0.1:8481";
const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Everything the server needs, read once at start-up and handed to the handlers. Nothing here is re-read while the
/// server is running.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    pub checkout: CheckoutConfig,
    /// Where the gateway sends the buyer after the hosted payment page. Normally this server's `/payments/callback`.
    pub callback_url: Option<String>,
    /// The client deep link the callback handler redirects to.
    pub redirect_url: String,
    /// Base URL of the product catalog service.
    pub catalog_url: String,
    /// If set, buyer notifications are POSTed here. Otherwise they are only logged.
    pub notification_url: Option<String>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
}

#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    pub currency: String,
    pub delivery_fee: Money,
    pub registration_fee: Money,
    pub reference_prefix: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            delivery_fee: Money::default(),
            registration_fee: Money::default(),
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BZR_HOST.to_string(),
            port: DEFAULT_BZR_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            gateway: GatewayConfig::default(),
            checkout: CheckoutConfig::default(),
            callback_url: None,
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            notification_url: None,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("BZR_HOST").ok().unwrap_or_else(|| DEFAULT_BZR_HOST.into());
        let port = env::var("BZR_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for BZR_PORT. {e} Using the default, {DEFAULT_BZR_PORT}, instead."
                    );
                    DEFAULT_BZR_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_BZR_PORT);
        let database_url = db_url();
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let gateway = GatewayConfig::new_from_env_or_default();
        let checkout = CheckoutConfig::from_env_or_default();
        let callback_url = env::var("BZR_CALLBACK_URL").ok().or_else(|| {
            warn!("🪛️ BZR_CALLBACK_URL is not set. The gateway's dashboard setting will decide where buyers return to.");
            None
        });
        let redirect_url = env::var("BZR_REDIRECT_URL").ok().unwrap_or_else(|| {
            info!("🪛️ BZR_REDIRECT_URL is not set. Using {DEFAULT_REDIRECT_URL}");
            DEFAULT_REDIRECT_URL.to_string()
        });
        let catalog_url = env::var("BZR_CATALOG_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ BZR_CATALOG_URL is not set. Using {DEFAULT_CATALOG_URL}");
            DEFAULT_CATALOG_URL.to_string()
        });
        let notification_url = env::var("BZR_NOTIFICATION_URL").ok().filter(|s| !s.trim().is_empty());
        if notification_url.is_none() {
            info!("🪛️ BZR_NOTIFICATION_URL is not set. Buyer notifications will only be logged.");
        }
        let use_x_forwarded_for = parse_boolean_flag(env::var("BZR_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("BZR_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            auth,
            gateway,
            checkout,
            callback_url,
            redirect_url,
            catalog_url: catalog_url.trim_end_matches('/').to_string(),
            notification_url,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

impl CheckoutConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let currency = env::var("BZR_CURRENCY").map(|s| s.trim().to_uppercase()).unwrap_or_else(|_| {
            info!("🪛️ BZR_CURRENCY is not set. Using {DEFAULT_CURRENCY_CODE}");
            defaults.currency.clone()
        });
        let delivery_fee = money_from_env("BZR_DELIVERY_FEE", defaults.delivery_fee);
        let registration_fee = money_from_env("BZR_REGISTRATION_FEE", defaults.registration_fee);
        let reference_prefix = env::var("BZR_REFERENCE_PREFIX")
            .ok()
            .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or(defaults.reference_prefix);
        Self { currency, delivery_fee, registration_fee, reference_prefix }
    }
}

/// Reads an amount in major units (e.g. `2000` or `2000.50`) from the environment.
fn money_from_env(name: &str, default: Money) -> Money {
    env::var(name)
        .map_err(|_| info!("🪛️ {name} is not set. Using the default value of {default}."))
        .and_then(|s| {
            s.parse::<Money>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}. Using the default value of {default}."))
        })
        .ok()
        .filter(|m| m.value() >= 0)
        .unwrap_or(default)
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
/// Access tokens are issued by the identity service. This server only validates them, using the shared HS256 secret.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. No token issued by \
             the identity service will be accepted. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        let tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        match tmpfile {
            Some((mut f, p)) => {
                let key_data = json!({ "jwt_secret": secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, \
                         you are doing it wrong! Set the BZR_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret. ");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("BZR_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [BZR_JWT_SECRET]")))?;
        Self::new(secret)
    }

    pub fn new<S: Into<String>>(secret: S) -> Result<Self, ServerError> {
        let secret = secret.into();
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ServerError::ConfigurationError(format!(
                "The JWT secret must be at least {MIN_JWT_SECRET_LENGTH} characters long"
            )));
        }
        Ok(Self { jwt_secret: Secret::new(secret) })
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The part of the configuration that request handlers need. It carries no secrets.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub redirect_url: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { use_x_forwarded_for: false, use_forwarded: false, redirect_url: DEFAULT_REDIRECT_URL.to_string() }
    }
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            redirect_url: config.redirect_url.clone(),
        }
    }
}
