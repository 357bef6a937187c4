use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The gateway did not respond within the timeout")]
    Timeout,
    #[error("Could not reach the gateway: {0}")]
    ConnectionError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The gateway declined the request: {0}")]
    Declined(String),
    #[error("Webhook signature is missing or invalid")]
    InvalidSignature,
}

impl GatewayApiError {
    /// True for failures on the gateway's side of the wire (network trouble, timeouts and 5xx responses).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionError(_) => true,
            Self::QueryError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for GatewayApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() || e.is_request() {
            Self::ConnectionError(e.to_string())
        } else if e.is_decode() {
            Self::JsonError(e.to_string())
        } else {
            Self::RestResponseError(e.to_string())
        }
    }
}
