use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use bazaar_order_engine::traits::{GatewayError, OrderFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Invalid request body. {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    OrderFlow(#[from] OrderFlowError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::OrderFlow(e) => order_flow_status(e),
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn order_flow_status(e: &OrderFlowError) -> StatusCode {
    use OrderFlowError::*;
    match e {
        ProductUnavailable(_) | InvalidQuantity { .. } | EmptyOrder | AmountOutOfRange => StatusCode::BAD_REQUEST,
        AlreadyPaid(_) | NotPayable(..) | SessionAlreadyLive(_) => StatusCode::BAD_REQUEST,
        InvalidSignature => StatusCode::BAD_REQUEST,
        ReferenceImmutable(_) | InvalidTransition { .. } => StatusCode::CONFLICT,
        // Sellers get a 404 for orders they have nothing in, so that order ids cannot be enumerated.
        OrderNotFound(_) | RegistrationNotFound(_) | NotOrderOwner | ReferenceNotFound(_) => StatusCode::NOT_FOUND,
        Gateway(GatewayError::Incomplete(_)) => StatusCode::CONFLICT,
        Gateway(g) if g.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        Gateway(_) => StatusCode::BAD_GATEWAY,
        Catalog(_) => StatusCode::BAD_GATEWAY,
        DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Access token is not valid. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        ServerError::AuthenticationError(self.clone()).status_code()
    }

    fn error_response(&self) -> HttpResponse {
        ServerError::AuthenticationError(self.clone()).error_response()
    }
}
