use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use payment_engine::{db_types::PaymentId, PaymentFlowError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Invalid payment. {0}")]
    ValidationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The payment does not belong to this merchant.")]
    Unauthorized,
    #[error("Too many requests. Slow down and try again later.")]
    RateLimited(Option<PaymentId>),
    #[error("The request conflicts with the current state of the payment. {0}")]
    Conflict(String),
    #[error("Payment {0} was recorded, but could not be processed.")]
    IncompletePayment(PaymentId),
}

/// The only error text a client sees for a server-side failure. The details go to the log.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred. Please try again later.";

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingCredentials => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedCredentials(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::ForbiddenPeer => StatusCode::FORBIDDEN,
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IncompletePayment(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            Self::RateLimited(Some(id)) => json!({ "error": self.to_string(), "id": id }),
            Self::IncompletePayment(id) => json!({ "error": INTERNAL_ERROR_MESSAGE, "id": id }),
            _ if status.is_server_error() => json!({ "error": INTERNAL_ERROR_MESSAGE }),
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(status).insert_header(ContentType::json()).body(body.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No credentials were supplied.")]
    MissingCredentials,
    #[error("Credentials are not in the correct format. {0}")]
    PoorlyFormattedCredentials(String),
    #[error("Invalid merchant credentials.")]
    InvalidCredentials,
    #[error("Requests from this address are not allowed.")]
    ForbiddenPeer,
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::Validation(e) => Self::ValidationError(e.to_string()),
            PaymentFlowError::NotFound(_) | PaymentFlowError::UnknownReference(_) => Self::NoRecordFound(e.to_string()),
            PaymentFlowError::Unauthorized => Self::Unauthorized,
            PaymentFlowError::AuthenticationFailed => Self::AuthenticationError(AuthError::InvalidCredentials),
            PaymentFlowError::RateLimited(id) => Self::RateLimited(Some(id)),
            PaymentFlowError::InvalidTransition { .. } => Self::Conflict(e.to_string()),
            PaymentFlowError::Incomplete { id, reason } => {
                error!("💻️ Payment {id} was recorded, but the request failed. {reason}");
                Self::IncompletePayment(id)
            },
            PaymentFlowError::Internal(msg) => {
                error!("💻️ Internal error while handling a request. {msg}");
                Self::BackendError(msg)
            },
        }
    }
}
