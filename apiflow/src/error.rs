//! Error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::envelope::{status_text, Envelope};
use crate::validation::ValidationFailure;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request body could not be decoded into the target type
    #[error("{0}")]
    Bind(String),

    /// The request body has a content type the pipeline cannot decode
    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    /// One or more validation rules were violated
    #[error("Validation Failed")]
    Validation(Vec<ValidationFailure>),

    /// The request body is larger than the configured limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Bad request
    #[error("{0}")]
    BadRequest(String),

    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// A payload could not be encoded
    #[error("Encoding error: {0}")]
    Encode(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Bind(_) | Self::UnsupportedMediaType(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Config(_) | Self::Io(_) | Self::Encode(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Failure envelope describing this error
    ///
    /// Server-side errors are logged and reported with a generic message.
    #[must_use]
    pub fn to_envelope(&self) -> Envelope {
        let code = self.status_code();

        match self {
            Self::Validation(failures) => {
                let mut envelope = Envelope::failure(code, status_text(code));
                envelope.errors = failures.clone();
                envelope
            }
            Self::Config(_) | Self::Io(_) | Self::Encode(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                Envelope::failure(code, status_text(code))
            }
            _ => Envelope::failure(code, self.to_string()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        self.to_envelope().into_response()
    }
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<Vec<ValidationFailure>> for Error {
    fn from(failures: Vec<ValidationFailure>) -> Self {
        Error::Validation(failures)
    }
}
