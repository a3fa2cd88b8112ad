//! Response envelope
//!
//! Every response produced by the pipeline, successful or not, has the same
//! shape:
//!
//! ```json
//! {
//!   "status": "success",
//!   "message": null,
//!   "data": {"id_e": "65536", "name": "Alice"},
//!   "total": 12,
//!   "errors": [{"field": "email", "message": "required"}]
//! }
//! ```
//!
//! `message` and `data` are omitted when absent, `total` when zero and
//! `errors` when empty. The transport status code travels alongside the body
//! and is never serialized. The same envelope renders as XML when the service
//! is configured for it, with a `<response>` root element.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::validation::ValidationFailure;

/// Outcome word carried by every envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The request was handled
    Success,
    /// The request failed
    Fail,
}

/// Output encoding of the envelope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// `application/json`
    #[default]
    Json,
    /// `application/xml`
    Xml,
}

impl ResponseFormat {
    /// Content type header value for this format
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
        }
    }
}

/// Message text for a status code
///
/// 422 reads "Validation Failed"; other codes use their usual reason phrase.
///
/// ```rust
/// use apiflow::envelope::status_text;
/// use axum::http::StatusCode;
///
/// assert_eq!(status_text(StatusCode::UNPROCESSABLE_ENTITY), "Validation Failed");
/// assert_eq!(status_text(StatusCode::CREATED), "Created");
/// ```
#[must_use]
pub fn status_text(code: StatusCode) -> &'static str {
    match code.as_u16() {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        422 => "Validation Failed",
        500 => "Internal Server Error",
        _ => code.canonical_reason().unwrap_or("Unknown Status"),
    }
}

/// The response wrapper returned for every request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename = "response")]
pub struct Envelope {
    /// Transport status code
    #[serde(skip)]
    pub code: StatusCode,

    /// Outcome word
    pub status: Status,

    /// Human readable message, absent on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Result payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Total number of matching records for count queries
    #[serde(skip_serializing_if = "is_zero")]
    pub total: i64,

    /// Validation failures, in the order they were recorded
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationFailure>,
}

fn is_zero(total: &i64) -> bool {
    *total == 0
}

impl Default for Envelope {
    /// The pessimistic starting state: 400, fail, "Bad Request"
    fn default() -> Self {
        Self::failure(StatusCode::BAD_REQUEST, status_text(StatusCode::BAD_REQUEST))
    }
}

impl Envelope {
    /// Create an envelope in its initial state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure envelope with the given code and message
    #[must_use]
    pub fn failure(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status: Status::Fail,
            message: Some(message.into()),
            data: None,
            total: 0,
            errors: Vec::new(),
        }
    }

    /// Set the transport status code
    pub fn set_code(&mut self, code: StatusCode) -> &mut Self {
        self.code = code;
        self
    }

    /// Set the data payload
    pub fn set_data(&mut self, data: Value) -> &mut Self {
        self.data = Some(data);
        self
    }

    /// Set the message
    pub fn set_message(&mut self, message: impl Into<String>) -> &mut Self {
        self.message = Some(message.into());
        self
    }

    /// Append one validation failure
    pub fn set_error(&mut self, field: impl AsRef<str>, message: impl Into<String>) -> &mut Self {
        self.errors.push(ValidationFailure::new(field, message));
        self
    }

    /// Whether the envelope currently reports success
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Move to the validation-failed state: 422, "Validation Failed", no data
    pub fn fail_validation(&mut self) {
        self.code = StatusCode::UNPROCESSABLE_ENTITY;
        self.status = Status::Fail;
        self.message = Some(status_text(self.code).to_string());
        self.data = None;
    }

    /// Move to the errored state: 400 with the error text, no data
    pub fn fail_with(&mut self, message: impl Into<String>) {
        self.code = StatusCode::BAD_REQUEST;
        self.status = Status::Fail;
        self.message = Some(message.into());
        self.data = None;
    }

    /// Move to the succeeded state
    ///
    /// Codes above 300 (including the initial 400) become 200; a code set
    /// earlier for success, such as 201, is kept.
    pub fn succeed(&mut self, data: Option<Value>) {
        if self.code.as_u16() > 300 {
            self.code = StatusCode::OK;
        }
        self.status = Status::Success;
        self.message = None;
        if data.is_some() {
            self.data = data;
        }
    }

    /// Encode the envelope in the given format
    ///
    /// XML output is lossy for some payloads. Nested arrays flatten into
    /// repeated elements, so `[[1, 2], [3]]` renders as three `<data>`
    /// elements. Object keys that are not valid XML names, such as `1abc`,
    /// fail with [`Error::Encode`].
    pub fn render(&self, format: ResponseFormat) -> Result<Vec<u8>> {
        match format {
            ResponseFormat::Json => {
                serde_json::to_vec(self).map_err(|e| Error::Encode(e.to_string()))
            }
            ResponseFormat::Xml => quick_xml::se::to_string(self)
                .map(String::into_bytes)
                .map_err(|e| Error::Encode(e.to_string())),
        }
    }

    /// Build the HTTP response in the given format
    ///
    /// If encoding fails the client receives a 500 JSON envelope instead.
    pub fn into_response_as(self, format: ResponseFormat) -> Response {
        match self.render(format) {
            Ok(body) => with_content_type(self.code, body, format),
            Err(e) => {
                tracing::error!(error = %e, code = %self.code, "Failed to render response envelope");
                let fallback = Self::failure(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    status_text(StatusCode::INTERNAL_SERVER_ERROR),
                );
                let body = serde_json::to_vec(&fallback).unwrap_or_default();
                with_content_type(fallback.code, body, ResponseFormat::Json)
            }
        }
    }
}

fn with_content_type(code: StatusCode, body: Vec<u8>, format: ResponseFormat) -> Response {
    (
        code,
        [(header::CONTENT_TYPE, HeaderValue::from_static(format.content_type()))],
        body,
    )
        .into_response()
}

impl IntoResponse for Envelope {
    /// Render as JSON
    fn into_response(self) -> Response {
        self.into_response_as(ResponseFormat::Json)
    }
}
