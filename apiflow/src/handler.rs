//! Per-request orchestration
//!
//! A route takes a [`RequestContext`] and drives one [`Handler`] through its
//! lifecycle: prepare (bind, validate, track input keys, parse list query),
//! run business logic, then [`Handler::serve`] exactly once.
//!
//! # Example
//!
//! ```rust,no_run
//! use apiflow::prelude::*;
//! use axum::{response::Response, routing::post, Router};
//! use serde::{Deserialize, Serialize};
//! use validator::Validate;
//!
//! #[derive(Deserialize, Validate)]
//! struct CreateUser {
//!     #[validate(length(min = 1))]
//!     name: String,
//! }
//! apiflow::field_set!(CreateUser { Name });
//!
//! #[derive(Serialize)]
//! struct User {
//!     id_e: String,
//!     name: String,
//! }
//! apiflow::field_registry!(User { IdE => id_e, Name => name });
//!
//! async fn create_user(ctx: RequestContext) -> Response {
//!     let (mut handler, request) = Handler::prepare_with::<CreateUser>(&ctx);
//!     let request = match request {
//!         Ok(request) => request,
//!         Err(e) => return handler.serve(Err(e)),
//!     };
//!
//!     handler.set_created(Payload::record(User {
//!         id_e: "65536".to_string(),
//!         name: request.name,
//!     }));
//!     handler.serve(Ok::<(), Error>(()))
//! }
//!
//! let app: Router = Router::new()
//!     .route("/users", post(create_user))
//!     .with_state(Pipeline::default());
//! ```

use std::fmt;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRef, FromRequest, Query, Request},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::Response,
};
use serde::{de::DeserializeOwned, Serialize};
use validator::Validate;

use crate::config::Config;
use crate::envelope::{Envelope, ResponseFormat};
use crate::error::{Error, Result};
use crate::fields::FieldSet;
use crate::input::input_keys;
use crate::projection::Payload;
use crate::query::QueryParams;
use crate::validation::{ValidationFailure, Validator};

/// Default limit for buffered request bodies (64 MiB)
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Shared, read-only pipeline state
///
/// Cheap to clone. Add it to the router state (directly or through
/// [`FromRef`]) so routes can extract a [`RequestContext`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    validator: Arc<Validator>,
    format: ResponseFormat,
    body_limit: usize,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Validator::new())
    }
}

impl Pipeline {
    /// Create a pipeline around a validator, with JSON output
    #[must_use]
    pub fn new(validator: Validator) -> Self {
        Self {
            validator: Arc::new(validator),
            format: ResponseFormat::Json,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Create a pipeline with the output format and body limit from config
    #[must_use]
    pub fn from_config(config: &Config, validator: Validator) -> Self {
        Self::new(validator)
            .with_format(config.response.format)
            .with_body_limit(config.response.body_limit_bytes)
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the maximum buffered body size
    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// The shared validator
    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Output format
    #[must_use]
    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    /// Maximum buffered body size in bytes
    #[must_use]
    pub fn body_limit(&self) -> usize {
        self.body_limit
    }
}

/// Everything the pipeline needs from one inbound request
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    pipeline: Pipeline,
}

impl RequestContext {
    /// Build a context from already-read request parts
    pub fn new(
        pipeline: Pipeline,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            body: body.into(),
            pipeline,
        }
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URI
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw request body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Pipeline state the request was extracted with
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Decoded `(key, value)` pairs of the query string
    ///
    /// A query string that cannot be decoded yields no pairs.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        Query::<Vec<(String, String)>>::try_from_uri(&self.uri)
            .map(|Query(pairs)| pairs)
            .unwrap_or_default()
    }

    /// Decode the JSON body into `T`
    ///
    /// The content type must be absent, `application/json` or a `+json`
    /// type. An empty body is a bind error.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        if let Some(value) = self.headers.get(header::CONTENT_TYPE) {
            let content_type = value.to_str().unwrap_or_default();
            if !is_json_content_type(content_type) {
                return Err(Error::UnsupportedMediaType(content_type.to_string()));
            }
        }

        if self.body.is_empty() {
            return Err(Error::Bind("Request body is empty".to_string()));
        }

        serde_json::from_slice(&self.body).map_err(|e| Error::Bind(e.to_string()))
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

impl<S> FromRequest<S> for RequestContext
where
    S: Send + Sync,
    Pipeline: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let pipeline = Pipeline::from_ref(state);
        let (parts, body) = req.into_parts();
        let limit = pipeline.body_limit;

        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        if declared.is_some_and(|length| length > limit as u64) {
            return Err(Error::PayloadTooLarge(format!("body exceeds {limit} bytes")));
        }

        let body = axum::body::to_bytes(body, limit).await.map_err(|e| {
            if exceeds_length_limit(&e) {
                Error::PayloadTooLarge(format!("body exceeds {limit} bytes"))
            } else {
                Error::BadRequest(format!("Failed to read request body: {e}"))
            }
        })?;

        Ok(Self::new(pipeline, parts.method, parts.uri, parts.headers, body))
    }
}

fn exceeds_length_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    std::iter::successors(Some(err), |e| e.source())
        .any(|e| e.to_string() == "length limit exceeded")
}

/// Per-request pipeline state
///
/// Owned by exactly one request. [`Handler::serve`] consumes it, so a
/// response can only be produced once.
pub struct Handler {
    method: Method,
    format: ResponseFormat,
    validator: Arc<Validator>,
    envelope: Envelope,
    result: Option<Payload>,
    input_keys: Vec<String>,
    query: Option<QueryParams>,
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("method", &self.method)
            .field("format", &self.format)
            .field("envelope", &self.envelope)
            .field("result", &self.result)
            .field("input_keys", &self.input_keys)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl Handler {
    /// Prepare a handler for a request without a body
    ///
    /// Parses the list query on GET requests.
    #[must_use]
    pub fn prepare(ctx: &RequestContext) -> Self {
        let query = (ctx.method == Method::GET).then(|| QueryParams::from_pairs(ctx.query_pairs()));

        Self {
            method: ctx.method.clone(),
            format: ctx.pipeline.format,
            validator: Arc::clone(&ctx.pipeline.validator),
            envelope: Envelope::new(),
            result: None,
            input_keys: Vec::new(),
            query,
        }
    }

    /// Prepare a handler and bind the body into `T`
    ///
    /// Binds, validates and records the input keys. Validation failures are
    /// stored on the handler, so the handler is always returned and can serve
    /// the failure.
    pub fn prepare_with<T>(ctx: &RequestContext) -> (Self, Result<T>)
    where
        T: DeserializeOwned + Validate + FieldSet,
    {
        let mut handler = Self::prepare(ctx);

        let target = match ctx.bind::<T>() {
            Ok(target) => target,
            Err(e) => {
                tracing::debug!(method = %ctx.method, path = %ctx.uri.path(), error = %e, "Failed to bind request body");
                return (handler, Err(e));
            }
        };

        handler.input_keys = input_keys::<T>(&ctx.body);

        let failures = handler.validator.validate_struct(&target);
        if !failures.is_empty() {
            tracing::debug!(
                method = %ctx.method,
                path = %ctx.uri.path(),
                failures = failures.len(),
                "Request validation failed"
            );
            handler.add_validation(failures.clone());
            return (handler, Err(Error::Validation(failures)));
        }

        (handler, Ok(target))
    }

    /// Set the result payload
    pub fn set_handler_result(&mut self, payload: Payload) {
        self.result = Some(payload);
    }

    /// Set the result payload and answer 201 Created
    pub fn set_created(&mut self, payload: Payload) {
        self.envelope.set_code(StatusCode::CREATED);
        self.result = Some(payload);
    }

    /// Set the total record count for count queries
    pub fn set_total(&mut self, total: i64) {
        self.envelope.total = total;
    }

    /// Record one validation failure
    pub fn set_error_validate(&mut self, field: &str, message: &str) {
        self.envelope.set_error(field, message);
    }

    /// Record several validation failures
    pub fn add_validation(&mut self, failures: impl IntoIterator<Item = ValidationFailure>) {
        self.envelope.errors.extend(failures);
    }

    /// Validate one value against a rule expression
    ///
    /// Failures are recorded on the handler and also returned.
    pub fn valid<V>(&mut self, name: &str, value: &V, rule: &str) -> Result<()>
    where
        V: Serialize + ?Sized,
    {
        self.validator
            .validate_field(name, value, rule)
            .map_err(|failures| {
                self.envelope.errors.extend(failures.iter().cloned());
                Error::Validation(failures)
            })
    }

    /// Parsed list query, present on GET requests
    pub fn query_params(&self) -> Option<&QueryParams> {
        self.query.as_ref()
    }

    /// Whether a relation was requested through `embed`
    pub fn is_embed(&self, relation: &str) -> bool {
        self.query.as_ref().is_some_and(|query| query.is_embed(relation))
    }

    /// Body keys the client actually sent that name declared fields
    pub fn input_keys(&self) -> &[String] {
        &self.input_keys
    }

    /// Whether the client sent `key` in the body
    pub fn has_input(&self, key: &str) -> bool {
        self.input_keys.iter().any(|sent| sent == key)
    }

    /// Current envelope, before serving
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Finish the request and build the response
    ///
    /// Recorded validation failures win and answer 422. Otherwise an error
    /// answers 400 with its text, and success answers with the result,
    /// projected to the requested fields on GET.
    pub fn serve<E: fmt::Display>(mut self, outcome: std::result::Result<(), E>) -> Response {
        if !self.envelope.errors.is_empty() {
            self.envelope.fail_validation();
        } else if let Err(e) = outcome {
            self.envelope.fail_with(e.to_string());
        } else {
            let data = match self.result.take().map(|payload| self.shape(&payload)) {
                Some(Ok(value)) => Some(value),
                Some(Err(e)) => {
                    return Error::Encode(e.to_string())
                        .to_envelope()
                        .into_response_as(self.format);
                }
                None => None,
            };
            self.envelope.succeed(data);
        }

        self.envelope.into_response_as(self.format)
    }

    fn shape(&self, payload: &Payload) -> serde_json::Result<serde_json::Value> {
        match &self.query {
            Some(query) if self.method == Method::GET && query.has_fields() => {
                Ok(payload.project(&query.fields))
            }
            _ => payload.to_value(),
        }
    }
}
