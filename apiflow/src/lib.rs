//! # apiflow
//!
//! Per-request pipeline for JSON/XML HTTP APIs built on axum.
//!
//! Each route drives one [`Handler`](handler::Handler) through a fixed
//! lifecycle: bind the body into a typed request, validate it, record which
//! keys the client actually sent, parse list-query parameters on GET, run the
//! business logic, then serve a uniform response envelope.
//!
//! ## Features
//!
//! - **Binding and validation**: JSON bodies into `validator`-derived structs,
//!   with failures reported per field in wire case
//! - **Input-key tracking**: distinguish omitted fields from zero values for
//!   partial updates
//! - **List queries**: `page`, `per_page`, `sort`, `field`, `embed`, `id`, `count`
//! - **Field projection**: `?field=id,name` reduces GET results to the
//!   requested fields
//! - **Envelope**: `{status, message, data, total, errors}` as JSON or XML
//! - **Server**: request IDs, body limits, timeouts, panic recovery, graceful
//!   shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use apiflow::prelude::*;
//!
//! async fn ping(ctx: RequestContext) -> Response {
//!     let mut handler = Handler::prepare(&ctx);
//!     handler.set_handler_result(Payload::raw(serde_json::json!({"pong": true})));
//!     handler.serve(Ok::<(), Error>(()))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let pipeline = Pipeline::from_config(&config, Validator::new());
//!     let app = Router::new().route("/ping", get(ping)).with_state(pipeline);
//!
//!     Server::new(config).serve(app).await
//! }
//! ```

pub mod case;
pub mod config;
pub mod envelope;
pub mod error;
pub mod fields;
pub mod handler;
pub mod input;
pub mod observability;
pub mod projection;
pub mod query;
pub mod server;
pub mod validation;

#[doc(hidden)]
pub mod __private {
    pub use serde_json::{to_value, Result, Value};
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::case::{to_field_case, to_wire_case};
    pub use crate::config::{Config, ResponseConfig, ServiceConfig};
    pub use crate::envelope::{status_text, Envelope, ResponseFormat, Status};
    pub use crate::error::{Error, Result};
    pub use crate::fields::{FieldSet, Record};
    pub use crate::handler::{Handler, Pipeline, RequestContext};
    pub use crate::input::input_keys;
    pub use crate::observability::{init_tracing, shutdown_tracing};
    pub use crate::projection::Payload;
    pub use crate::query::{QueryParams, Sort, SortOrder, DEFAULT_PER_PAGE, MAX_PER_PAGE};
    pub use crate::server::Server;
    pub use crate::validation::{validate_encrypted, ValidationFailure, Validator};
    pub use crate::{field_registry, field_set};

    pub use axum::{
        extract::{Path, State},
        http::{HeaderMap, Method, StatusCode, Uri},
        response::{IntoResponse, Response},
        routing::{delete, get, patch, post, put},
        Router,
    };

    pub use serde::{Deserialize, Serialize};

    // Re-export tracing macros and types
    pub use tracing::{debug, error, info, instrument, trace, warn, Level};
}
