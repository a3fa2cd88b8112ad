//! Handler results and field projection
//!
//! A handler result is a [`Payload`]: one registry-backed record, a list of
//! them, or a raw JSON value. On successful GET responses the caller may ask
//! for a subset of fields with `?field=a,b`, and [`Payload::project`] reduces
//! the payload to those fields.
//!
//! Requested names are wire case. `id` is looked up as `id_e`, the obfuscated
//! identifier, so raw primary keys are never exposed under `id`. Names the
//! result type does not declare are dropped without error, which lets clients
//! ask for fields a resource may not have.

use std::fmt;

use serde_json::{Map, Value};

use crate::case::to_field_case;
use crate::fields::Record;

/// Wire name that is redirected to the obfuscated identifier
const PUBLIC_ID: &str = "id";

/// Wire name of the obfuscated identifier
const ENCRYPTED_ID: &str = "id_e";

/// Result data set by a handler
pub enum Payload {
    /// A single record
    Record(Box<dyn Record>),
    /// A sequence of records
    List(Vec<Box<dyn Record>>),
    /// An already-built JSON value
    Raw(Value),
}

impl Payload {
    /// Wrap a single record
    pub fn record<R: Record + 'static>(record: R) -> Self {
        Self::Record(Box::new(record))
    }

    /// Wrap a sequence of records
    pub fn list<R, I>(records: I) -> Self
    where
        R: Record + 'static,
        I: IntoIterator<Item = R>,
    {
        Self::List(
            records
                .into_iter()
                .map(|record| Box::new(record) as Box<dyn Record>)
                .collect(),
        )
    }

    /// Wrap a raw JSON value
    pub fn raw(value: Value) -> Self {
        Self::Raw(value)
    }

    /// Full representation, without projection
    pub fn to_value(&self) -> serde_json::Result<Value> {
        match self {
            Self::Record(record) => record.to_value(),
            Self::List(records) => records
                .iter()
                .map(|record| record.to_value())
                .collect::<serde_json::Result<Vec<_>>>()
                .map(Value::Array),
            Self::Raw(value) => Ok(value.clone()),
        }
    }

    /// Reduce the payload to the requested wire-case fields
    ///
    /// Records become objects holding only the requested fields, lists become
    /// arrays of such objects. Raw objects are filtered by key, raw arrays
    /// element-wise; other raw values pass through unchanged.
    pub fn project(&self, fields: &[String]) -> Value {
        match self {
            Self::Record(record) => Value::Object(project_record(record.as_ref(), fields)),
            Self::List(records) => Value::Array(
                records
                    .iter()
                    .map(|record| Value::Object(project_record(record.as_ref(), fields)))
                    .collect(),
            ),
            Self::Raw(value) => project_raw(value, fields),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(_) => f.write_str("Payload::Record"),
            Self::List(records) => write!(f, "Payload::List({} records)", records.len()),
            Self::Raw(value) => f.debug_tuple("Payload::Raw").field(value).finish(),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

fn lookup_name(requested: &str) -> &str {
    if requested == PUBLIC_ID {
        ENCRYPTED_ID
    } else {
        requested
    }
}

fn project_record(record: &dyn Record, fields: &[String]) -> Map<String, Value> {
    let mut out = Map::new();

    for requested in fields {
        let name = lookup_name(requested);
        if let Some(value) = record.field(&to_field_case(name)) {
            out.insert(name.to_string(), value);
        }
    }

    out
}

fn project_raw(value: &Value, fields: &[String]) -> Value {
    match value {
        Value::Object(object) => {
            let mut out = Map::new();
            for requested in fields {
                let name = lookup_name(requested);
                if let Some(found) = object.get(name) {
                    out.insert(name.to_string(), found.clone());
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::Object(_) => project_raw(item, fields),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}
