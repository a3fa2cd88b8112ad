//! Input-key tracking
//!
//! After a body has been bound into a typed request, absent fields and fields
//! explicitly sent with their zero value look the same. This module re-reads
//! the raw body as a loose JSON object and reports which of its keys name a
//! declared field of the request type, so partial updates can touch only what
//! the client actually sent.
//!
//! # Example
//!
//! ```rust
//! use apiflow::field_set;
//! use apiflow::input::input_keys;
//!
//! struct UpdateUser;
//! field_set!(UpdateUser { Name, Email, IsActive });
//!
//! let keys = input_keys::<UpdateUser>(br#"{"is_active": false, "name": "", "role": "admin"}"#);
//! assert_eq!(keys, vec!["is_active", "name"]);
//! ```

use serde_json::{Map, Value};

use crate::case::to_field_case;
use crate::fields::FieldSet;

/// Keys of the raw JSON body that are declared fields of `T`
///
/// Keys keep their wire casing and body order. A body that is not a JSON
/// object yields no keys.
#[must_use]
pub fn input_keys<T: FieldSet>(raw: &[u8]) -> Vec<String> {
    let Ok(object) = serde_json::from_slice::<Map<String, Value>>(raw) else {
        return Vec::new();
    };

    object
        .into_iter()
        .map(|(key, _)| key)
        .filter(|key| T::has_field(&to_field_case(key)))
        .collect()
}
