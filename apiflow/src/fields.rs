//! Declared field registries
//!
//! Input-key tracking and response projection need to know which fields a
//! type declares and, for responses, how to read one of them by name. Types
//! declare this once with [`field_set!`](crate::field_set) (names only, for
//! request structs) or [`field_registry!`](crate::field_registry) (names and
//! accessors, for response records). Names are given in field case.
//!
//! # Example
//!
//! ```rust
//! use apiflow::field_registry;
//! use apiflow::fields::{FieldSet, Record};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct User {
//!     id_e: String,
//!     name: String,
//! }
//!
//! field_registry!(User {
//!     IdE => id_e,
//!     Name => name,
//! });
//!
//! let user = User { id_e: "65536".into(), name: "Alice".into() };
//!
//! assert!(User::has_field("Name"));
//! assert_eq!(user.field("Name").unwrap(), "Alice");
//! assert!(user.field("Password").is_none());
//! ```

use serde_json::Value;

/// Static set of fields declared by a type, in field case
pub trait FieldSet {
    /// Declared field-case names
    fn field_names() -> &'static [&'static str];

    /// Whether `name` (field case) is declared
    fn has_field(name: &str) -> bool {
        Self::field_names().contains(&name)
    }
}

/// A response record whose fields can be read by field-case name
///
/// Object safe, so handlers can hold results of any record type.
pub trait Record: Send {
    /// Read one field, or `None` if the type does not declare it
    fn field(&self, name: &str) -> Option<Value>;

    /// Full representation of the record
    fn to_value(&self) -> serde_json::Result<Value>;
}

impl<R: Record + ?Sized> Record for Box<R> {
    fn field(&self, name: &str) -> Option<Value> {
        (**self).field(name)
    }

    fn to_value(&self) -> serde_json::Result<Value> {
        (**self).to_value()
    }
}

/// Declare the field-case names of a request type
///
/// ```rust
/// use apiflow::field_set;
/// use apiflow::fields::FieldSet;
///
/// struct UpdateUser {
///     name: Option<String>,
///     email: Option<String>,
/// }
///
/// field_set!(UpdateUser { Name, Email });
///
/// assert_eq!(UpdateUser::field_names(), &["Name", "Email"]);
/// ```
#[macro_export]
macro_rules! field_set {
    ($ty:ty { $($name:ident),+ $(,)? }) => {
        impl $crate::fields::FieldSet for $ty {
            fn field_names() -> &'static [&'static str] {
                &[$(stringify!($name)),+]
            }
        }
    };
}

/// Declare field-case names and accessors of a response type
///
/// Implements [`FieldSet`] and [`Record`]. The type must implement
/// `serde::Serialize` and `Send`, and every listed field must be `Serialize`.
#[macro_export]
macro_rules! field_registry {
    ($ty:ty { $($name:ident => $field:ident),+ $(,)? }) => {
        $crate::field_set!($ty { $($name),+ });

        impl $crate::fields::Record for $ty {
            fn field(&self, name: &str) -> ::std::option::Option<$crate::__private::Value> {
                match name {
                    $(stringify!($name) => $crate::__private::to_value(&self.$field).ok(),)+
                    _ => ::std::option::Option::None,
                }
            }

            fn to_value(&self) -> $crate::__private::Result<$crate::__private::Value> {
                $crate::__private::to_value(self)
            }
        }
    };
}
