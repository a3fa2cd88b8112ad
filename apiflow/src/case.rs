//! Key translation between wire case and field case
//!
//! Request bodies, query strings and response keys use *wire case*
//! (`created_at`), while field registries name their fields in *field case*
//! (`CreatedAt`). Every other component translates keys through these two
//! functions.
//!
//! # Example
//!
//! ```rust
//! use apiflow::case::{to_field_case, to_wire_case};
//!
//! assert_eq!(to_field_case("created_at"), "CreatedAt");
//! assert_eq!(to_wire_case("CreatedAt"), "created_at");
//! assert_eq!(to_wire_case("IDName"), "id_name");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

/// Separates a capitalized word from whatever precedes it (`IDName` -> `ID_Name`)
static FIRST_CAP: Lazy<Regex> =
    Lazy::new(|| Regex::new("(.)([A-Z][a-z]+)").expect("valid first-cap pattern"));

/// Separates an uppercase letter from a preceding lowercase letter or digit
static ALL_CAP: Lazy<Regex> =
    Lazy::new(|| Regex::new("([a-z0-9])([A-Z])").expect("valid all-cap pattern"));

/// Convert a wire-case key into field case
///
/// Splits on `_` and uppercases the first character of every segment. Empty
/// segments (`a__b`, leading or trailing `_`) contribute nothing.
///
/// # Example
///
/// ```rust
/// use apiflow::case::to_field_case;
///
/// assert_eq!(to_field_case("id_e"), "IdE");
/// assert_eq!(to_field_case("name"), "Name");
/// ```
#[must_use]
pub fn to_field_case(wire: &str) -> String {
    let mut out = String::with_capacity(wire.len());

    for word in wire.split('_') {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }

    out
}

/// Convert a field-case name into wire case
///
/// Boundaries are inserted in two passes, first before capitalized words and
/// then between a lowercase letter or digit and the uppercase letter that
/// follows it, after which the whole string is lowercased. Acronyms therefore
/// stay together: `UserID` becomes `user_id` and `IDName` becomes `id_name`.
///
/// This inverts [`to_field_case`] only when every wire segment starts with a
/// letter. A segment that starts with a digit merges into the one before it:
/// `user_2fa` becomes `User2fa`, which converts back to `user2fa`.
///
/// # Example
///
/// ```rust
/// use apiflow::case::to_wire_case;
///
/// assert_eq!(to_wire_case("UserID"), "user_id");
/// assert_eq!(to_wire_case("Address2Line"), "address2_line");
/// ```
#[must_use]
pub fn to_wire_case(field: &str) -> String {
    let wire = FIRST_CAP.replace_all(field, "${1}_${2}");
    let wire = ALL_CAP.replace_all(&wire, "${1}_${2}");

    wire.to_lowercase()
}
