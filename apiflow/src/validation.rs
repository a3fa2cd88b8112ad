//! Validation adapter
//!
//! Wraps the declarative [`validator`] derive for whole request structs and a
//! small rule registry for ad-hoc checks on single values. Both report
//! failures as [`ValidationFailure`] pairs: the wire-case field name and the
//! identifier of the violated rule (`required`, `email`, `length`, ...).
//!
//! Custom rules are not built in. The `encrypted` identifier rule, for
//! instance, has to be registered explicitly:
//!
//! ```rust
//! use apiflow::validation::{rules, Validator};
//!
//! let validator = Validator::new().with_rule("encrypted", rules::encrypted);
//!
//! assert!(validator.validate_field("user_id", &"65536", "required,encrypted").is_ok());
//! assert!(validator.validate_field("user_id", &"abc", "encrypted").is_err());
//! ```
//!
//! Struct-level rules come from `#[validate(...)]` attributes:
//!
//! ```rust
//! use apiflow::validation::Validator;
//! use validator::Validate;
//!
//! #[derive(Validate)]
//! struct CreateUser {
//!     #[validate(email)]
//!     email: String,
//!     #[validate(length(min = 2))]
//!     name: String,
//! }
//!
//! let failures = Validator::new().validate_struct(&CreateUser {
//!     email: "nope".to_string(),
//!     name: "A".to_string(),
//! });
//!
//! assert_eq!(failures.len(), 2);
//! assert_eq!(failures[0].field, "email");
//! assert_eq!(failures[0].message, "email");
//! assert_eq!(failures[1].message, "length");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::case::to_wire_case;

/// One violated rule on one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Wire-case field name
    pub field: String,
    /// Rule identifier, e.g. `required`
    pub message: String,
}

impl ValidationFailure {
    /// Create a failure, normalizing the field name to wire case
    ///
    /// # Example
    ///
    /// ```rust
    /// use apiflow::validation::ValidationFailure;
    ///
    /// let failure = ValidationFailure::new("EmailAddress", "email");
    /// assert_eq!(failure.field, "email_address");
    /// ```
    pub fn new(field: impl AsRef<str>, message: impl Into<String>) -> Self {
        Self {
            field: to_wire_case(field.as_ref()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Signature of a field rule: the value under test and the optional `=param`
pub type RuleFn = dyn Fn(&Value, Option<&str>) -> bool + Send + Sync;

/// Rule that stops evaluation when the value is empty
const OMIT_EMPTY: &str = "omitempty";

/// Validation entry point shared by every request
///
/// Holds the field rule registry. It is immutable once built, so one instance
/// is shared read-only across all concurrent requests.
#[derive(Clone)]
pub struct Validator {
    rules: HashMap<String, Arc<RuleFn>>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Validator").field("rules", &names).finish()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Create a validator with the built-in rules
    ///
    /// Built-ins: `required`, `email`, `url`, `numeric`, `alpha`, `alphanum`,
    /// `min`, `max`, `len`. `omitempty` is understood by the expression parser.
    #[must_use]
    pub fn new() -> Self {
        Self { rules: HashMap::new() }
            .with_rule("required", rules::required)
            .with_rule("email", rules::email)
            .with_rule("url", rules::url)
            .with_rule("numeric", rules::numeric)
            .with_rule("alpha", rules::alpha)
            .with_rule("alphanum", rules::alphanum)
            .with_rule("min", rules::min)
            .with_rule("max", rules::max)
            .with_rule("len", rules::len)
    }

    /// Register a rule under `name`, replacing any rule with the same name
    #[must_use]
    pub fn with_rule<F>(mut self, name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&Value, Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.rules.insert(name.into(), Arc::new(rule));
        self
    }

    /// Check whether a rule is registered
    #[must_use]
    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Validate a struct against its `#[validate(...)]` attributes
    ///
    /// An empty result means the struct is valid. Failures are ordered by
    /// field name; nested structs report `parent.child`, lists `parent[i].child`.
    pub fn validate_struct<T: Validate>(&self, target: &T) -> Vec<ValidationFailure> {
        match target.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => collect_failures(&errors),
        }
    }

    /// Validate one value against a rule expression
    ///
    /// The expression is a comma-separated list of `rule` or `rule=param`
    /// entries, evaluated left to right. Evaluation stops at the first violated
    /// rule, so a field reports at most one failure. A leading `omitempty`
    /// skips the remaining rules for empty values.
    pub fn validate_field<V>(
        &self,
        name: &str,
        value: &V,
        expression: &str,
    ) -> Result<(), Vec<ValidationFailure>>
    where
        V: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);

        for entry in expression.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (rule, param) = match entry.split_once('=') {
                Some((rule, param)) => (rule.trim(), Some(param.trim())),
                None => (entry, None),
            };

            if rule == OMIT_EMPTY {
                if rules::is_empty(&value) {
                    return Ok(());
                }
                continue;
            }

            let passed = match self.rules.get(rule) {
                Some(check) => check(&value, param),
                None => {
                    tracing::warn!(rule, field = name, "Unknown validation rule");
                    false
                }
            };

            if !passed {
                return Err(vec![ValidationFailure::new(name, rule)]);
            }
        }

        Ok(())
    }
}

/// Flatten derive errors into wire-case failures
fn collect_failures(errors: &ValidationErrors) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    flatten_into(errors, None, &mut failures);
    // stable: keeps rule order within a field
    failures.sort_by(|a, b| a.field.cmp(&b.field));
    failures
}

fn flatten_into(errors: &ValidationErrors, prefix: Option<&str>, out: &mut Vec<ValidationFailure>) {
    for (field, kind) in errors.errors() {
        let name = match prefix {
            Some(prefix) => format!("{prefix}.{}", to_wire_case(field)),
            None => to_wire_case(field),
        };

        match kind {
            ValidationErrorsKind::Field(errors) => {
                out.extend(errors.iter().map(|error| ValidationFailure {
                    field: name.clone(),
                    message: error.code.to_string(),
                }));
            }
            ValidationErrorsKind::Struct(nested) => flatten_into(nested, Some(&name), out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten_into(nested, Some(&format!("{name}[{index}]")), out);
                }
            }
        }
    }
}

/// Swap the low and high 16-bit halves of the lower 32 bits
///
/// Identifiers are exposed to clients in this obfuscated form. This is not
/// encryption; it only keeps raw sequential keys out of URLs.
///
/// # Example
///
/// ```rust
/// use apiflow::validation::swap_halves;
///
/// assert_eq!(swap_halves(1), 65536);
/// assert_eq!(swap_halves(65536), 1);
/// ```
#[must_use]
pub const fn swap_halves(value: i64) -> i64 {
    ((0xFFFF & value) << 16) | ((0xFFFF_0000 & value) >> 16)
}

/// Whether a string is a valid obfuscated identifier
///
/// The string must parse as an integer whose half-swapped value is at least 1.
#[must_use]
pub fn is_encrypted_id(raw: &str) -> bool {
    raw.trim()
        .parse::<i64>()
        .is_ok_and(|value| swap_halves(value) >= 1)
}

/// `encrypted` rule for `#[validate(custom(function = ...))]` attributes
///
/// ```rust
/// use validator::Validate;
///
/// #[derive(Validate)]
/// struct ShowUser {
///     #[validate(custom(function = "apiflow::validation::validate_encrypted"))]
///     id: String,
/// }
///
/// assert!(ShowUser { id: "65536".to_string() }.validate().is_ok());
/// assert!(ShowUser { id: "0".to_string() }.validate().is_err());
/// ```
pub fn validate_encrypted(value: &str) -> Result<(), validator::ValidationError> {
    if is_encrypted_id(value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("encrypted"))
    }
}

/// Field rules usable with [`Validator::with_rule`]
pub mod rules {
    use serde_json::Value;
    use validator::{ValidateEmail, ValidateUrl};

    use super::is_encrypted_id;

    /// Zero-value check: null, false, 0, and empty strings, arrays and objects
    #[must_use]
    pub fn is_empty(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
        }
    }

    /// Value is present and not empty
    pub fn required(value: &Value, _: Option<&str>) -> bool {
        !is_empty(value)
    }

    /// Value is a well-formed email address
    pub fn email(value: &Value, _: Option<&str>) -> bool {
        value
            .as_str()
            .is_some_and(|s| String::from(s).validate_email())
    }

    /// Value is a well-formed URL
    pub fn url(value: &Value, _: Option<&str>) -> bool {
        value
            .as_str()
            .is_some_and(|s| String::from(s).validate_url())
    }

    /// Value is a number or a string holding one
    pub fn numeric(value: &Value, _: Option<&str>) -> bool {
        match value {
            Value::Number(_) => true,
            Value::String(s) => s.trim().parse::<f64>().is_ok(),
            _ => false,
        }
    }

    /// Value is a non-empty string of letters
    pub fn alpha(value: &Value, _: Option<&str>) -> bool {
        value
            .as_str()
            .is_some_and(|s| !s.is_empty() && s.chars().all(char::is_alphabetic))
    }

    /// Value is a non-empty string of letters and digits
    pub fn alphanum(value: &Value, _: Option<&str>) -> bool {
        value
            .as_str()
            .is_some_and(|s| !s.is_empty() && s.chars().all(char::is_alphanumeric))
    }

    /// Size is at least `param`: characters, items, entries or numeric value
    pub fn min(value: &Value, param: Option<&str>) -> bool {
        compare(value, param, |size, bound| size >= bound)
    }

    /// Size is at most `param`
    pub fn max(value: &Value, param: Option<&str>) -> bool {
        compare(value, param, |size, bound| size <= bound)
    }

    /// Size is exactly `param`
    pub fn len(value: &Value, param: Option<&str>) -> bool {
        compare(value, param, |size, bound| (size - bound).abs() < f64::EPSILON)
    }

    /// Obfuscated identifier (see [`super::swap_halves`])
    pub fn encrypted(value: &Value, _: Option<&str>) -> bool {
        match value {
            Value::String(s) => is_encrypted_id(s),
            Value::Number(n) => n.as_i64().is_some_and(|v| is_encrypted_id(&v.to_string())),
            _ => false,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn size_of(value: &Value) -> Option<f64> {
        match value {
            Value::String(s) => Some(s.chars().count() as f64),
            Value::Array(items) => Some(items.len() as f64),
            Value::Object(map) => Some(map.len() as f64),
            Value::Number(n) => n.as_f64(),
            Value::Null | Value::Bool(_) => None,
        }
    }

    fn compare(value: &Value, param: Option<&str>, check: impl Fn(f64, f64) -> bool) -> bool {
        let Some(bound) = param.and_then(|p| p.parse::<f64>().ok()) else {
            return false;
        };

        size_of(value).is_some_and(|size| check(size, bound))
    }
}
