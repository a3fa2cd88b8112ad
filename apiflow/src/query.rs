//! List query parameters
//!
//! GET requests carry their list semantics in the query string. This module
//! turns the raw multi-valued query mapping into [`QueryParams`]: pagination,
//! sorting, projection, relation embedding, id filtering and the count flag.
//!
//! Parsing never fails. Malformed values degrade to documented defaults:
//!
//! | key        | malformed / missing                                   |
//! |------------|-------------------------------------------------------|
//! | `count`    | `false`                                               |
//! | `per_page` | [`DEFAULT_PER_PAGE`]; values above [`MAX_PER_PAGE`] clamp |
//! | `page`     | page 1 (offset 0)                                     |
//! | `sort`     | absent                                                |
//! | `field`, `embed`, `id` | empty list                                |
//!
//! # Example
//!
//! ```rust
//! use apiflow::query::{QueryParams, SortOrder};
//!
//! let query = QueryParams::from_pairs([
//!     ("page", "2"),
//!     ("per_page", "5"),
//!     ("sort", "-created_at"),
//!     ("field", "id,name"),
//! ]);
//!
//! assert_eq!(query.limit, 5);
//! assert_eq!(query.offset, 5);
//! assert_eq!(query.sort.as_ref().unwrap().order, SortOrder::Desc);
//! assert_eq!(query.fields, vec!["id", "name"]);
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default number of items per page
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Maximum allowed items per page
pub const MAX_PER_PAGE: u32 = 100;

/// Raw query string mapping: key to every value supplied for it, in order
pub type RawQuery = HashMap<String, Vec<String>>;

/// Sort direction for list queries
///
/// # Example
///
/// ```rust
/// use apiflow::query::SortOrder;
///
/// assert_eq!(format!("{}", SortOrder::Asc), "asc");
/// assert_eq!(format!("{}", SortOrder::Desc), "desc");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Sort in ascending order (A-Z, 0-9, oldest first)
    #[default]
    Asc,
    /// Sort in descending order (Z-A, 9-0, newest first)
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

impl SortOrder {
    /// Convert to SQL ORDER BY clause fragment
    ///
    /// # Example
    ///
    /// ```rust
    /// use apiflow::query::SortOrder;
    ///
    /// assert_eq!(SortOrder::Asc.as_sql(), "ASC");
    /// assert_eq!(SortOrder::Desc.as_sql(), "DESC");
    /// ```
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A sort request: the wire-case field name and its direction
///
/// Displays as `"<field> <direction>"`, e.g. `created_at desc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// Field to sort by, without the `-` prefix
    pub field: String,
    /// Sort direction
    pub order: SortOrder,
}

impl Sort {
    /// Parse a `sort` query value; a leading `-` means descending
    ///
    /// Returns `None` when no field name remains.
    ///
    /// # Example
    ///
    /// ```rust
    /// use apiflow::query::{Sort, SortOrder};
    ///
    /// let sort = Sort::parse("-created_at").unwrap();
    /// assert_eq!(sort.field, "created_at");
    /// assert_eq!(sort.order, SortOrder::Desc);
    ///
    /// assert_eq!(Sort::parse("name").unwrap().order, SortOrder::Asc);
    /// assert!(Sort::parse("-").is_none());
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (field, order) = match raw.strip_prefix('-') {
            Some(field) => (field, SortOrder::Desc),
            None => (raw, SortOrder::Asc),
        };

        if field.is_empty() {
            return None;
        }

        Some(Self {
            field: field.to_string(),
            order,
        })
    }

    /// ORDER BY fragment, e.g. `created_at DESC`
    #[must_use]
    pub fn as_sql(&self) -> String {
        format!("{} {}", self.field, self.order.as_sql())
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.order)
    }
}

/// Query parameters for list operations
///
/// Built once per GET request by the handler. Defaults: `limit` 10,
/// `offset` 0, no sort, empty lists, `count` false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Caller asked for a total count
    pub count: bool,

    /// Requested ordering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,

    /// Number of rows to skip
    pub offset: u64,

    /// Maximum number of rows to return
    pub limit: u32,

    /// Identifier filter
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,

    /// Projection allow-list, in request order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,

    /// Relations to embed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embed: Vec<String>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            count: false,
            sort: None,
            offset: 0,
            limit: DEFAULT_PER_PAGE,
            ids: Vec::new(),
            fields: Vec::new(),
            embed: Vec::new(),
        }
    }
}

impl QueryParams {
    /// Parse a raw query mapping
    ///
    /// Only the first value of each key is considered, and a first value that
    /// is empty counts as missing.
    #[must_use]
    pub fn parse(raw: &RawQuery) -> Self {
        let first = |key: &str| {
            raw.get(key)
                .and_then(|values| values.first())
                .map(String::as_str)
                .filter(|value| !value.is_empty())
        };

        let mut query = Self::default();

        if let Some(value) = first("count") {
            query.count = parse_bool(value);
        }

        if let Some(value) = first("embed") {
            query.embed = split_list(value);
        }

        if let Some(value) = first("field") {
            query.fields = split_list(value);
        }

        if let Some(value) = first("id") {
            query.ids = split_list(value);
        }

        if let Some(value) = first("per_page") {
            query.limit = parse_per_page(value);
        }

        if let Some(value) = first("page") {
            let page = parse_page(value);
            query.offset = u64::from(page - 1) * u64::from(query.limit);
        }

        if let Some(value) = first("sort") {
            query.sort = Sort::parse(value);
        }

        query
    }

    /// Parse from `(key, value)` pairs, as produced by a query string decoder
    ///
    /// Repeated keys keep every value; [`QueryParams::parse`] only reads the first.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut raw = RawQuery::new();
        for (key, value) in pairs {
            raw.entry(key.into()).or_default().push(value.into());
        }

        Self::parse(&raw)
    }

    /// Check whether a relation was requested through `embed`
    ///
    /// # Example
    ///
    /// ```rust
    /// use apiflow::query::QueryParams;
    ///
    /// let query = QueryParams::from_pairs([("embed", "author,tags")]);
    /// assert!(query.is_embed("tags"));
    /// assert!(!query.is_embed("comments"));
    /// ```
    #[must_use]
    pub fn is_embed(&self, relation: &str) -> bool {
        self.embed.iter().any(|embed| embed == relation)
    }

    /// Check if a projection was requested
    #[must_use]
    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Check if sorting is specified
    #[must_use]
    pub fn has_sort(&self) -> bool {
        self.sort.is_some()
    }

    /// The 1-indexed page implied by `offset` and `limit`
    #[must_use]
    pub fn page_number(&self) -> u64 {
        self.offset / u64::from(self.limit.max(1)) + 1
    }
}

/// Boolean forms accepted by `count`; everything else is false
fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "TRUE" | "true" | "True")
}

fn parse_per_page(value: &str) -> u32 {
    match value.trim().parse::<i64>() {
        Ok(n) if n > 0 => u32::try_from(n).unwrap_or(MAX_PER_PAGE).min(MAX_PER_PAGE),
        _ => DEFAULT_PER_PAGE,
    }
}

fn parse_page(value: &str) -> u32 {
    match value.trim().parse::<i64>() {
        Ok(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => 1,
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_display() {
        assert_eq!(format!("{}", SortOrder::Asc), "asc");
        assert_eq!(format!("{}", SortOrder::Desc), "desc");
    }

    #[test]
    fn test_sort_order_default() {
        assert_eq!(SortOrder::default(), SortOrder::Asc);
    }

    #[test]
    fn test_sort_parse_descending() {
        let sort = Sort::parse("-created_at").unwrap();
        assert_eq!(sort.field, "created_at");
        assert_eq!(sort.order, SortOrder::Desc);
        assert_eq!(sort.to_string(), "created_at desc");
        assert_eq!(sort.as_sql(), "created_at DESC");
    }

    #[test]
    fn test_sort_parse_ascending() {
        let sort = Sort::parse("name").unwrap();
        assert_eq!(sort.field, "name");
        assert_eq!(sort.order, SortOrder::Asc);
        assert_eq!(sort.to_string(), "name asc");
    }

    #[test]
    fn test_sort_parse_strips_only_leading_dash() {
        let sort = Sort::parse("-first-name").unwrap();
        assert_eq!(sort.field, "first-name");
    }

    #[test]
    fn test_sort_parse_empty() {
        assert!(Sort::parse("-").is_none());
        assert!(Sort::parse("  ").is_none());
    }

    #[test]
    fn test_defaults_without_parameters() {
        let query = QueryParams::parse(&RawQuery::new());
        assert_eq!(query, QueryParams::default());
        assert_eq!(query.limit, 10);
        assert_eq!(query.offset, 0);
        assert!(query.sort.is_none());
        assert!(query.fields.is_empty());
        assert!(query.embed.is_empty());
        assert!(query.ids.is_empty());
        assert!(!query.count);
    }

    #[test]
    fn test_pagination_second_page() {
        let query = QueryParams::from_pairs([("page", "2"), ("per_page", "5")]);
        assert_eq!(query.limit, 5);
        assert_eq!(query.offset, 5);
        assert_eq!(query.page_number(), 2);
    }

    #[test]
    fn test_pagination_first_page() {
        let query = QueryParams::from_pairs([("page", "1"), ("per_page", "5")]);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn test_page_without_per_page_uses_default_limit() {
        let query = QueryParams::from_pairs([("page", "3")]);
        assert_eq!(query.limit, 10);
        assert_eq!(query.offset, 20);
    }

    #[test]
    fn test_page_parameter_order_does_not_matter() {
        let query = QueryParams::from_pairs([("page", "3"), ("per_page", "20")]);
        assert_eq!(query.offset, 40);
    }

    #[test]
    fn test_malformed_per_page_falls_back_to_default() {
        assert_eq!(QueryParams::from_pairs([("per_page", "abc")]).limit, 10);
        assert_eq!(QueryParams::from_pairs([("per_page", "0")]).limit, 10);
        assert_eq!(QueryParams::from_pairs([("per_page", "-4")]).limit, 10);
    }

    #[test]
    fn test_per_page_clamped_to_max() {
        assert_eq!(QueryParams::from_pairs([("per_page", "500")]).limit, MAX_PER_PAGE);
    }

    #[test]
    fn test_malformed_page_is_first_page() {
        assert_eq!(QueryParams::from_pairs([("page", "x")]).offset, 0);
        assert_eq!(QueryParams::from_pairs([("page", "0")]).offset, 0);
        assert_eq!(QueryParams::from_pairs([("page", "-2")]).offset, 0);
    }

    #[test]
    fn test_count_flag() {
        assert!(QueryParams::from_pairs([("count", "true")]).count);
        assert!(QueryParams::from_pairs([("count", "1")]).count);
        assert!(!QueryParams::from_pairs([("count", "false")]).count);
        assert!(!QueryParams::from_pairs([("count", "yes")]).count);
    }

    #[test]
    fn test_list_parameters() {
        let query = QueryParams::from_pairs([
            ("field", "id,name,email"),
            ("embed", "roles"),
            ("id", "a1, b2,,c3"),
        ]);
        assert_eq!(query.fields, vec!["id", "name", "email"]);
        assert_eq!(query.embed, vec!["roles"]);
        assert_eq!(query.ids, vec!["a1", "b2", "c3"]);
    }

    #[test]
    fn test_empty_values_are_missing() {
        let query = QueryParams::from_pairs([("field", ""), ("sort", ""), ("page", "")]);
        assert!(query.fields.is_empty());
        assert!(query.sort.is_none());
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn test_first_value_wins() {
        let query = QueryParams::from_pairs([("sort", "name"), ("sort", "-email")]);
        let sort = query.sort.unwrap();
        assert_eq!(sort.field, "name");
        assert_eq!(sort.order, SortOrder::Asc);
    }

    #[test]
    fn test_sort_from_query() {
        let query = QueryParams::from_pairs([("sort", "-created_at")]);
        assert!(query.has_sort());
        let sort = query.sort.unwrap();
        assert_eq!(sort.field, "created_at");
        assert_eq!(sort.order, SortOrder::Desc);
    }

    #[test]
    fn test_is_embed() {
        let query = QueryParams::from_pairs([("embed", "author,tags")]);
        assert!(query.is_embed("author"));
        assert!(query.is_embed("tags"));
        assert!(!query.is_embed("auth"));
        assert!(!QueryParams::default().is_embed("author"));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let query = QueryParams::from_pairs([("q", "alice"), ("order", "desc")]);
        assert_eq!(query, QueryParams::default());
    }

    #[test]
    fn test_query_params_serde() {
        let query = QueryParams::from_pairs([("sort", "-name"), ("field", "id")]);
        let json = serde_json::to_string(&query).unwrap();
        let back: QueryParams = serde_json::from_str(&json).unwrap();
        assert_eq!(query, back);
    }
}
