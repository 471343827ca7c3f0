//! Repository Contracts
//!
//! One trait per entity, one adapter per store technology. Adapters hold a
//! shared store handle and translate between domain entities and
//! store-native documents; reads always hand back detached entities.

pub mod file;
pub mod user;

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::backends::{Filter, FindQuery, SortOrder};
use crate::error::{OrmError, OrmResult};

pub use file::{
    DocumentFileRepository, FileRepository, FileStats, MimeTypeStats, FILES_COLLECTION,
};
pub use user::{
    split_name, DocumentUserRepository, RoleCount, UserRepository, UserStats, USERS_COLLECTION,
};

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Sort field used when the requested one is unknown
pub(crate) const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Page request with filters and sorting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number
    pub page: i64,
    pub limit: i64,
    /// Filter name to raw value, as received from a query string
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    pub sort_by: Option<String>,
    #[serde(default, with = "sort_order_serde")]
    pub sort_order: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            filters: BTreeMap::new(),
            sort_by: None,
            sort_order: SortOrder::Desc,
        }
    }
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page,
            limit,
            ..Default::default()
        }
    }

    pub fn filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = order;
        self
    }

    /// Page clamped to at least 1
    pub fn effective_page(&self) -> u64 {
        self.page.max(1) as u64
    }

    /// Limit with non-positive values replaced by the default and capped at the maximum
    pub fn effective_limit(&self) -> u64 {
        let limit = if self.limit <= 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            self.limit.min(MAX_PAGE_LIMIT)
        };
        limit as u64
    }

    pub fn offset(&self) -> u64 {
        (self.effective_page() - 1).saturating_mul(self.effective_limit())
    }

    /// Non-empty filter value
    pub(crate) fn filter_value(&self, name: &str) -> Option<&str> {
        self.filters
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Find query for this page, sorting on `sort_fields[requested]` or the default field
    pub(crate) fn to_find_query(&self, filter: Filter, sort_fields: &[(&str, &str)]) -> FindQuery {
        let sort_field = self
            .sort_by
            .as_deref()
            .and_then(|requested| {
                sort_fields
                    .iter()
                    .find(|(name, _)| *name == requested)
                    .map(|(_, field)| *field)
            })
            .unwrap_or(DEFAULT_SORT_FIELD);

        FindQuery::new(filter)
            .sort_by(sort_field, self.sort_order)
            .skip(self.offset())
            .limit(self.effective_limit())
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit > 0 { total.div_ceil(limit) } else { 0 };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

/// Timestamps are stored as fixed-width RFC 3339 strings so they sort lexically
pub(crate) fn timestamp_value(at: &DateTime<Utc>) -> JsonValue {
    JsonValue::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Exact boolean filter from a query-string value
pub(crate) fn parse_flag(name: &str, raw: &str) -> OrmResult<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(OrmError::Validation(format!(
            "Filter '{}' expects a boolean, got '{}'",
            name, other
        ))),
    }
}

/// Flag filter where an absent field counts as `false`
pub(crate) fn flag_filter(field: &str, value: bool) -> Filter {
    let set = Filter::any_of(vec![Filter::eq(field, true), Filter::eq(field, 1)]);
    if value {
        set
    } else {
        Filter::all_of(vec![Filter::ne(field, true), Filter::ne(field, 1)])
    }
}

mod sort_order_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::backends::SortOrder;

    pub fn serialize<S: Serializer>(order: &SortOrder, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(order.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SortOrder, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamping() {
        let request = PageRequest::new(0, 0);
        assert_eq!(request.effective_page(), 1);
        assert_eq!(request.effective_limit(), 10);
        assert_eq!(request.offset(), 0);

        let request = PageRequest::new(-3, 500);
        assert_eq!(request.effective_page(), 1);
        assert_eq!(request.effective_limit(), 100);

        assert_eq!(PageRequest::new(3, 20).offset(), 40);
    }

    #[test]
    fn test_page_math() {
        let page = Page::new(vec![1; 10], 25, 2, 10);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());
        assert!(page.has_prev());

        let empty: Page<u8> = Page::new(vec![], 0, 1, 10);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next());
    }

    #[test]
    fn test_unknown_sort_field_falls_back() {
        let fields = [("email", "email")];
        let query = PageRequest::default()
            .sort("password", SortOrder::Asc)
            .to_find_query(Filter::All, &fields);
        assert_eq!(query.sort, vec![(DEFAULT_SORT_FIELD.to_string(), SortOrder::Asc)]);

        let query = PageRequest::default()
            .sort("email", SortOrder::Asc)
            .to_find_query(Filter::All, &fields);
        assert_eq!(query.sort[0].0, "email");
    }

    #[test]
    fn test_page_request_deserializes_with_defaults() {
        let request: PageRequest =
            serde_json::from_str(r#"{"page": 2, "limit": 5, "sort_by": null, "sort_order": "asc"}"#).unwrap();
        assert_eq!(request.sort_order, SortOrder::Asc);
        assert!(request.filters.is_empty());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("isVerified", "TRUE").unwrap());
        assert!(!parse_flag("isVerified", "0").unwrap());
        assert!(matches!(parse_flag("isVerified", "maybe"), Err(OrmError::Validation(_))));
    }
}
