//! Store-agnostic query model
//!
//! Filters are plain data so every backend can either evaluate them in
//! process ([`Filter::matches`]) or translate them to its own query
//! language.

use std::cmp::Ordering;

use serde_json::Value as JsonValue;

use super::core::Document;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" | "1" => Ok(SortOrder::Asc),
            "desc" | "descending" | "-1" => Ok(SortOrder::Desc),
            other => Err(format!("Invalid sort order: {}", other)),
        }
    }
}

/// Document filter
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches everything
    #[default]
    All,
    /// Field equals value. `Null` also matches an absent field.
    Eq(String, JsonValue),
    /// Field differs from value
    Ne(String, JsonValue),
    /// Field equals one of the values
    In(String, Vec<JsonValue>),
    Gt(String, JsonValue),
    Gte(String, JsonValue),
    Lt(String, JsonValue),
    Lte(String, JsonValue),
    /// Case-insensitive substring match on a string field
    Contains(String, String),
    /// Field presence
    Exists(String, bool),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::Ne(field.into(), value.into())
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Filter::Contains(field.into(), needle.into())
    }

    pub fn exists(field: impl Into<String>, present: bool) -> Self {
        Filter::Exists(field.into(), present)
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Filter::eq(super::core::ID_FIELD, id.into())
    }

    /// Conjunction that collapses trivial cases
    pub fn all_of(filters: Vec<Filter>) -> Self {
        let mut filters: Vec<Filter> = filters
            .into_iter()
            .filter(|f| !matches!(f, Filter::All))
            .collect();
        match filters.len() {
            0 => Filter::All,
            1 => filters.remove(0),
            _ => Filter::And(filters),
        }
    }

    /// Disjunction. An empty list matches nothing.
    pub fn any_of(filters: Vec<Filter>) -> Self {
        if filters.len() == 1 {
            return filters.into_iter().next().unwrap_or_default();
        }
        Filter::Or(filters)
    }

    /// Evaluate this filter against a document
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => match lookup(document, field) {
                Some(found) => values_equal(found, value),
                None => value.is_null(),
            },
            Filter::Ne(field, value) => !Filter::Eq(field.clone(), value.clone()).matches(document),
            Filter::In(field, values) => lookup(document, field)
                .map(|found| values.iter().any(|v| values_equal(found, v)))
                .unwrap_or(false),
            Filter::Gt(field, value) => compare_field(document, field, value) == Some(Ordering::Greater),
            Filter::Gte(field, value) => matches!(
                compare_field(document, field, value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(field, value) => compare_field(document, field, value) == Some(Ordering::Less),
            Filter::Lte(field, value) => matches!(
                compare_field(document, field, value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Filter::Contains(field, needle) => lookup(document, field)
                .and_then(JsonValue::as_str)
                .map(|s| s.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Filter::Exists(field, present) => {
                let found = lookup(document, field).map(|v| !v.is_null()).unwrap_or(false);
                found == *present
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(document)),
        }
    }
}

/// A find request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Vec<(String, SortOrder)>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn all() -> Self {
        Self::new(Filter::All)
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply sort, skip and limit to already-filtered documents
    pub fn shape(&self, mut documents: Vec<Document>) -> Vec<Document> {
        if !self.sort.is_empty() {
            documents.sort_by(|a, b| {
                for (field, order) in &self.sort {
                    let ordering = compare_values(lookup(a, field), lookup(b, field));
                    let ordering = match order {
                        SortOrder::Asc => ordering,
                        SortOrder::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let iter = documents.into_iter().skip(skip);
        match self.limit {
            Some(limit) => iter.take(usize::try_from(limit).unwrap_or(usize::MAX)).collect(),
            None => iter.collect(),
        }
    }
}

/// Resolve a possibly dotted field path
pub fn lookup<'a>(document: &'a Document, field: &str) -> Option<&'a JsonValue> {
    let mut parts = field.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_field(document: &Document, field: &str, value: &JsonValue) -> Option<Ordering> {
    let found = lookup(document, field)?;
    match (found, value) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (JsonValue::Bool(a), JsonValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn type_rank(value: Option<&JsonValue>) -> u8 {
    match value {
        None | Some(JsonValue::Null) => 0,
        Some(JsonValue::Bool(_)) => 1,
        Some(JsonValue::Number(_)) => 2,
        Some(JsonValue::String(_)) => 3,
        Some(JsonValue::Array(_)) => 4,
        Some(JsonValue::Object(_)) => 5,
    }
}

/// Total order used for sorting: missing/null < bool < number < string < array < object
pub fn compare_values(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (Some(JsonValue::Bool(x)), Some(JsonValue::Bool(y))) => x.cmp(y),
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: JsonValue) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_matching() {
        let d = doc(json!({
            "email": "Ada@Example.com",
            "role": "admin",
            "age": 36,
            "profile": { "city": "London" },
            "deleted": null,
        }));

        assert!(Filter::All.matches(&d));
        assert!(Filter::eq("role", "admin").matches(&d));
        assert!(!Filter::eq("role", "user").matches(&d));
        assert!(Filter::eq("age", 36.0).matches(&d));
        assert!(Filter::contains("email", "example").matches(&d));
        assert!(Filter::eq("profile.city", "London").matches(&d));
        assert!(Filter::Gt("age".into(), json!(30)).matches(&d));
        assert!(!Filter::Lt("age".into(), json!(30)).matches(&d));
        assert!(Filter::eq("missing", JsonValue::Null).matches(&d));
        assert!(Filter::exists("deleted", false).matches(&d));
        assert!(Filter::In("role".into(), vec![json!("user"), json!("admin")]).matches(&d));
        assert!(Filter::any_of(vec![Filter::eq("role", "user"), Filter::eq("age", 36)]).matches(&d));
        assert!(!Filter::any_of(vec![]).matches(&d));
    }

    #[test]
    fn test_all_of_collapses() {
        assert_eq!(Filter::all_of(vec![]), Filter::All);
        assert_eq!(
            Filter::all_of(vec![Filter::All, Filter::eq("a", 1)]),
            Filter::eq("a", 1)
        );
        assert!(matches!(
            Filter::all_of(vec![Filter::eq("a", 1), Filter::eq("b", 2)]),
            Filter::And(_)
        ));
    }

    #[test]
    fn test_query_shaping() {
        let docs = vec![
            doc(json!({"n": 3, "tag": "b"})),
            doc(json!({"n": 1, "tag": "a"})),
            doc(json!({"tag": "c"})),
            doc(json!({"n": 2, "tag": "a"})),
        ];

        let shaped = FindQuery::all().sort_by("n", SortOrder::Asc).shape(docs.clone());
        let tags: Vec<_> = shaped.iter().map(|d| d["tag"].as_str().unwrap()).collect();
        assert_eq!(tags, vec!["c", "a", "a", "b"]);

        let shaped = FindQuery::all()
            .sort_by("tag", SortOrder::Asc)
            .sort_by("n", SortOrder::Desc)
            .skip(1)
            .limit(2)
            .shape(docs);
        let ns: Vec<_> = shaped.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![1, 3]);
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!("-1".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("sideways".parse::<SortOrder>().is_err());
        assert_eq!(SortOrder::default(), SortOrder::Desc);
    }
}
