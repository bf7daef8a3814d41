//! Query model: which subset, in what order, in what page.

use std::borrow::{Borrow, Cow};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::selector::LabelSelector;

/// Well-known field names.
pub mod field {
    pub const NAME: &str = "name";
    pub const NAMES: &str = "names";
    pub const UID: &str = "uid";
    pub const NAMESPACE: &str = "namespace";
    pub const LABEL: &str = "label";
    pub const ANNOTATION: &str = "annotation";
    pub const STATUS: &str = "status";
    pub const OWNER_REFERENCE: &str = "ownerReference";
    pub const OWNER_KIND: &str = "ownerKind";
    pub const TYPE: &str = "type";

    pub const CREATION_TIMESTAMP: &str = "creationTimestamp";
    pub const CREATE_TIME: &str = "createTime";
    pub const LAST_UPDATE_TIMESTAMP: &str = "lastUpdateTimestamp";
    pub const UPDATE_TIME: &str = "updateTime";

    pub const SORTABLE_FIELDS: &[&str] = &[NAME, CREATION_TIMESTAMP, CREATE_TIME, LAST_UPDATE_TIMESTAMP, UPDATE_TIME];

    /// Base filterable fields. Resource kinds extend this set when they register.
    pub const COMPARABLE_FIELDS: &[&str] =
        &[NAME, NAMES, UID, LABEL, ANNOTATION, NAMESPACE, STATUS, OWNER_REFERENCE, OWNER_KIND];
}

/// Query-string parameter names recognized at the HTTP boundary.
pub mod param {
    pub const PAGE: &str = "page";
    pub const LIMIT: &str = "limit";
    pub const SORT_BY: &str = "sortBy";
    pub const ASCENDING: &str = "ascending";
    pub const LABEL_SELECTOR: &str = "labelSelector";
    pub const FIELD_SELECTOR: &str = "fieldSelector";

    pub const RESERVED: &[&str] = &[PAGE, LIMIT, SORT_BY, ASCENDING, LABEL_SELECTOR, FIELD_SELECTOR];
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Field(Cow<'static, str>);

impl Field {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Field {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Self(Cow::Owned(s.to_string()))
    }
}

impl From<String> for Field {
    fn from(s: String) -> Self {
        Self(Cow::Owned(s))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value(String);

impl Value {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single `field = value` predicate; its meaning depends on the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: Field,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<Field>, value: impl Into<Value>) -> Self {
        Self { field: field.into(), value: value.into() }
    }
}

/// Page window. `page_index` is a zero-based page number, not a record offset:
/// the window starts at `limit * page_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub limit: i64,
    pub page_index: i64,
}

impl Pagination {
    /// Sentinel: return everything.
    pub const NONE: Pagination = Pagination { limit: -1, page_index: 0 };

    pub fn new(limit: i64, page_index: i64) -> Self {
        Self { limit, page_index }
    }

    /// `[start, end)` of the page within a collection of `total` items.
    /// Out-of-range pages yield an empty window.
    pub fn valid_range(&self, total: usize) -> (usize, usize) {
        if self.limit == Self::NONE.limit {
            return (0, total);
        }
        if self.limit < 0 || self.page_index < 0 || total == 0 {
            return (0, 0);
        }
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        let page = usize::try_from(self.page_index).unwrap_or(usize::MAX);
        let start = limit.saturating_mul(page);
        if start >= total {
            return (0, 0);
        }
        (start, start.saturating_add(limit).min(total))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::NONE
    }
}

/// Field names a query may filter on, and the ones it may sort by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    comparable: BTreeSet<Field>,
    sortable: BTreeSet<Field>,
}

impl FieldSet {
    pub fn contains(&self, name: &str) -> bool {
        self.comparable.contains(name)
    }

    pub fn insert(&mut self, field: impl Into<Field>) -> bool {
        self.comparable.insert(field.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.comparable.iter()
    }

    pub fn is_sortable(&self, name: &str) -> bool {
        self.sortable.contains(name)
    }

    pub fn insert_sortable(&mut self, field: impl Into<Field>) -> bool {
        self.sortable.insert(field.into())
    }
}

impl Default for FieldSet {
    fn default() -> Self {
        Self {
            comparable: field::COMPARABLE_FIELDS.iter().map(|f| Field::from_static(*f)).collect(),
            sortable: field::SORTABLE_FIELDS.iter().map(|f| Field::from_static(*f)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// `None` is read as [`Pagination::NONE`].
    pub pagination: Option<Pagination>,
    pub sort_by: Field,
    /// Default is descending: newest/greatest first.
    pub ascending: bool,
    /// Conjunctive filters, one value per field.
    pub filters: BTreeMap<Field, Value>,
    pub label_selector: Option<LabelSelector>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            pagination: Some(Pagination::NONE),
            sort_by: Field::from_static(field::CREATION_TIMESTAMP),
            ascending: false,
            filters: BTreeMap::new(),
            label_selector: None,
        }
    }

    pub fn with_filter(mut self, field: impl Into<Field>, value: impl Into<Value>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn with_sort(mut self, sort_by: impl Into<Field>, ascending: bool) -> Self {
        self.sort_by = sort_by.into();
        self.ascending = ascending;
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_label_selector(mut self, selector: LabelSelector) -> Self {
        self.label_selector = Some(selector);
        self
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination.unwrap_or(Pagination::NONE)
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn filter_value(&self, name: &str) -> Option<&Value> {
        self.filters.get(name)
    }

    pub fn to_filters(&self) -> Vec<Filter> {
        self.filters.iter().map(|(f, v)| Filter { field: f.clone(), value: v.clone() }).collect()
    }

    /// Build a query from raw request parameters.
    ///
    /// Parsing is permissive: malformed values fall back to their defaults and
    /// unknown parameters are ignored. Everything that was defaulted or ignored
    /// is reported in [`ParsedQuery::diagnostics`]. When a key repeats, the
    /// first occurrence wins.
    pub fn parse<I, K, V>(params: I, fields: &FieldSet) -> ParsedQuery
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut raw: BTreeMap<String, String> = BTreeMap::new();
        for (k, v) in params {
            raw.entry(k.as_ref().to_string()).or_insert_with(|| v.as_ref().to_string());
        }

        let mut diagnostics = Vec::new();
        let mut diag = |param: &str, raw: &str, reason: DiagnosticReason| {
            diagnostics.push(ParamDiagnostic { param: param.to_string(), raw: raw.to_string(), reason });
        };

        let mut query = Query::new();

        let limit = match raw.get(param::LIMIT) {
            Some(s) => s.trim().parse::<i64>().unwrap_or_else(|_| {
                diag(param::LIMIT, s, DiagnosticReason::InvalidInteger);
                -1
            }),
            None => -1,
        };
        let page = match raw.get(param::PAGE) {
            Some(s) => s.trim().parse::<i64>().unwrap_or_else(|_| {
                diag(param::PAGE, s, DiagnosticReason::InvalidInteger);
                1
            }),
            None => 1,
        };
        query.pagination = Some(Pagination::new(limit, page.saturating_sub(1)));

        if let Some(s) = raw.get(param::SORT_BY).filter(|s| !s.is_empty()) {
            // Kept even when unknown; comparators fall back to creation time.
            if !fields.is_sortable(s) {
                diag(param::SORT_BY, s, DiagnosticReason::UnsortableField);
            }
            query.sort_by = Field::from(s.as_str());
        }

        if let Some(s) = raw.get(param::ASCENDING) {
            query.ascending = parse_bool(s).unwrap_or_else(|| {
                diag(param::ASCENDING, s, DiagnosticReason::InvalidBool);
                false
            });
        }

        if let Some(s) = raw.get(param::LABEL_SELECTOR).filter(|s| !s.trim().is_empty()) {
            match s.parse::<LabelSelector>() {
                Ok(sel) => query.label_selector = Some(sel),
                Err(_) => diag(param::LABEL_SELECTOR, s, DiagnosticReason::InvalidSelector),
            }
        }

        for (key, value) in raw.iter() {
            if param::RESERVED.contains(&key.as_str()) {
                continue;
            }
            if !fields.contains(key) {
                diag(key, value, DiagnosticReason::Unrecognized);
                continue;
            }
            if value.is_empty() {
                continue;
            }
            query.filters.insert(Field::from(key.as_str()), Value::from(value.as_str()));
        }

        ParsedQuery { query, diagnostics }
    }
}

/// Boolean spellings accepted by the platform's HTTP layer.
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticReason {
    InvalidInteger,
    InvalidBool,
    InvalidSelector,
    UnsortableField,
    Unrecognized,
}

impl fmt::Display for DiagnosticReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticReason::InvalidInteger => "not an integer",
            DiagnosticReason::InvalidBool => "not a boolean",
            DiagnosticReason::InvalidSelector => "not a label selector",
            DiagnosticReason::UnsortableField => "not a sortable field",
            DiagnosticReason::Unrecognized => "unrecognized parameter",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDiagnostic {
    pub param: String,
    pub raw: String,
    pub reason: DiagnosticReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub query: Query,
    pub diagnostics: Vec<ParamDiagnostic>,
}

impl ParsedQuery {
    /// Opt-in strictness: any ignored or defaulted parameter is an error.
    pub fn strict(self) -> Result<Query, QueryError> {
        match self.diagnostics.into_iter().next() {
            None => Ok(self.query),
            Some(d) => Err(QueryError::InvalidParameter { param: d.param, raw: d.raw, reason: d.reason }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid query parameter {param}={raw:?}: {reason}")]
    InvalidParameter { param: String, raw: String, reason: DiagnosticReason },
}
