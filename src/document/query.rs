//! Query filters and options understood by document engines.

use super::{Datum, SortOrder};

/// Document predicate.
///
/// Equality on an array field matches when any element is equal, so
/// `Filter::eq("author_keys", key)` is a membership test.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq(String, Datum),
    In(String, Vec<Datum>),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: &str, value: impl Into<Datum>) -> Self {
        Filter::Eq(path.to_string(), value.into())
    }

    pub fn any_of(path: &str, values: Vec<Datum>) -> Self {
        Filter::In(path.to_string(), values)
    }

    pub fn matches(&self, doc: &Datum) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, value) => doc.matches(path, value),
            Filter::In(path, values) => values.iter().any(|v| doc.matches(path, v)),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }

    /// Equality/membership terms an index on their path could answer.
    pub(crate) fn indexable_terms(&self) -> Vec<(&str, Vec<&Datum>)> {
        match self {
            Filter::Eq(path, value) => vec![(path.as_str(), vec![value])],
            Filter::In(path, values) => vec![(path.as_str(), values.iter().collect())],
            Filter::And(filters) => filters.iter().flat_map(Filter::indexable_terms).collect(),
            Filter::All => Vec::new(),
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub path: String,
    pub order: SortOrder,
}

/// Options of a `find`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn sorted(path: &str, order: SortOrder) -> Self {
        Self {
            sort: Some(Sort {
                path: path.to_string(),
                order,
            }),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// How an engine answered (or would answer) a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Candidates came from the named index.
    IndexScan(String),
    /// Every document was examined.
    CollectionScan,
}

/// Outcome of a single-document write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    pub matched: u64,
    pub modified: u64,
    pub upserted: bool,
}
