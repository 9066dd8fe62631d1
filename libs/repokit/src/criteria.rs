//! Query-side value types: equality criteria, field/value maps for
//! writes, and ordering.
//!
//! Criteria are deliberately equality-only conjunctions. Anything richer
//! (ranges, disjunctions, pattern matching) belongs to the ORM's own
//! query builder, reachable through
//! [`EntityRepository::select`](crate::EntityRepository::select).

use sea_orm::Value;
use serde::{Deserialize, Serialize};

/// Sort direction for a single ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl From<SortDir> for sea_orm::Order {
    fn from(dir: SortDir) -> Self {
        match dir {
            SortDir::Asc => Self::Asc,
            SortDir::Desc => Self::Desc,
        }
    }
}

/// One ordering key: field name plus direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderKey {
    pub field: String,
    pub dir: SortDir,
}

/// Ordered list of sort keys, applied left to right.
///
/// Field names are resolved against the model's columns at query time;
/// a name that resolves to no column fails the query with
/// [`Error::UnknownField`](crate::Error::UnknownField).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy(pub Vec<OrderKey>);

impl OrderBy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.0.push(OrderKey {
            field: field.into(),
            dir: SortDir::Asc,
        });
        self
    }

    #[must_use]
    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.0.push(OrderKey {
            field: field.into(),
            dir: SortDir::Desc,
        });
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderKey> {
        self.0.iter()
    }
}

/// Equality-only filter conjunction: every entry must match.
///
/// ```
/// use repokit::Criteria;
///
/// let by_status = Criteria::new().eq("status", "active").eq("retries", 0);
/// assert_eq!(by_status.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Criteria(Vec<(String, Value)>);

impl Criteria {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `field = value` condition.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(f, v)| (f.as_str(), v))
    }
}

/// Field/value assignments for `create` and `update`.
///
/// Same shape as [`Criteria`] but with write semantics: each entry is
/// set on the record rather than matched against it.
#[derive(Debug, Clone, Default)]
pub struct Values(Vec<(String, Value)>);

impl Values {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `value` to `field`.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(f, v)| (f.as_str(), v))
    }
}
