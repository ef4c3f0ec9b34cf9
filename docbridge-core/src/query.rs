//! Filter expressions, find options and batched updates.
//!
//! Filters are an opaque expression tree ([`Expr`]). Each backend brings its own matcher:
//! the MongoDB driver compiles expressions to query documents, the in-memory driver
//! evaluates them directly. Both implement [`QueryVisitor`].
//!
//! # Filter Expression API
//!
//! The [`Filter`] struct provides static constructors:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - String: `starts_with`, `ends_with`, `contains`, `not_contains`
//! - Existence: `exists`, `not_exists`
//! - Array: `any_of`, `none_of`
//! - Logical: `and`, `or`, `all`
//!
//! Field names may be dotted paths (`"verification.code"`). A path that crosses an array
//! matches when any element matches, following MongoDB semantics.
//!
//! ```ignore
//! use docbridge::query::{Filter, FindOptions, SortDirection};
//!
//! let filter = Filter::eq("name", "Alice").and(Filter::gt("age", 18));
//! let options = FindOptions::builder()
//!     .sort("id", SortDirection::Asc)
//!     .limit(10)
//!     .build();
//! ```

use bson::{Bson, Document};

use crate::{document::ID_KEY, error::DocumentStoreError};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort order for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Equal to (exact match, or array membership when the field is an array).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// String or array contains value.
    Contains,
    /// String or array does not contain value.
    NotContains,
    /// String starts with value.
    StartsWith,
    /// String ends with value.
    EndsWith,
    /// Field equals, or array field contains, any of the values.
    AnyOf,
    /// Field equals, and array field contains, none of the values.
    NoneOf,
}

/// A filter expression for querying documents.
///
/// An empty `And` matches every document; see [`Filter::all`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field name (or dotted path) to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Collects the top-level equality constraints of this expression.
    ///
    /// Upserts use these to seed the inserted document: `id == "a"` yields `{ "id": "a" }`.
    /// Only `Eq` comparisons on plain (undotted) fields reachable through `And` count.
    pub fn equality_fields(&self) -> Document {
        let mut seed = Document::new();
        self.collect_equality_fields(&mut seed);
        seed
    }

    fn collect_equality_fields(&self, seed: &mut Document) {
        match self {
            Expr::And(exprs) => exprs
                .iter()
                .for_each(|expr| expr.collect_equality_fields(seed)),
            Expr::Field { field, op: FieldOp::Eq, value } if !field.contains('.') => {
                seed.insert(field.clone(), value.clone());
            }
            _ => {}
        }
    }
}

/// Helper struct for constructing filter expressions.
///
/// ```ignore
/// use docbridge::query::Filter;
///
/// let expr = Filter::eq("name", "Alice")
///     .and(Filter::gt("age", 18));
/// ```
pub struct Filter;

impl Filter {
    /// Matches every document.
    pub fn all() -> Expr {
        Expr::And(Vec::new())
    }

    /// Matches the document whose identifier equals `id`.
    pub fn id(id: impl Into<String>) -> Expr {
        Filter::eq(ID_KEY, Bson::String(id.into()))
    }

    /// Creates an equality filter expression.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Creates a not-equal filter expression.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// Creates a greater-than filter expression.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// Creates a greater-than-or-equal filter expression.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// Creates a less-than filter expression.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Creates a less-than-or-equal filter expression.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Creates a string prefix filter expression.
    pub fn starts_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::StartsWith, value.into())
    }

    /// Creates a string suffix filter expression.
    pub fn ends_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::EndsWith, value.into())
    }

    /// Creates a contains filter expression.
    pub fn contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Contains, value.into())
    }

    /// Creates a not-contains filter expression.
    pub fn not_contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NotContains, value.into())
    }

    /// Matches documents where the field exists.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field does not exist.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// Creates a logical AND filter expression.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Creates a logical OR filter expression.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches documents where the field equals (or the array field contains) any of the values.
    pub fn any_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, value.into())
    }

    /// Matches documents where the field matches none of the values.
    pub fn none_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, value.into())
    }
}

/// Options for a streaming find.
///
/// `allow_disk_use` left unset means "backend default"; `Collection::find` turns it on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Sort order for results.
    pub sort: Option<Sort>,
    /// Number of documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
    /// Whether the server may spill large sorts to disk.
    pub allow_disk_use: Option<bool>,
}

impl FindOptions {
    /// Creates a new options builder.
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    pub fn new() -> Self {
        FindOptionsBuilder { options: FindOptions::default() }
    }

    /// Sets the sort order.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options.sort = Some(Sort { field: field.into(), direction });
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: u64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn allow_disk_use(mut self, allow: bool) -> Self {
        self.options.allow_disk_use = Some(allow);
        self
    }

    pub fn build(self) -> FindOptions {
        self.options
    }
}

/// Scopes a `$[identifier]` segment of an update path to matching array elements.
///
/// Field names inside `filter` are relative to the array element; the empty field name
/// refers to the element itself, for arrays of scalars.
///
/// ```ignore
/// // Set `done` on every task whose `id` is "t1".
/// Update::new(Filter::id("project-1"), doc! { "tasks.$[task].done": true })
///     .with_array_filter(ArrayFilter::new("task", Filter::eq("id", "t1")));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayFilter {
    /// The identifier used in `$[identifier]` path segments.
    pub identifier: String,
    /// Predicate evaluated against each array element.
    pub filter: Expr,
}

impl ArrayFilter {
    pub fn new(identifier: impl Into<String>, filter: Expr) -> Self {
        ArrayFilter { identifier: identifier.into(), filter }
    }
}

/// One conditional mass-update: `$set` the fields of `update` on every document matching
/// `filter`, optionally scoped to array elements by `array_filters`.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub filter: Expr,
    pub update: Document,
    pub array_filters: Vec<ArrayFilter>,
}

impl Update {
    pub fn new(filter: Expr, update: Document) -> Self {
        Update { filter, update, array_filters: Vec::new() }
    }

    pub fn with_array_filter(mut self, array_filter: ArrayFilter) -> Self {
        self.array_filters.push(array_filter);
        self
    }
}

/// Visitor over [`Expr`] trees, implemented by each backend's matcher.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn and_flattens_into_existing_conjunction() {
        let expr = Filter::eq("a", 1).and(Filter::eq("b", 2)).and(Filter::eq("c", 3));
        assert!(matches!(expr, Expr::And(ref list) if list.len() == 3));
    }

    #[test]
    fn equality_fields_seed_upserts() {
        let expr = Filter::id("u1")
            .and(Filter::eq("name", "ann"))
            .and(Filter::gt("age", 3))
            .and(Filter::eq("profile.city", "Oslo"));
        assert_eq!(expr.equality_fields(), doc! { "id": "u1", "name": "ann" });
        assert_eq!(Filter::or([Filter::id("x")]).equality_fields(), doc! {});
    }

    #[test]
    fn builder_sets_every_option() {
        let options = FindOptions::builder()
            .sort("id", SortDirection::Desc)
            .skip(5)
            .limit(10)
            .allow_disk_use(false)
            .build();

        assert_eq!(options.sort, Some(Sort { field: "id".into(), direction: SortDirection::Desc }));
        assert_eq!(options.skip, Some(5));
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.allow_disk_use, Some(false));
    }
}
