//! Pagination descriptors and page metadata.
//!
//! Two pagination styles are supported:
//!
//! - [`CursorPagination`]: Relay-style windows. `first` + `after` scans forward from a
//!   position, `last` + `before` scans backward.
//!   ref: <https://relay.dev/graphql/connections.htm>
//! - [`OffsetPagination`]: plain skip/take.
//!
//! A request carries at most one of them, expressed as `Option<Pagination>`. The enum makes
//! "both populated" unrepresentable, and `Clone` on it is a deep, independent copy.
//!
//! Cursors are the `id` field of a document; see
//! [`get_cursor`](crate::collection::get_cursor).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token naming a document by its identifier.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Cursor(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        Cursor(value)
    }
}

impl From<&str> for Cursor {
    fn from(value: &str) -> Self {
        Cursor(value.to_string())
    }
}

/// Relay-style cursor pagination.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorPagination {
    pub before: Option<Cursor>,
    pub after: Option<Cursor>,
    pub first: Option<i64>,
    pub last: Option<i64>,
}

impl CursorPagination {
    /// A forward window of `first` items after `after`.
    pub fn forward(first: i64, after: Option<Cursor>) -> Self {
        CursorPagination { first: Some(first), after, ..Default::default() }
    }

    /// A backward window of `last` items before `before`.
    pub fn backward(last: i64, before: Option<Cursor>) -> Self {
        CursorPagination { last: Some(last), before, ..Default::default() }
    }

    pub fn wrap(self) -> Pagination {
        Pagination::Cursor(self)
    }
}

/// Offset pagination.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OffsetPagination {
    pub offset: i64,
    pub limit: i64,
}

impl OffsetPagination {
    pub fn new(offset: i64, limit: i64) -> Self {
        OffsetPagination { offset, limit }
    }

    pub fn wrap(self) -> Pagination {
        Pagination::Offset(self)
    }
}

/// Exactly one pagination descriptor. "No pagination" is `Option::<Pagination>::None`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Pagination {
    Cursor(CursorPagination),
    Offset(OffsetPagination),
}

impl Pagination {
    pub fn cursor(&self) -> Option<&CursorPagination> {
        match self {
            Pagination::Cursor(cursor) => Some(cursor),
            Pagination::Offset(_) => None,
        }
    }

    pub fn offset(&self) -> Option<&OffsetPagination> {
        match self {
            Pagination::Offset(offset) => Some(offset),
            Pagination::Cursor(_) => None,
        }
    }

    pub fn cursor_mut(&mut self) -> Option<&mut CursorPagination> {
        match self {
            Pagination::Cursor(cursor) => Some(cursor),
            Pagination::Offset(_) => None,
        }
    }

    pub fn offset_mut(&mut self) -> Option<&mut OffsetPagination> {
        match self {
            Pagination::Offset(offset) => Some(offset),
            Pagination::Cursor(_) => None,
        }
    }
}

impl From<CursorPagination> for Pagination {
    fn from(value: CursorPagination) -> Self {
        value.wrap()
    }
}

impl From<OffsetPagination> for Pagination {
    fn from(value: OffsetPagination) -> Self {
        value.wrap()
    }
}

/// Metadata describing one window of a paginated scan.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// Number of documents matching the filter, ignoring the window.
    pub total_count: u64,
    /// Cursor of the first document in the window.
    pub start_cursor: Option<Cursor>,
    /// Cursor of the last document in the window.
    pub end_cursor: Option<Cursor>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PageInfo {
    pub fn builder(total_count: u64) -> PageInfoBuilder {
        PageInfoBuilder::new(total_count)
    }
}

/// Builder for [`PageInfo`].
pub struct PageInfoBuilder {
    info: PageInfo,
}

impl PageInfoBuilder {
    pub fn new(total_count: u64) -> Self {
        Self { info: PageInfo { total_count, ..Default::default() } }
    }

    pub fn with_cursors(mut self, start: Option<Cursor>, end: Option<Cursor>) -> Self {
        self.info.start_cursor = start;
        self.info.end_cursor = end;
        self
    }

    pub fn with_next_page(mut self, has_next_page: bool) -> Self {
        self.info.has_next_page = has_next_page;
        self
    }

    pub fn with_previous_page(mut self, has_previous_page: bool) -> Self {
        self.info.has_previous_page = has_previous_page;
        self
    }

    pub fn build(self) -> PageInfo {
        self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_cursor() -> impl Strategy<Value = Option<Cursor>> {
        proptest::option::of("[a-z0-9]{1,12}".prop_map(Cursor::new))
    }

    fn arb_pagination() -> impl Strategy<Value = Pagination> {
        prop_oneof![
            (arb_cursor(), arb_cursor(), any::<Option<i64>>(), any::<Option<i64>>()).prop_map(
                |(before, after, first, last)| CursorPagination { before, after, first, last }.wrap()
            ),
            (any::<i64>(), any::<i64>()).prop_map(|(offset, limit)| OffsetPagination::new(offset, limit).wrap()),
        ]
    }

    #[test]
    fn wrap_selects_the_variant() {
        let cursor = CursorPagination::forward(10, Some("a".into())).wrap();
        assert!(cursor.cursor().is_some());
        assert!(cursor.offset().is_none());

        let offset = OffsetPagination::new(5, 10).wrap();
        assert_eq!(offset.offset(), Some(&OffsetPagination { offset: 5, limit: 10 }));
        assert!(offset.cursor().is_none());
    }

    #[test]
    fn clone_of_none_is_none() {
        let none: Option<Pagination> = None;
        assert_eq!(none.clone(), None);
    }

    proptest! {
        #[test]
        fn mutating_a_clone_leaves_the_source_untouched(source in arb_pagination()) {
            let snapshot = source.clone();
            let mut clone = source.clone();

            if let Some(cursor) = clone.cursor_mut() {
                cursor.first = Some(cursor.first.unwrap_or(0).wrapping_add(1));
                cursor.after = Some(Cursor::new("mutated"));
                cursor.before = None;
            }
            if let Some(offset) = clone.offset_mut() {
                offset.offset = offset.offset.wrapping_add(1);
                offset.limit = offset.limit.wrapping_sub(1);
            }

            prop_assert_eq!(&source, &snapshot);
            prop_assert_ne!(&clone, &source);
        }

        #[test]
        fn mutating_the_source_leaves_a_clone_untouched(mut source in arb_pagination()) {
            let clone = source.clone();

            match &mut source {
                Pagination::Cursor(cursor) => cursor.last = Some(cursor.last.unwrap_or(0).wrapping_add(1)),
                Pagination::Offset(offset) => offset.limit = offset.limit.wrapping_add(1),
            }

            prop_assert_ne!(&clone, &source);
        }
    }

    #[test]
    fn page_info_builder_sets_fields() {
        let info = PageInfo::builder(42)
            .with_cursors(Some("a".into()), Some("c".into()))
            .with_next_page(true)
            .build();

        assert_eq!(info.total_count, 42);
        assert_eq!(info.start_cursor, Some(Cursor::new("a")));
        assert_eq!(info.end_cursor, Some(Cursor::new("c")));
        assert!(info.has_next_page);
        assert!(!info.has_previous_page);
    }
}
