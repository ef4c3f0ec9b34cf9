//! Convenient re-exports of commonly used types from docbridge.
//!
//! ```ignore
//! use docbridge::prelude::*;
//! ```
//!
//! This provides access to:
//! - Document traits
//! - Store backends and builders
//! - Filters and find options
//! - Collections, consumers and pagination
//! - Error types

pub use docbridge_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    bulk::{BulkWriter, WriteModel},
    collection::{Collection, get_cursor},
    consumer::{Consumer, SliceConsumer, SliceFuncConsumer},
    document::{Document, DocumentExt, ID_KEY},
    error::{ClassifyError, DocumentStoreError, DocumentStoreResult},
    pagination::{Cursor, CursorPagination, OffsetPagination, PageInfo, Pagination},
    query::{ArrayFilter, Expr, FieldOp, Filter, FindOptions, QueryVisitor, Sort, SortDirection, Update},
    store::DocumentStore,
};
