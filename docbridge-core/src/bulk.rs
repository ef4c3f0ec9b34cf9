//! Ordered batches of write operations.
//!
//! A [`BulkWriter`] accumulates [`WriteModel`]s against one collection and submits them as
//! a single ordered batch. Batches are ordered but not atomic: the backend applies models
//! one at a time and stops at the first failure, keeping whatever was already applied.

use bson::Document;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    collection::Collection,
    error::DocumentStoreResult,
    query::{ArrayFilter, Expr, Filter},
};

/// One operation inside a bulk batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    /// Replace the first document matching `filter`, inserting when `upsert` is set.
    ReplaceOne {
        filter: Expr,
        replacement: Document,
        upsert: bool,
    },
    /// `$set` the fields of `set` on every document matching `filter`.
    UpdateMany {
        filter: Expr,
        set: Document,
        array_filters: Vec<ArrayFilter>,
    },
}

impl WriteModel {
    pub fn filter(&self) -> &Expr {
        match self {
            WriteModel::ReplaceOne { filter, .. } => filter,
            WriteModel::UpdateMany { filter, .. } => filter,
        }
    }
}

/// Builds and submits one ordered batch against a collection.
///
/// ```ignore
/// collection
///     .bulk()
///     .upsert("a", doc! { "id": "a", "n": 1 })
///     .update_many(Filter::eq("kind", "draft"), doc! { "kind": "final" }, vec![])
///     .submit()
///     .await?;
/// ```
#[derive(Debug)]
pub struct BulkWriter<'a, B: StoreBackend> {
    collection: &'a Collection<B>,
    models: Vec<WriteModel>,
}

impl<'a, B: StoreBackend> BulkWriter<'a, B> {
    pub(crate) fn new(collection: &'a Collection<B>) -> Self {
        Self { collection, models: Vec::new() }
    }

    pub(crate) fn with_capacity(collection: &'a Collection<B>, capacity: usize) -> Self {
        Self { collection, models: Vec::with_capacity(capacity) }
    }

    /// Appends a replace model.
    pub fn replace_one(mut self, filter: Expr, replacement: Document, upsert: bool) -> Self {
        self.push_replace_one(filter, replacement, upsert);
        self
    }

    /// Appends an upsert-replace keyed by identifier.
    pub fn upsert(self, id: impl Into<String>, replacement: Document) -> Self {
        self.replace_one(Filter::id(id), replacement, true)
    }

    /// Appends a mass-update model.
    pub fn update_many(mut self, filter: Expr, set: Document, array_filters: Vec<ArrayFilter>) -> Self {
        self.push_update_many(filter, set, array_filters);
        self
    }

    pub(crate) fn push_replace_one(&mut self, filter: Expr, replacement: Document, upsert: bool) {
        self.models
            .push(WriteModel::ReplaceOne { filter, replacement, upsert });
    }

    pub(crate) fn push_update_many(&mut self, filter: Expr, set: Document, array_filters: Vec<ArrayFilter>) {
        self.models
            .push(WriteModel::UpdateMany { filter, set, array_filters });
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn models(&self) -> &[WriteModel] {
        &self.models
    }

    /// Submits the batch. An empty batch is a no-op.
    pub async fn submit(self) -> DocumentStoreResult<()> {
        if self.models.is_empty() {
            return Ok(());
        }

        debug!(collection = %self.collection.name(), models = self.models.len(), "submitting bulk write");

        self.collection
            .backend()
            .bulk_write(self.collection.name(), self.models)
            .await
    }
}
