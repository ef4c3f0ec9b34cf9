//! Storage backend abstraction: the seam to the document-store driver.
//!
//! The [`StoreBackend`] trait is the full list of primitives a [`Collection`](crate::collection::Collection)
//! needs from a physical store: a streaming find, find-one, count, deletes, replace and
//! update (with or without upsert), and ordered bulk writes. Implementations classify their
//! native failures into [`DocumentStoreError`](crate::error::DocumentStoreError) before
//! returning; nothing above this trait sees driver-specific errors.
//!
//! # Implementations
//!
//! - `docbridge_memory::InMemoryStore` - in-process maps, evaluates filters directly
//! - `docbridge_mongodb::MongoDbStore` - MongoDB via the official driver
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync`. Concurrency control is the backend's business;
//! callers never lock around it.

use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;
use std::{fmt::Debug, sync::Arc};

use crate::{
    bulk::WriteModel,
    error::DocumentStoreResult,
    query::{ArrayFilter, Expr, FindOptions},
};

/// A server-side iteration over query results.
///
/// Dropping the stream releases the underlying cursor, so every exit path that drops it,
/// including cancellation of the owning future, cleans up.
pub type DocumentStream = BoxStream<'static, DocumentStoreResult<Document>>;

/// Abstract interface for document storage backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Opens a streaming query over the documents matching `filter`.
    async fn find(
        &self,
        collection: &str,
        filter: &Expr,
        options: FindOptions,
    ) -> DocumentStoreResult<DocumentStream>;

    /// Returns the first document matching `filter` under `options`, if any.
    async fn find_one(
        &self,
        collection: &str,
        filter: &Expr,
        options: FindOptions,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Counts the documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64>;

    /// Deletes every match and returns how many documents were removed.
    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64>;

    /// Deletes at most one match and returns how many documents were removed.
    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64>;

    /// Replaces the first match with `replacement`, inserting it when `upsert` is set and
    /// nothing matched.
    async fn replace_one(
        &self,
        collection: &str,
        filter: &Expr,
        replacement: Document,
        upsert: bool,
    ) -> DocumentStoreResult<()>;

    /// Applies `$set: set` to the first match, inserting when `upsert` is set and nothing
    /// matched.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Expr,
        set: Document,
        upsert: bool,
    ) -> DocumentStoreResult<()>;

    /// Applies `$set: set` to every match, scoped by `array_filters`.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Expr,
        set: Document,
        array_filters: Vec<ArrayFilter>,
    ) -> DocumentStoreResult<()>;

    /// Submits an ordered batch of write models.
    ///
    /// Models are applied in order and execution stops at the first failure. The batch is
    /// not atomic: models applied before a failure stay applied.
    async fn bulk_write(&self, collection: &str, models: Vec<WriteModel>) -> DocumentStoreResult<()>;

    /// Drops a collection and all its documents. Dropping a missing collection succeeds.
    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()>;

    /// Releases connections and other resources held by the backend.
    async fn shutdown(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn find(
        &self,
        collection: &str,
        filter: &Expr,
        options: FindOptions,
    ) -> DocumentStoreResult<DocumentStream> {
        (**self).find(collection, filter, options).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Expr,
        options: FindOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        (**self).find_one(collection, filter, options).await
    }

    async fn count(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        (**self).count(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        (**self).delete_many(collection, filter).await
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        (**self).delete_one(collection, filter).await
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Expr,
        replacement: Document,
        upsert: bool,
    ) -> DocumentStoreResult<()> {
        (**self)
            .replace_one(collection, filter, replacement, upsert)
            .await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Expr,
        set: Document,
        upsert: bool,
    ) -> DocumentStoreResult<()> {
        (**self)
            .update_one(collection, filter, set, upsert)
            .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Expr,
        set: Document,
        array_filters: Vec<ArrayFilter>,
    ) -> DocumentStoreResult<()> {
        (**self)
            .update_many(collection, filter, set, array_filters)
            .await
    }

    async fn bulk_write(&self, collection: &str, models: Vec<WriteModel>) -> DocumentStoreResult<()> {
        (**self).bulk_write(collection, models).await
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        (**self).drop_collection(collection).await
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        (**self).shutdown().await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn find(
        &self,
        collection: &str,
        filter: &Expr,
        options: FindOptions,
    ) -> DocumentStoreResult<DocumentStream> {
        (**self).find(collection, filter, options).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Expr,
        options: FindOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        (**self).find_one(collection, filter, options).await
    }

    async fn count(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        (**self).count(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        (**self).delete_many(collection, filter).await
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        (**self).delete_one(collection, filter).await
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Expr,
        replacement: Document,
        upsert: bool,
    ) -> DocumentStoreResult<()> {
        (**self)
            .replace_one(collection, filter, replacement, upsert)
            .await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Expr,
        set: Document,
        upsert: bool,
    ) -> DocumentStoreResult<()> {
        (**self)
            .update_one(collection, filter, set, upsert)
            .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Expr,
        set: Document,
        array_filters: Vec<ArrayFilter>,
    ) -> DocumentStoreResult<()> {
        (**self)
            .update_many(collection, filter, set, array_filters)
            .await
    }

    async fn bulk_write(&self, collection: &str, models: Vec<WriteModel>) -> DocumentStoreResult<()> {
        (**self).bulk_write(collection, models).await
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        (**self).drop_collection(collection).await
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        (**self).shutdown().await
    }
}

/// Factory trait for creating backend instances from configuration.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
