//! Main document store interface.
//!
//! A [`DocumentStore`] owns one backend and hands out [`Collection`] views borrowing it.
//!
//! # Example
//!
//! ```ignore
//! use docbridge::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! let users = store.collection_for::<User>();
//! users.save_one(user.id(), user.to_document()?).await?;
//! ```

use tracing::info;

use crate::{
    backend::StoreBackend,
    collection::Collection,
    document::Document,
    error::DocumentStoreResult,
};

/// A document store bound to a specific backend implementation.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets the collection named `name`.
    pub fn collection(&self, name: &str) -> Collection<&B> {
        Collection::new(name, &self.backend)
    }

    /// Gets the collection that stores documents of type `D`.
    ///
    /// The name comes from [`Document::collection_name`].
    pub fn collection_for<D: Document>(&self) -> Collection<&B> {
        self.collection(D::collection_name())
    }

    /// Drops the collection named `name` with all its documents.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        info!("shutting down document store");
        self.backend.shutdown().await
    }
}
