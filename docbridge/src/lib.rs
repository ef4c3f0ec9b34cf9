//! Main docbridge crate providing a unified interface to document stores.
//!
//! This crate is the primary entry point for users of docbridge. It re-exports the core
//! types from the sub-crates and gives access to the storage backends and the account
//! repositories built on them.
//!
//! # Features
//!
//! - **Streaming reads** - Results are pushed through a [`Consumer`](consumer::Consumer),
//!   one document at a time, with an explicit end-of-stream signal
//! - **Pagination** - Relay-style cursor windows and offset windows over `id` order
//! - **Batched writes** - Ordered bulk upserts and array-filtered bulk updates
//! - **One error taxonomy** - Every backend reports the same
//!   [`DocumentStoreError`](error::DocumentStoreError) variants
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Project {
//!     pub id: String,
//!     pub name: String,
//! }
//!
//! impl Document for Project {
//!     fn id(&self) -> &str { &self.id }
//!     fn collection_name() -> &'static str { "projects" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let projects = store.collection_for::<Project>();
//!
//!     let project = Project { id: "p1".into(), name: "Atlas".into() };
//!     projects.save_one(project.id(), project.to_document()?).await?;
//!
//!     let mut page = SliceConsumer::<Project>::new();
//!     let info = projects
//!         .paginate(&Filter::all(), Some(&CursorPagination::forward(10, None).wrap()), &mut page)
//!         .await?;
//!
//!     println!("{} of {} projects", page.items().len(), info.total_count);
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docbridge_core::{backend, bulk, collection, consumer, document, error, pagination, query, store};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docbridge_memory::{InMemoryStore, InMemoryStoreBuilder, SyncMap};
}

/// User accounts and their repositories.
pub mod account {
    pub use docbridge_account::{
        Auth, PasswordReset, User, UserId, UserMemoryRepository, UserRepository, UserStoreRepository,
        Verification,
    };
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docbridge_mongodb::{MongoDbConfig, MongoDbStore, MongoDbStoreBuilder, MongoDriverError};
}
