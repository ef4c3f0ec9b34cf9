//! In-memory document storage backend for docbridge.
//!
//! This crate provides:
//!
//! - [`InMemoryStore`] - a thread-safe implementation of the `StoreBackend` trait that
//!   evaluates filters directly, with sorting, skip/limit, upserts and array-filtered updates
//! - [`SyncMap`] - a concurrent ordered map that in-memory repositories build on
//!
//! Both use async-aware read-write locks and are meant for development, tests and small
//! deployments.
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::{collection::Collection, memory::InMemoryStore, query::Filter};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = Collection::new("users", InMemoryStore::new());
//!
//!     users.save_one("u1", doc! { "id": "u1", "name": "Alice" }).await?;
//!     assert_eq!(users.count(&Filter::eq("name", "Alice")).await?, 1);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_memory;

pub mod evaluator;
pub mod store;
pub mod sync_map;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
pub use sync_map::SyncMap;
