//! MongoDB backend implementation for docbridge.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait, compiling
//! docbridge filter expressions to MongoDB query documents and classifying driver failures
//! into the docbridge error taxonomy.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docbridge = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Streaming finds** - Results are streamed from a server-side cursor, released on drop
//! - **Ordered bulk writes** - Batches go through the client-level `bulkWrite` command,
//!   which needs MongoDB 8.0 or later
//! - **Array filters** - `$[identifier]` updates with element-relative filters
//! - **Error classification** - Write conflicts and transient transaction errors surface as
//!   `TransactionConflict`
//!
//! # Example
//!
//! ```ignore
//! use docbridge::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_mongodb;

pub mod config;
pub mod error;
pub mod query;
pub mod store;

pub use config::MongoDbConfig;
pub use error::MongoDriverError;
pub use store::{MongoDbStore, MongoDbStoreBuilder};
