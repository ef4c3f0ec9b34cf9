//! A thin access layer over schema-less document stores.
//!
//! This crate is the core of the docbridge project and provides:
//!
//! - **Store backend abstraction** ([`backend`]) - The primitives a physical store must offer
//! - **Query and filtering API** ([`query`]) - Backend-neutral filters, sorts and updates
//! - **Collections interface** ([`collection`]) - Streaming queries, writes and pagination
//! - **Bulk writes** ([`bulk`]) - Ordered batches of replace and update models
//! - **Consumers** ([`consumer`]) - The streaming sink protocol for query results
//! - **Pagination** ([`pagination`]) - Cursor and offset descriptors plus page metadata
//! - **Document traits** ([`document`]) - Typed documents and their BSON representation
//! - **Document store** ([`store`]) - Owns a backend and hands out collections
//! - **Error handling** ([`error`]) - The error taxonomy and driver error classification
//!
//! # Example
//!
//! ```ignore
//! use docbridge::prelude::*;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Ticket {
//!     pub id: String,
//!     pub title: String,
//! }
//!
//! impl Document for Ticket {
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//!
//!     fn collection_name() -> &'static str {
//!         "tickets"
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_core;

pub mod backend;
pub mod bulk;
pub mod collection;
pub mod consumer;
pub mod document;
pub mod error;
pub mod pagination;
pub mod query;
pub mod store;
