//! User accounts on top of docbridge.
//!
//! [`UserRepository`] is the capability contract; [`UserStoreRepository`] implements it over
//! any [`StoreBackend`](docbridge_core::backend::StoreBackend) and [`UserMemoryRepository`]
//! over a plain concurrent map. Both report failures through the same
//! [`DocumentStoreError`](docbridge_core::error::DocumentStoreError) taxonomy.
//!
//! # Example
//!
//! ```ignore
//! use docbridge::account::{Auth, User, UserRepository, UserStoreRepository};
//! use docbridge::memory::InMemoryStore;
//!
//! let users = UserStoreRepository::new(InMemoryStore::default());
//! let user = User::new("ann", "ann@example.com").with_auth(Auth::from_sub("auth0|123"));
//!
//! let user = users.find_by_sub_or_create(user, "auth0|123").await?;
//! ```

pub mod memory;
pub mod repo;
pub mod store;
pub mod user;

pub use memory::UserMemoryRepository;
pub use repo::UserRepository;
pub use store::UserStoreRepository;
pub use user::{Auth, PasswordReset, User, UserId, Verification};
