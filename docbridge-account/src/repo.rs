//! The repository contract for [`User`] aggregates.
//!
//! Two backends implement it: [`UserStoreRepository`](crate::store::UserStoreRepository) on
//! top of a document [`Collection`](docbridge_core::collection::Collection), and
//! [`UserMemoryRepository`](crate::memory::UserMemoryRepository) on top of a
//! [`SyncMap`](docbridge_memory::SyncMap). Both follow the same rules:
//!
//! - Single-result lookups fail with [`DocumentStoreError::NotFound`] when nothing matches,
//!   and return the match with the lowest id when several do.
//! - An empty required string fails with [`DocumentStoreError::InvalidParams`].
//! - Once a fault is injected with `set_fault`, every call fails with a copy of it.

use async_trait::async_trait;
use mea::rwlock::RwLock;
use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use docbridge_core::error::{DocumentStoreError, DocumentStoreResult};

use crate::user::{User, UserId};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Returns the users whose ids are in `ids`, in request order. Unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[UserId]) -> DocumentStoreResult<Vec<User>>;

    async fn find_by_id(&self, id: &UserId) -> DocumentStoreResult<User>;

    /// Finds the user bound to the external identity `sub`.
    async fn find_by_sub(&self, sub: &str) -> DocumentStoreResult<User>;

    async fn find_by_email(&self, email: &str) -> DocumentStoreResult<User>;

    async fn find_by_name(&self, name: &str) -> DocumentStoreResult<User>;

    /// Matches `name_or_email` against either field.
    async fn find_by_name_or_email(&self, name_or_email: &str) -> DocumentStoreResult<User>;

    async fn find_by_verification(&self, code: &str) -> DocumentStoreResult<User>;

    async fn find_by_password_reset_request(&self, token: &str) -> DocumentStoreResult<User>;

    /// Returns the user bound to `sub`, or stores and returns `user` when there is none.
    async fn find_by_sub_or_create(&self, user: User, sub: &str) -> DocumentStoreResult<User>;

    /// Stores a new user.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Duplicate`] when the id is already taken.
    async fn create(&self, user: User) -> DocumentStoreResult<()>;

    /// Stores `user`, overwriting any user with the same id.
    async fn save(&self, user: User) -> DocumentStoreResult<()>;

    /// Removes a user. Removing an unknown id succeeds.
    async fn remove(&self, id: &UserId) -> DocumentStoreResult<()>;
}

/// An injectable failure shared by every call on a repository.
pub(crate) struct Fault {
    error: RwLock<Option<DocumentStoreError>>,
}

impl Default for Fault {
    fn default() -> Self {
        Fault { error: RwLock::new(None) }
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault").finish_non_exhaustive()
    }
}

impl Fault {
    pub async fn set(&self, error: Option<DocumentStoreError>) {
        *self.error.write().await = error;
    }

    pub async fn check(&self) -> DocumentStoreResult<()> {
        match self.error.read().await.as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

pub(crate) fn require(name: &str, value: &str) -> DocumentStoreResult<()> {
    if value.is_empty() {
        return Err(DocumentStoreError::InvalidParams(format!("{name} must not be empty")));
    }
    Ok(())
}

/// Orders `users` by the position of their id in `ids`. Repeated ids yield one user.
pub(crate) fn in_request_order(ids: &[UserId], users: Vec<User>) -> Vec<User> {
    let mut by_id = users
        .into_iter()
        .map(|user| (user.id.clone(), user))
        .collect::<HashMap<_, _>>();

    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(*id))
        .filter_map(|id| by_id.remove(id))
        .collect()
}
