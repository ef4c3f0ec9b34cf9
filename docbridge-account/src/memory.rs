//! [`UserRepository`] over a [`SyncMap`]. Lookups are predicate scans in id order.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

use docbridge_core::error::{DocumentStoreError, DocumentStoreResult};
use docbridge_memory::SyncMap;

use crate::{
    repo::{Fault, UserRepository, in_request_order, require},
    user::{User, UserId},
};

#[derive(Debug, Default)]
pub struct UserMemoryRepository {
    data: SyncMap<UserId, User>,
    fault: Fault,
}

impl UserMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository seeded with `users`. Later users win on clashing ids.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        Self::with_map(SyncMap::with_entries(users.into_iter().map(|user| (user.id.clone(), user))))
    }

    /// A repository over an existing map, which stays shared with the caller.
    pub fn with_map(data: SyncMap<UserId, User>) -> Self {
        UserMemoryRepository { data, fault: Fault::default() }
    }

    /// Makes every subsequent call fail with a copy of `error`, or clears the fault.
    pub async fn set_fault(&self, error: Option<DocumentStoreError>) {
        self.fault.set(error).await;
    }

    async fn find(&self, predicate: impl Fn(&User) -> bool) -> DocumentStoreResult<User> {
        self.data.find(predicate).await.ok_or_else(|| {
            debug!("no user matched");
            DocumentStoreError::NotFound
        })
    }
}

#[async_trait]
impl UserRepository for UserMemoryRepository {
    async fn find_by_ids(&self, ids: &[UserId]) -> DocumentStoreResult<Vec<User>> {
        self.fault.check().await?;

        let wanted = ids.iter().collect::<HashSet<_>>();
        let users = self.data.find_all(|user| wanted.contains(&user.id)).await;

        Ok(in_request_order(ids, users))
    }

    async fn find_by_id(&self, id: &UserId) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("id", id.as_str())?;

        self.data.load(id).await.ok_or(DocumentStoreError::NotFound)
    }

    async fn find_by_sub(&self, sub: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("sub", sub)?;

        self.find(|user| user.contains_auth(sub)).await
    }

    async fn find_by_email(&self, email: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("email", email)?;

        self.find(|user| user.email == email).await
    }

    async fn find_by_name(&self, name: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("name", name)?;

        self.find(|user| user.name == name).await
    }

    async fn find_by_name_or_email(&self, name_or_email: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("name or email", name_or_email)?;

        self.find(|user| user.name == name_or_email || user.email == name_or_email).await
    }

    async fn find_by_verification(&self, code: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("verification code", code)?;

        self.find(|user| user.has_verification_code(code)).await
    }

    async fn find_by_password_reset_request(&self, token: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("password reset token", token)?;

        self.find(|user| user.has_password_reset_token(token)).await
    }

    async fn find_by_sub_or_create(&self, user: User, sub: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("sub", sub)?;

        let (user, created) = self
            .data
            .find_or_insert(|existing| existing.contains_auth(sub), || (user.id.clone(), user))
            .await;
        if created {
            debug!(user = %user.id, "created user for unknown sub");
        }

        Ok(user)
    }

    async fn create(&self, user: User) -> DocumentStoreResult<()> {
        self.fault.check().await?;

        let id = user.id.clone();
        self.data
            .insert_new(id.clone(), user)
            .await
            .map_err(|_| DocumentStoreError::Duplicate(format!("user {id} already exists")))
    }

    async fn save(&self, user: User) -> DocumentStoreResult<()> {
        self.fault.check().await?;

        self.data.store(user.id.clone(), user).await;
        Ok(())
    }

    async fn remove(&self, id: &UserId) -> DocumentStoreResult<()> {
        self.fault.check().await?;

        self.data.delete(id).await;
        Ok(())
    }
}
