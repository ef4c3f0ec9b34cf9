//! [`UserRepository`] over a document [`Collection`]. Lookups compile to filter expressions.

use async_trait::async_trait;
use bson::Bson;
use tracing::debug;

use docbridge_core::{
    backend::StoreBackend,
    collection::Collection,
    consumer::SliceConsumer,
    document::{Document, DocumentExt, ID_KEY},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Filter, FindOptions, SortDirection},
    store::DocumentStore,
};

use crate::{
    repo::{Fault, UserRepository, in_request_order, require},
    user::{User, UserId},
};

#[derive(Debug)]
pub struct UserStoreRepository<B: StoreBackend> {
    collection: Collection<B>,
    fault: Fault,
}

impl<B: StoreBackend> UserStoreRepository<B> {
    /// A repository over the `users` collection of `backend`.
    pub fn new(backend: B) -> Self {
        Self::with_collection(Collection::new(User::collection_name(), backend))
    }

    pub fn with_collection(collection: Collection<B>) -> Self {
        UserStoreRepository { collection, fault: Fault::default() }
    }

    pub fn collection(&self) -> &Collection<B> {
        &self.collection
    }

    /// Makes every subsequent call fail with a copy of `error`, or clears the fault.
    pub async fn set_fault(&self, error: Option<DocumentStoreError>) {
        self.fault.set(error).await;
    }

    async fn find_one(&self, filter: Expr) -> DocumentStoreResult<User> {
        let mut users = SliceConsumer::<User>::new();
        self.collection
            .find_one(&filter, &mut users, lowest_id_first())
            .await?;

        users.into_first()
    }

    async fn exists(&self, id: &UserId) -> DocumentStoreResult<bool> {
        Ok(self.collection.count(&Filter::id(id.as_str())).await? > 0)
    }
}

impl<'a, B: StoreBackend> UserStoreRepository<&'a B> {
    pub fn from_store(store: &'a DocumentStore<B>) -> Self {
        Self::with_collection(store.collection_for::<User>())
    }
}

fn lowest_id_first() -> FindOptions {
    FindOptions::builder()
        .sort(ID_KEY, SortDirection::Asc)
        .build()
}

#[async_trait]
impl<B: StoreBackend> UserRepository for UserStoreRepository<B> {
    async fn find_by_ids(&self, ids: &[UserId]) -> DocumentStoreResult<Vec<User>> {
        self.fault.check().await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let wanted = ids
            .iter()
            .map(|id| Bson::String(id.to_string()))
            .collect::<Vec<_>>();

        let mut users = SliceConsumer::<User>::new();
        self.collection
            .find(&Filter::any_of(ID_KEY, wanted), &mut users, FindOptions::default())
            .await?;

        Ok(in_request_order(ids, users.into_items()))
    }

    async fn find_by_id(&self, id: &UserId) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("id", id.as_str())?;

        self.find_one(Filter::id(id.as_str())).await
    }

    async fn find_by_sub(&self, sub: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("sub", sub)?;

        self.find_one(Filter::eq("auths.sub", sub)).await
    }

    async fn find_by_email(&self, email: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("email", email)?;

        self.find_one(Filter::eq("email", email)).await
    }

    async fn find_by_name(&self, name: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("name", name)?;

        self.find_one(Filter::eq("name", name)).await
    }

    async fn find_by_name_or_email(&self, name_or_email: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("name or email", name_or_email)?;

        self.find_one(Filter::eq("name", name_or_email).or(Filter::eq("email", name_or_email)))
            .await
    }

    async fn find_by_verification(&self, code: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("verification code", code)?;

        self.find_one(Filter::eq("verification.code", code)).await
    }

    async fn find_by_password_reset_request(&self, token: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("password reset token", token)?;

        self.find_one(Filter::eq("password_reset.token", token)).await
    }

    async fn find_by_sub_or_create(&self, user: User, sub: &str) -> DocumentStoreResult<User> {
        self.fault.check().await?;
        require("sub", sub)?;

        match self.find_one(Filter::eq("auths.sub", sub)).await {
            Err(DocumentStoreError::NotFound) => {
                debug!(user = %user.id, "creating user for unknown sub");
                self.collection
                    .save_one(user.id.as_str(), user.to_document()?)
                    .await?;
                Ok(user)
            }
            found => found,
        }
    }

    async fn create(&self, user: User) -> DocumentStoreResult<()> {
        self.fault.check().await?;

        if self.exists(&user.id).await? {
            return Err(DocumentStoreError::Duplicate(format!("user {} already exists", user.id)));
        }

        self.collection
            .save_one(user.id.as_str(), user.to_document()?)
            .await
    }

    async fn save(&self, user: User) -> DocumentStoreResult<()> {
        self.fault.check().await?;

        self.collection
            .save_one(user.id.as_str(), user.to_document()?)
            .await
    }

    async fn remove(&self, id: &UserId) -> DocumentStoreResult<()> {
        self.fault.check().await?;

        match self.collection.remove_one(&Filter::id(id.as_str())).await {
            Err(DocumentStoreError::NotFound) => Ok(()),
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_memory::InMemoryStore;

    #[tokio::test]
    async fn users_land_in_the_users_collection() {
        let store = DocumentStore::new(InMemoryStore::default());
        let repo = UserStoreRepository::from_store(&store);

        repo.save(User::new("ann", "ann@x").with_id("a")).await.unwrap();

        let raw = store.collection("users");
        assert_eq!(raw.count(&Filter::all()).await.unwrap(), 1);
        assert_eq!(repo.collection().name(), "users");
    }

    #[tokio::test]
    async fn undecodable_documents_surface_as_internal_errors() {
        let repo = UserStoreRepository::new(InMemoryStore::default());
        repo.collection()
            .save_one("broken", bson::doc! { "id": "broken", "name": 42 })
            .await
            .unwrap();

        let err = repo.find_by_id(&UserId::from("broken")).await.unwrap_err();
        assert!(matches!(err, DocumentStoreError::Internal(_)));
    }
}
