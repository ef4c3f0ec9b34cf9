use std::{collections::HashSet, fmt, sync::Arc, time::Duration};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use bson::{Bson, Document, doc};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel, Namespace,
    options::{
        ClientOptions, FindOneOptions, FindOptions as MongoFindOptions, IndexOptions, ReplaceOneModel,
        UpdateManyModel, WriteModel as MongoWriteModel,
    },
};
use mea::rwlock::RwLock;
use tracing::{debug, info};

use docbridge_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder},
    bulk::WriteModel,
    document::ID_KEY,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{ArrayFilter, Expr, FindOptions},
};

use crate::{config::MongoDbConfig, error::classify, query::MongoQueryTranslator};

/// MongoDB implementation of [`StoreBackend`].
///
/// Every collection lives in one database. Documents are stored as-is, so the `id` field is
/// an ordinary indexed-by-choice field next to MongoDB's own `_id`, which is stripped from
/// results. Each collection gets a unique index on `id` before its first write, so a
/// second document with an existing `id` fails as `Duplicate`.
#[derive(Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    indexed: Arc<RwLock<HashSet<String>>>,
}

impl fmt::Debug for MongoDbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoDbStore")
            .field("client", &self.client)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl MongoDbStore {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
            indexed: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub fn builder(uri: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(uri, database)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    /// Creates the unique `id` index of `collection` unless this store already did.
    pub async fn ensure_indexes(&self, collection: &str) -> DocumentStoreResult<()> {
        if self.indexed.read().await.contains(collection) {
            return Ok(());
        }

        let mut indexed = self.indexed.write().await;
        if indexed.contains(collection) {
            return Ok(());
        }

        self.get_collection(collection)
            .create_index(id_index())
            .await
            .map_err(classify)?;
        debug!(collection, "created unique id index");

        indexed.insert(collection.to_string());
        Ok(())
    }
}

fn id_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { ID_KEY: 1 })
        .options(
            IndexOptions::builder()
                .name("id_unique".to_string())
                .unique(true)
                .build(),
        )
        .build()
}

fn find_options(options: FindOptions) -> DocumentStoreResult<MongoFindOptions> {
    let mut mongo_options = MongoFindOptions::default();

    mongo_options.sort = options.sort.as_ref().map(MongoQueryTranslator::translate_sort);
    mongo_options.skip = options.skip;
    mongo_options.allow_disk_use = options.allow_disk_use;
    mongo_options.projection = Some(doc! { "_id": 0 });
    if let Some(limit) = options.limit {
        mongo_options.limit = Some(
            i64::try_from(limit)
                .map_err(|_| DocumentStoreError::InvalidParams(format!("limit {limit} is out of range")))?,
        );
    }

    Ok(mongo_options)
}

fn find_one_options(options: FindOptions) -> FindOneOptions {
    let mut mongo_options = FindOneOptions::default();

    mongo_options.sort = options.sort.as_ref().map(MongoQueryTranslator::translate_sort);
    mongo_options.skip = options.skip;
    mongo_options.projection = Some(doc! { "_id": 0 });

    mongo_options
}

fn set_update(set: Document) -> Document {
    doc! { "$set": set }
}

/// Converts a docbridge write model into a client-level bulk write model on `namespace`.
fn to_write_model(namespace: &Namespace, model: WriteModel) -> DocumentStoreResult<MongoWriteModel> {
    Ok(match model {
        WriteModel::ReplaceOne { filter, replacement, upsert } => MongoWriteModel::ReplaceOne(
            ReplaceOneModel::builder()
                .namespace(namespace.clone())
                .filter(MongoQueryTranslator::translate(&filter)?)
                .replacement(replacement)
                .upsert(upsert)
                .build(),
        ),
        WriteModel::UpdateMany { filter, set, array_filters } if array_filters.is_empty() => {
            MongoWriteModel::UpdateMany(
                UpdateManyModel::builder()
                    .namespace(namespace.clone())
                    .filter(MongoQueryTranslator::translate(&filter)?)
                    .update(set_update(set))
                    .build(),
            )
        }
        WriteModel::UpdateMany { filter, set, array_filters } => MongoWriteModel::UpdateMany(
            UpdateManyModel::builder()
                .namespace(namespace.clone())
                .filter(MongoQueryTranslator::translate(&filter)?)
                .update(set_update(set))
                .array_filters(
                    MongoQueryTranslator::translate_array_filters(&array_filters)?
                        .into_iter()
                        .map(Bson::Document)
                        .collect::<Vec<_>>(),
                )
                .build(),
        ),
    })
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find(&self, collection: &str, filter: &Expr, options: FindOptions) -> DocumentStoreResult<DocumentStream> {
        let cursor = self
            .get_collection(collection)
            .find(MongoQueryTranslator::translate(filter)?)
            .with_options(find_options(options)?)
            .await
            .map_err(classify)?;

        Ok(cursor.map_err(classify).boxed())
    }

    async fn find_one(&self, collection: &str, filter: &Expr, options: FindOptions) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(MongoQueryTranslator::translate(filter)?)
            .with_options(find_one_options(options))
            .await
            .map_err(classify)
    }

    async fn count(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::translate(filter)?)
            .await
            .map_err(classify)
    }

    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(MongoQueryTranslator::translate(filter)?)
                .await
                .map_err(classify)?
                .deleted_count
        )
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_one(MongoQueryTranslator::translate(filter)?)
                .await
                .map_err(classify)?
                .deleted_count
        )
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Expr,
        replacement: Document,
        upsert: bool,
    ) -> DocumentStoreResult<()> {
        self.ensure_indexes(collection).await?;
        self.get_collection(collection)
            .replace_one(MongoQueryTranslator::translate(filter)?, replacement)
            .upsert(upsert)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn update_one(&self, collection: &str, filter: &Expr, set: Document, upsert: bool) -> DocumentStoreResult<()> {
        self.ensure_indexes(collection).await?;
        self.get_collection(collection)
            .update_one(MongoQueryTranslator::translate(filter)?, set_update(set))
            .upsert(upsert)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Expr,
        set: Document,
        array_filters: Vec<ArrayFilter>,
    ) -> DocumentStoreResult<()> {
        self.ensure_indexes(collection).await?;
        let coll = self.get_collection(collection);
        let mut update = coll.update_many(MongoQueryTranslator::translate(filter)?, set_update(set));

        if !array_filters.is_empty() {
            update = update.array_filters(MongoQueryTranslator::translate_array_filters(&array_filters)?);
        }

        update.await.map_err(classify)?;

        Ok(())
    }

    async fn bulk_write(&self, collection: &str, models: Vec<WriteModel>) -> DocumentStoreResult<()> {
        self.ensure_indexes(collection).await?;
        let namespace = self.get_collection(collection).namespace();

        let models = models
            .into_iter()
            .map(|model| to_write_model(&namespace, model))
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        debug!(collection, models = models.len(), "submitting ordered bulk write");

        self.client
            .bulk_write(models)
            .ordered(true)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .drop()
            .await
            .map_err(classify)?;
        self.indexed.write().await.remove(collection);

        Ok(())
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        info!(database = %self.database, "shutting down MongoDB client");
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// Builder for [`MongoDbStore`].
///
/// ```ignore
/// let store = MongoDbStore::builder("mongodb://localhost:27017", "accounts")
///     .connect_timeout(Duration::from_secs(5))
///     .app_name("accounts-api")
///     .build()
///     .await?;
/// ```
pub struct MongoDbStoreBuilder {
    config: MongoDbConfig,
}

impl MongoDbStoreBuilder {
    pub fn new(uri: &str, database: &str) -> Self {
        Self { config: MongoDbConfig::new(uri, database) }
    }

    pub fn from_config(config: MongoDbConfig) -> Self {
        Self { config }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_secs = timeout.as_secs();
        self
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.config.app_name = Some(app_name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.config.uri)
            .await
            .map_err(classify)?;

        options.connect_timeout = Some(self.config.connect_timeout());
        options.app_name = self.config.app_name.clone();

        let client = Client::with_options(options).map_err(classify)?;
        info!(database = %self.config.database, "created MongoDB client");

        Ok(MongoDbStore::new(client, self.config.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_core::query::{Filter, SortDirection};

    #[test]
    fn find_options_map_onto_driver_options() {
        let options = find_options(
            FindOptions::builder()
                .sort("id", SortDirection::Asc)
                .skip(5)
                .limit(10)
                .allow_disk_use(true)
                .build(),
        )
        .unwrap();

        assert_eq!(options.sort, Some(doc! { "id": 1 }));
        assert_eq!(options.skip, Some(5));
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.allow_disk_use, Some(true));
        assert_eq!(options.projection, Some(doc! { "_id": 0 }));
    }

    #[test]
    fn id_index_is_unique() {
        let index = id_index();
        assert_eq!(index.keys, doc! { "id": 1 });

        let options = index.options.unwrap();
        assert_eq!(options.unique, Some(true));
        assert_eq!(options.name.as_deref(), Some("id_unique"));
    }

    #[tokio::test]
    async fn array_filters_become_bulk_model_arrays() {
        let client = Client::with_options(ClientOptions::default()).unwrap();
        let namespace = MongoDbStore::new(client, "db").get_collection("boards").namespace();

        let model = to_write_model(
            &namespace,
            WriteModel::UpdateMany {
                filter: Filter::id("b1"),
                set: doc! { "cards.$[card].open": false },
                array_filters: vec![ArrayFilter::new("card", Filter::eq("id", "c2"))],
            },
        )
        .unwrap();

        let MongoWriteModel::UpdateMany(model) = model else {
            panic!("expected an update-many model");
        };
        assert_eq!(model.namespace, namespace);
        assert_eq!(model.filter, doc! { "id": { "$eq": "b1" } });
        assert_eq!(
            model.array_filters,
            Some(vec![Bson::Document(doc! { "card.id": { "$eq": "c2" } })]),
        );
    }

    #[tokio::test]
    async fn plain_updates_carry_no_array_filters() {
        let client = Client::with_options(ClientOptions::default()).unwrap();
        let namespace = MongoDbStore::new(client, "db").get_collection("boards").namespace();

        let model = to_write_model(
            &namespace,
            WriteModel::UpdateMany { filter: Filter::all(), set: doc! { "open": true }, array_filters: vec![] },
        )
        .unwrap();

        let MongoWriteModel::UpdateMany(model) = model else {
            panic!("expected an update-many model");
        };
        assert_eq!(model.array_filters, None);
    }

    #[test]
    fn oversized_limits_are_rejected() {
        let err = find_options(FindOptions::builder().limit(u64::MAX).build()).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn malformed_uris_fail_as_internal_errors() {
        let err = MongoDbStore::builder("not-a-mongodb-uri", "db")
            .build()
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Internal(_)));
    }
}
