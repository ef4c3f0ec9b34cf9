//! In-memory storage implementation of [`StoreBackend`].
//!
//! Documents are kept as raw BSON in ordered maps keyed by their `id` field, behind
//! async-aware read-write locks. Filters are evaluated directly by the
//! [`DocumentEvaluator`](crate::evaluator::DocumentEvaluator).

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream;
use mea::rwlock::RwLock;
use tracing::trace;

use docbridge_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder},
    bulk::WriteModel,
    document::ID_KEY,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{ArrayFilter, Expr, FindOptions, SortDirection},
};

use crate::evaluator::{DocumentEvaluator, compare_values, lookup, split_path};

type CollectionMap = BTreeMap<String, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones share
/// the same data. Unsorted scans return documents in ascending `id` order, and single-match
/// operations pick the matching document with the lowest `id`.
///
/// Queries scan the whole collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use docbridge_memory::InMemoryStore;
/// use docbridge::collection::Collection;
///
/// let users = Collection::new("users", InMemoryStore::new());
/// users.save_one("u1", doc! { "id": "u1", "name": "Alice" }).await?;
/// assert_eq!(users.count(&Filter::all()).await?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (document id -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

/// Upper bound on array positions reachable through a numeric `$set` path. A 16 MiB BSON
/// document cannot hold more elements than this.
const MAX_ARRAY_LEN: usize = 16 * 1024 * 1024 / 4;

/// Storage key of a document: its string `id`, or a fresh UUID when it has none.
fn key_of(document: &Document) -> String {
    match document.get(ID_KEY) {
        Some(Bson::String(id)) => id.clone(),
        _ => uuid::Uuid::new_v4().to_string(),
    }
}

fn insert_new(collection: &mut CollectionMap, document: Document) -> DocumentStoreResult<()> {
    let key = key_of(&document);

    if collection.contains_key(&key) {
        return Err(DocumentStoreError::Duplicate(format!("document {key} already exists")));
    }

    trace!(id = %key, "inserting document");
    collection.insert(key, document);
    Ok(())
}

fn matches(document: &Document, filter: &Expr) -> DocumentStoreResult<bool> {
    DocumentEvaluator::new(document).evaluate(filter)
}

fn matching_keys(collection: &CollectionMap, filter: &Expr, limit: Option<usize>) -> DocumentStoreResult<Vec<String>> {
    let mut keys = Vec::new();

    for (key, document) in collection {
        if limit.is_some_and(|limit| keys.len() >= limit) {
            break;
        }
        if matches(document, filter)? {
            keys.push(key.clone());
        }
    }

    Ok(keys)
}

fn select(collection: Option<&CollectionMap>, filter: &Expr, options: &FindOptions) -> DocumentStoreResult<Vec<Document>> {
    let Some(collection) = collection else {
        return Ok(Vec::new());
    };

    let mut documents = Vec::new();
    for document in collection.values() {
        if matches(document, filter)? {
            documents.push(document.clone());
        }
    }

    if let Some(sort) = &options.sort {
        let path = split_path(&sort.field);
        let mut keyed = documents
            .into_iter()
            .map(|document| {
                let mut found = Vec::new();
                lookup(&document, &path, &mut found);
                (found.first().map(|value| (*value).clone()), document)
            })
            .collect::<Vec<_>>();

        // Stable: ties keep ascending id order in both directions.
        keyed.sort_by(|(left, _), (right, _)| {
            let ordering = compare_values(left.as_ref(), right.as_ref());
            match sort.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        documents = keyed.into_iter().map(|(_, document)| document).collect();
    }

    let skip = options.skip.unwrap_or(0) as usize;
    let limit = match options.limit {
        Some(0) | None => usize::MAX,
        Some(limit) => limit as usize,
    };

    Ok(documents.into_iter().skip(skip).take(limit).collect())
}

/// Applies `$set` semantics: every key of `set` is a dotted path assigned its value.
///
/// Path segments may be array indices, `$[]` for every element, or `$[identifier]` for the
/// elements matching the array filter with that identifier.
pub(crate) fn apply_set(document: &mut Document, set: &Document, array_filters: &[ArrayFilter]) -> DocumentStoreResult<()> {
    for (path, value) in set {
        if path == ID_KEY && document.get(ID_KEY).is_some_and(|current| current != value) {
            return Err(DocumentStoreError::InvalidParams(format!("the `{ID_KEY}` field is immutable")));
        }

        let segments = path.split('.').collect::<Vec<_>>();
        set_in_document(document, &segments, value, array_filters)?;
    }

    Ok(())
}

fn set_in_document(
    document: &mut Document,
    path: &[&str],
    value: &Bson,
    array_filters: &[ArrayFilter],
) -> DocumentStoreResult<()> {
    let Some((head, rest)) = path.split_first() else {
        return Err(DocumentStoreError::InvalidParams("empty update path".into()));
    };

    if rest.is_empty() {
        document.insert(*head, value.clone());
        return Ok(());
    }

    if !document.contains_key(*head) {
        document.insert(*head, Document::new());
    }

    match document.get_mut(*head) {
        Some(child) => set_in_value(child, rest, value, array_filters),
        None => Err(DocumentStoreError::internal_msg(format!("lost field `{head}` during update"))),
    }
}

fn set_in_value(
    target: &mut Bson,
    path: &[&str],
    value: &Bson,
    array_filters: &[ArrayFilter],
) -> DocumentStoreResult<()> {
    let items = match target {
        Bson::Document(document) => return set_in_document(document, path, value, array_filters),
        Bson::Array(items) => items,
        other => {
            return Err(DocumentStoreError::InvalidParams(format!(
                "cannot create field `{}` in element of type {:?}",
                path.join("."),
                other.element_type(),
            )));
        }
    };

    let Some((head, rest)) = path.split_first() else {
        return Err(DocumentStoreError::InvalidParams("empty update path".into()));
    };

    let indices = match *head {
        "$[]" => (0..items.len()).collect::<Vec<_>>(),
        segment if segment.starts_with("$[") && segment.ends_with(']') => {
            let identifier = &segment[2..segment.len() - 1];
            let array_filter = array_filters
                .iter()
                .find(|array_filter| array_filter.identifier == identifier)
                .ok_or_else(|| {
                    DocumentStoreError::InvalidParams(format!("no array filter found for identifier `{identifier}`"))
                })?;

            let mut indices = Vec::new();
            for (index, item) in items.iter().enumerate() {
                if DocumentEvaluator::for_value(item).evaluate(&array_filter.filter)? {
                    indices.push(index);
                }
            }
            indices
        }
        segment => {
            let index = segment
                .parse::<usize>()
                .ok()
                .filter(|index| *index < MAX_ARRAY_LEN)
                .ok_or_else(|| {
                    DocumentStoreError::InvalidParams(format!("cannot address array with `{segment}`"))
                })?;
            if index >= items.len() {
                items.resize(index + 1, Bson::Null);
            }
            vec![index]
        }
    };

    for index in indices {
        if rest.is_empty() {
            items[index] = value.clone();
        } else {
            set_in_value(&mut items[index], rest, value, array_filters)?;
        }
    }

    Ok(())
}

fn replace_one(
    collection: &mut CollectionMap,
    filter: &Expr,
    replacement: Document,
    upsert: bool,
) -> DocumentStoreResult<()> {
    match matching_keys(collection, filter, Some(1))?.pop() {
        Some(key) => {
            let previous = collection.remove(&key);
            insert_new(collection, replacement).inspect_err(|_| {
                if let Some(previous) = previous {
                    collection.insert(key, previous);
                }
            })
        }
        None if upsert => insert_new(collection, replacement),
        None => Ok(()),
    }
}

fn update_one(collection: &mut CollectionMap, filter: &Expr, set: &Document, upsert: bool) -> DocumentStoreResult<()> {
    match matching_keys(collection, filter, Some(1))?.pop() {
        Some(key) => update_keys(collection, vec![key], set, &[]),
        None if upsert => {
            let mut seeded = filter.equality_fields();
            apply_set(&mut seeded, set, &[])?;
            insert_new(collection, seeded)
        }
        None => Ok(()),
    }
}

fn update_many(
    collection: &mut CollectionMap,
    filter: &Expr,
    set: &Document,
    array_filters: &[ArrayFilter],
) -> DocumentStoreResult<()> {
    let keys = matching_keys(collection, filter, None)?;
    update_keys(collection, keys, set, array_filters)
}

fn update_keys(
    collection: &mut CollectionMap,
    keys: Vec<String>,
    set: &Document,
    array_filters: &[ArrayFilter],
) -> DocumentStoreResult<()> {
    for key in keys {
        if let Some(document) = collection.get_mut(&key) {
            // Apply to a copy so a failing path leaves the stored document untouched.
            let mut updated = document.clone();
            apply_set(&mut updated, set, array_filters)?;

            trace!(id = %key, "updating document");
            *document = updated;
        }
    }

    Ok(())
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find(&self, collection: &str, filter: &Expr, options: FindOptions) -> DocumentStoreResult<DocumentStream> {
        let documents = {
            let store = self.store.read().await;
            select(store.get(collection), filter, &options)?
        };

        Ok(Box::pin(stream::iter(documents.into_iter().map(Ok))))
    }

    async fn find_one(&self, collection: &str, filter: &Expr, options: FindOptions) -> DocumentStoreResult<Option<Document>> {
        let options = FindOptions { limit: Some(1), ..options };
        let store = self.store.read().await;

        Ok(select(store.get(collection), filter, &options)?.into_iter().next())
    }

    async fn count(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(documents) => Ok(matching_keys(documents, filter, None)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let keys = matching_keys(documents, filter, None)?;
        for key in &keys {
            trace!(id = %key, "deleting document");
            documents.remove(key);
        }

        Ok(keys.len() as u64)
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        match matching_keys(documents, filter, Some(1))?.pop() {
            Some(key) => {
                trace!(id = %key, "deleting document");
                documents.remove(&key);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Expr,
        replacement: Document,
        upsert: bool,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        replace_one(store.entry(collection.to_string()).or_default(), filter, replacement, upsert)
    }

    async fn update_one(&self, collection: &str, filter: &Expr, set: Document, upsert: bool) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        update_one(store.entry(collection.to_string()).or_default(), filter, &set, upsert)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Expr,
        set: Document,
        array_filters: Vec<ArrayFilter>,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        update_many(store.entry(collection.to_string()).or_default(), filter, &set, &array_filters)
    }

    async fn bulk_write(&self, collection: &str, models: Vec<WriteModel>) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();

        trace!(collection, models = models.len(), "applying bulk write");
        for model in models {
            match model {
                WriteModel::ReplaceOne { filter, replacement, upsert } => {
                    replace_one(documents, &filter, replacement, upsert)?
                }
                WriteModel::UpdateMany { filter, set, array_filters } => {
                    update_many(documents, &filter, &set, &array_filters)?
                }
            }
        }

        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        self.store.write().await.remove(collection);
        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances, optionally pre-seeded.
///
/// ```ignore
/// let store = InMemoryStore::builder()
///     .with_documents("users", vec![doc! { "id": "u1" }])
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    seed: Vec<(String, Document)>,
}

impl InMemoryStoreBuilder {
    /// Queues `documents` for insertion into `collection` when the store is built.
    pub fn with_documents(mut self, collection: impl Into<String>, documents: impl IntoIterator<Item = Document>) -> Self {
        let collection = collection.into();
        self.seed
            .extend(documents.into_iter().map(|document| (collection.clone(), document)));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds the store. Seed documents with clashing ids yield `Duplicate`.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut map = StoreMap::new();
        for (collection, document) in self.seed {
            insert_new(map.entry(collection).or_default(), document)?;
        }

        Ok(InMemoryStore { store: Arc::new(RwLock::new(map)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docbridge_core::query::Filter;
    use futures::TryStreamExt;

    async fn seeded(documents: Vec<Document>) -> InMemoryStore {
        InMemoryStore::builder()
            .with_documents("things", documents)
            .build()
            .await
            .unwrap()
    }

    async fn all(store: &InMemoryStore, options: FindOptions) -> Vec<Document> {
        store
            .find("things", &Filter::all(), options)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    }

    fn ids(documents: &[Document]) -> Vec<&str> {
        documents
            .iter()
            .map(|document| document.get_str(ID_KEY).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn scans_default_to_ascending_id_order() {
        let store = seeded(vec![doc! { "id": "c" }, doc! { "id": "a" }, doc! { "id": "b" }]).await;
        assert_eq!(ids(&all(&store, FindOptions::default()).await), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn sort_skip_and_limit() {
        let store = seeded(vec![
            doc! { "id": "a", "rank": 3 },
            doc! { "id": "b", "rank": 1 },
            doc! { "id": "c", "rank": 2 },
            doc! { "id": "d" },
        ])
        .await;

        let options = FindOptions::builder()
            .sort("rank", SortDirection::Desc)
            .skip(1)
            .limit(2)
            .build();
        assert_eq!(ids(&all(&store, options).await), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn missing_collections_behave_as_empty() {
        let store = InMemoryStore::new();
        assert_eq!(store.count("nope", &Filter::all()).await.unwrap(), 0);
        assert_eq!(store.delete_many("nope", &Filter::all()).await.unwrap(), 0);
        assert!(store.find_one("nope", &Filter::all(), FindOptions::default()).await.unwrap().is_none());
        store.drop_collection("nope").await.unwrap();
    }

    #[tokio::test]
    async fn delete_one_removes_the_lowest_id_match() {
        let store = seeded(vec![doc! { "id": "b", "k": 1 }, doc! { "id": "a", "k": 1 }]).await;

        assert_eq!(store.delete_one("things", &Filter::eq("k", 1)).await.unwrap(), 1);
        assert_eq!(ids(&all(&store, FindOptions::default()).await), vec!["b"]);
    }

    #[tokio::test]
    async fn replace_upsert_inserts_then_replaces() {
        let store = InMemoryStore::new();
        store.replace_one("things", &Filter::id("a"), doc! { "id": "a", "v": 1 }, true).await.unwrap();
        store.replace_one("things", &Filter::id("a"), doc! { "id": "a", "v": 2 }, true).await.unwrap();

        assert_eq!(all(&store, FindOptions::default()).await, vec![doc! { "id": "a", "v": 2 }]);
    }

    #[tokio::test]
    async fn replace_without_upsert_ignores_misses() {
        let store = InMemoryStore::new();
        store.replace_one("things", &Filter::id("a"), doc! { "id": "a" }, false).await.unwrap();
        assert!(all(&store, FindOptions::default()).await.is_empty());
    }

    #[tokio::test]
    async fn replace_onto_another_id_is_duplicate() {
        let store = seeded(vec![doc! { "id": "a" }, doc! { "id": "b" }]).await;

        let err = store
            .replace_one("things", &Filter::id("a"), doc! { "id": "b" }, false)
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Duplicate(_)));
        assert_eq!(ids(&all(&store, FindOptions::default()).await), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn update_upsert_seeds_from_filter_equalities() {
        let store = InMemoryStore::new();
        store
            .update_one("things", &Filter::id("a").and(Filter::eq("kind", "x")), doc! { "n": 1 }, true)
            .await
            .unwrap();

        assert_eq!(all(&store, FindOptions::default()).await, vec![doc! { "id": "a", "kind": "x", "n": 1 }]);
    }

    #[tokio::test]
    async fn set_creates_nested_paths() {
        let store = seeded(vec![doc! { "id": "a" }]).await;
        store
            .update_one("things", &Filter::id("a"), doc! { "profile.city": "Oslo" }, false)
            .await
            .unwrap();

        assert_eq!(all(&store, FindOptions::default()).await, vec![doc! { "id": "a", "profile": { "city": "Oslo" } }]);
    }

    #[tokio::test]
    async fn array_filters_scope_positional_updates() {
        let store = seeded(vec![doc! {
            "id": "p",
            "tasks": [{ "id": "t1", "done": false }, { "id": "t2", "done": false }],
            "labels": ["a", "b"],
        }])
        .await;

        store
            .update_many(
                "things",
                &Filter::id("p"),
                doc! { "tasks.$[task].done": true, "labels.$[label]": "z" },
                vec![
                    ArrayFilter::new("task", Filter::eq("id", "t2")),
                    ArrayFilter::new("label", Filter::eq("", "a")),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            all(&store, FindOptions::default()).await,
            vec![doc! {
                "id": "p",
                "tasks": [{ "id": "t1", "done": false }, { "id": "t2", "done": true }],
                "labels": ["z", "b"],
            }],
        );
    }

    #[tokio::test]
    async fn unknown_array_filter_identifier_is_invalid() {
        let store = seeded(vec![doc! { "id": "p", "tasks": [{ "id": "t1" }] }]).await;

        let err = store
            .update_many("things", &Filter::id("p"), doc! { "tasks.$[x].done": true }, vec![])
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::InvalidParams(_)));
        assert_eq!(all(&store, FindOptions::default()).await, vec![doc! { "id": "p", "tasks": [{ "id": "t1" }] }]);
    }

    #[tokio::test]
    async fn numeric_paths_pad_arrays_with_nulls() {
        let store = seeded(vec![doc! { "id": "p", "tags": ["a"] }]).await;
        store
            .update_many("things", &Filter::id("p"), doc! { "tags.2": "c" }, vec![])
            .await
            .unwrap();

        assert_eq!(
            all(&store, FindOptions::default()).await,
            vec![doc! { "id": "p", "tags": ["a", null, "c"] }],
        );
    }

    #[tokio::test]
    async fn out_of_range_array_indices_are_invalid() {
        let store = seeded(vec![doc! { "id": "p", "tags": ["a"] }]).await;

        for path in ["tags.18446744073709551615", "tags.100000000", "tags.99999999999999999999999"] {
            let err = store
                .update_many("things", &Filter::id("p"), doc! { path: 1 }, vec![])
                .await
                .unwrap_err();
            assert!(matches!(err, DocumentStoreError::InvalidParams(_)), "{path}: got {err:?}");
        }

        store
            .update_one("things", &Filter::id("p"), doc! { "tags.0": "b" }, false)
            .await
            .unwrap();
        assert_eq!(all(&store, FindOptions::default()).await, vec![doc! { "id": "p", "tags": ["b"] }]);
    }

    #[tokio::test]
    async fn bulk_write_applies_in_order_and_keeps_applied_models() {
        let store = seeded(vec![doc! { "id": "b" }]).await;

        let err = store
            .bulk_write(
                "things",
                vec![
                    WriteModel::ReplaceOne { filter: Filter::id("a"), replacement: doc! { "id": "a" }, upsert: true },
                    WriteModel::ReplaceOne { filter: Filter::id("a"), replacement: doc! { "id": "b" }, upsert: true },
                    WriteModel::ReplaceOne { filter: Filter::id("c"), replacement: doc! { "id": "c" }, upsert: true },
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Duplicate(_)));
        assert_eq!(ids(&all(&store, FindOptions::default()).await), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn seeding_rejects_duplicate_ids() {
        let result = InMemoryStore::builder()
            .with_documents("things", vec![doc! { "id": "a" }, doc! { "id": "a" }])
            .build()
            .await;

        assert!(matches!(result, Err(DocumentStoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::new();
        let clone = store.clone();

        clone.replace_one("things", &Filter::id("a"), doc! { "id": "a" }, true).await.unwrap();
        assert_eq!(store.count("things", &Filter::all()).await.unwrap(), 1);
    }
}
