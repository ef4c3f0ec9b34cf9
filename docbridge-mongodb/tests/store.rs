//! Runs against a live server when `DOCBRIDGE_MONGODB_URI` is set; skipped otherwise.
//!
//! Each test uses a fresh `test_<uuid>` database that is dropped afterwards. Bulk writes
//! need MongoDB 8.0 or later.

use bson::{Document, doc};
use docbridge_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::Collection,
    error::{DocumentStoreError, DocumentStoreResult},
    pagination::CursorPagination,
    query::{ArrayFilter, Filter, FindOptions, Update},
};
use docbridge_mongodb::{MongoDbConfig, MongoDbStore, MongoDbStoreBuilder};
use tracing_subscriber::EnvFilter;

const URI_VAR: &str = "DOCBRIDGE_MONGODB_URI";

async fn connect() -> Option<MongoDbStore> {
    let Ok(uri) = std::env::var(URI_VAR) else {
        eprintln!("{URI_VAR} not set, skipping");
        return None;
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let config = MongoDbConfig::new(uri, format!("test_{}", uuid::Uuid::new_v4().simple()));
    Some(MongoDbStoreBuilder::from_config(config).build().await.unwrap())
}

async fn cleanup(store: MongoDbStore) {
    store
        .client()
        .database(store.database())
        .drop()
        .await
        .unwrap();
    store.shutdown().await.unwrap();
}

fn collect(into: &mut Vec<Document>) -> impl FnMut(Option<Document>) -> DocumentStoreResult<()> + Send + '_ {
    move |document| {
        into.extend(document);
        Ok(())
    }
}

#[tokio::test]
async fn round_trip_through_a_collection() {
    let Some(store) = connect().await else { return };
    let users = Collection::new("users", store.clone());

    users
        .save_all(
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                doc! { "id": "a", "name": "Ann", "tags": ["x"] },
                doc! { "id": "b", "name": "Bob", "tags": ["y"] },
                doc! { "id": "c", "name": "Cid", "tags": ["x", "y"] },
            ],
        )
        .await
        .unwrap();

    assert_eq!(users.count(&Filter::eq("tags", "x")).await.unwrap(), 2);

    let mut found = Vec::new();
    users
        .find(&Filter::starts_with("name", "B"), &mut collect(&mut found), FindOptions::default())
        .await
        .unwrap();
    assert_eq!(found, vec![doc! { "id": "b", "name": "Bob", "tags": ["y"] }]);

    users.set_one("a", doc! { "name": "Anna" }).await.unwrap();
    let mut found = Vec::new();
    users
        .find_one(&Filter::id("a"), &mut collect(&mut found), FindOptions::default())
        .await
        .unwrap();
    assert_eq!(found[0].get_str("name").unwrap(), "Anna");

    assert!(users.remove_one(&Filter::id("zzz")).await.unwrap_err().is_not_found());
    users.remove_all(&Filter::all()).await.unwrap();
    assert_eq!(users.count(&Filter::all()).await.unwrap(), 0);

    cleanup(store).await;
}

#[tokio::test]
async fn cursor_pagination_walks_forward() {
    let Some(store) = connect().await else { return };
    let items = Collection::new("items", store.clone());

    for id in ["a", "b", "c"] {
        items.save_one(id, doc! { "id": id }).await.unwrap();
    }

    let mut found = Vec::new();
    let info = items
        .paginate(&Filter::all(), Some(&CursorPagination::forward(2, None).wrap()), &mut collect(&mut found))
        .await
        .unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(info.total_count, 3);
    assert!(info.has_next_page);
    assert_eq!(info.end_cursor.map(|cursor| cursor.into_string()), Some("b".to_string()));

    cleanup(store).await;
}

#[tokio::test]
async fn array_filtered_updates() {
    let Some(store) = connect().await else { return };
    let boards = Collection::new("boards", store.clone());

    boards
        .save_one("b1", doc! { "id": "b1", "cards": [{ "id": "c1", "open": true }, { "id": "c2", "open": true }] })
        .await
        .unwrap();

    boards
        .update_many_many(vec![
            Update::new(Filter::id("b1"), doc! { "cards.$[card].open": false })
                .with_array_filter(ArrayFilter::new("card", Filter::eq("id", "c2"))),
        ])
        .await
        .unwrap();

    assert_eq!(boards.count(&Filter::eq("cards.open", false)).await.unwrap(), 1);
    assert_eq!(boards.count(&Filter::eq("cards.open", true)).await.unwrap(), 1);

    cleanup(store).await;
}

#[tokio::test]
async fn upserting_onto_a_taken_id_is_a_duplicate() {
    let Some(store) = connect().await else { return };
    let items = Collection::new("items", store.clone());

    items.save_one("b", doc! { "id": "b" }).await.unwrap();

    let err = items
        .save_all(vec!["a".into()], vec![doc! { "id": "b" }])
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Duplicate(_)), "got {err:?}");
    assert_eq!(items.count(&Filter::id("b")).await.unwrap(), 1);

    cleanup(store).await;
}
