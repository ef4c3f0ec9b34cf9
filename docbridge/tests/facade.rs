use docbridge::{
    account::{Auth, User, UserRepository, UserStoreRepository},
    bson::doc,
    memory::InMemoryStore,
    prelude::*,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Project {
    id: String,
    name: String,
    #[serde(default)]
    archived: bool,
}

impl Document for Project {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "projects"
    }
}

fn project(id: &str, name: &str) -> Project {
    Project { id: id.to_string(), name: name.to_string(), archived: false }
}

#[tokio::test]
async fn typed_documents_page_through_a_store() {
    let store = DocumentStore::new(InMemoryStore::builder().build().await.unwrap());
    let projects = store.collection_for::<Project>();

    let all = vec![project("p1", "Atlas"), project("p2", "Borealis"), project("p3", "Cygnus")];
    projects
        .bulk()
        .upsert("p3", all[2].to_document().unwrap())
        .upsert("p1", all[0].to_document().unwrap())
        .upsert("p2", all[1].to_document().unwrap())
        .submit()
        .await
        .unwrap();

    let mut first = SliceConsumer::<Project>::new();
    let info = projects
        .paginate(&Filter::all(), Some(&CursorPagination::forward(2, None).wrap()), &mut first)
        .await
        .unwrap();
    assert_eq!(first.items(), &all[..2]);
    assert!(info.has_next_page);

    let mut second = SliceConsumer::<Project>::new();
    let info = projects
        .paginate(&Filter::all(), Some(&CursorPagination::forward(2, info.end_cursor).wrap()), &mut second)
        .await
        .unwrap();
    assert_eq!(second.into_items(), all[2..].to_vec());
    assert!(!info.has_next_page);
    assert!(info.has_previous_page);

    projects
        .update_many(&Filter::starts_with("name", "B"), doc! { "archived": true })
        .await
        .unwrap();
    assert_eq!(projects.count(&Filter::eq("archived", true)).await.unwrap(), 1);

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn account_repositories_share_a_store() {
    let store = DocumentStore::new(InMemoryStore::default());
    let users = UserStoreRepository::from_store(&store);

    let user = User::new("ann", "ann@example.com").with_auth(Auth::from_sub("auth0|ann"));
    users.create(user.clone()).await.unwrap();

    assert_eq!(users.find_by_sub("auth0|ann").await.unwrap(), user);
    assert_eq!(store.collection("users").count(&Filter::all()).await.unwrap(), 1);
}
