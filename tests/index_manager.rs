//! Index catalog management against the in-memory document engine.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use serde_json::json;

use bookmirror::config::CollectionNames;
use bookmirror::document::{
    Datum, DocumentStore, Filter, FindOptions, IndexDescriptor, IndexField, MemoryDocumentEngine,
    QueryPlan, SortOrder,
};
use bookmirror::error::Error;
use bookmirror::IndexManager;

fn setup() -> (IndexManager, Arc<DocumentStore>, Arc<MemoryDocumentEngine>) {
    let engine = Arc::new(MemoryDocumentEngine::new());
    let store = Arc::new(DocumentStore::new(Box::new(engine.clone())));
    let manager = IndexManager::new(store.clone(), &CollectionNames::default());
    (manager, store, engine)
}

fn book(key: &str, title: &str, genre: &str) -> Datum {
    Datum::from(json!({
        "api_key": key,
        "title": title,
        "genre": genre,
        "book_type": "P",
        "author_keys": ["a1", "a2"],
    }))
}

#[tokio::test]
async fn test_ensure_is_idempotent() {
    let (manager, _store, _engine) = setup();

    let first = manager.ensure_indexes().await.unwrap();
    assert_eq!(first.created.len(), 16);
    assert!(first.existing.is_empty());

    let second = manager.ensure_indexes().await.unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.existing, first.created);

    for collection in ["authors", "books", "books_with_embedded_authors"] {
        let declared = manager.catalog().descriptors().iter().filter(|d| d.collection == collection);
        assert_eq!(
            manager.list_indexes(collection).await.unwrap().len(),
            declared.count()
        );
    }
}

#[tokio::test]
async fn test_unique_index_over_duplicates_fails() {
    let (manager, store, _engine) = setup();
    store.insert_one("books", book("k1", "A", "MY")).await.unwrap();
    store.insert_one("books", book("k1", "B", "TH")).await.unwrap();

    let err = manager.ensure_indexes().await.unwrap_err();
    match err {
        Error::DuplicateKey { collection, index, .. } => {
            assert_eq!(collection, "books");
            assert_eq!(index, "idx_book_api_key");
        }
        other => panic!("unexpected error: {other}"),
    }
    let names: Vec<_> = manager
        .list_indexes("books")
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert!(!names.contains(&"idx_book_api_key".to_string()));
}

#[tokio::test]
async fn test_conflicting_definition_fails() {
    let (manager, store, _engine) = setup();
    store
        .create_index(&IndexDescriptor::new(
            "idx_book_title",
            "books",
            vec![IndexField::asc("isbn")],
        ))
        .await
        .unwrap();

    let err = manager.ensure_indexes().await.unwrap_err();
    assert!(matches!(err, Error::IndexConflict(_)));
}

#[tokio::test]
async fn test_unique_index_rejects_later_duplicate() {
    let (manager, store, _engine) = setup();
    manager.ensure_indexes().await.unwrap();

    store.insert_one("books", book("k1", "A", "MY")).await.unwrap();
    let err = store
        .insert_one("books", book("k1", "B", "MY"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateKey { .. }));
    assert_eq!(store.count("books", &Filter::All).await.unwrap(), 1);
}

#[tokio::test]
async fn test_plans_follow_declared_indexes() {
    let (manager, store, engine) = setup();
    for (i, genre) in ["MY", "TH", "MY"].iter().enumerate() {
        store
            .insert_one("books", book(&format!("k{i}"), &format!("T{i}"), genre))
            .await
            .unwrap();
    }

    let by_genre = Filter::eq("genre", "MY");
    let by_author = Filter::eq("author_keys", "a2");
    let sorted = FindOptions::sorted("title", SortOrder::Ascending);
    let none = FindOptions::default();

    assert_eq!(engine.explain("books", &by_genre, &none), QueryPlan::CollectionScan);

    manager.ensure_indexes().await.unwrap();
    assert_eq!(
        engine.explain("books", &by_genre, &none),
        QueryPlan::IndexScan("idx_book_genre".into())
    );
    assert_eq!(
        engine.explain("books", &by_author, &none),
        QueryPlan::IndexScan("idx_book_author_keys".into())
    );
    assert_eq!(
        engine.explain("books", &Filter::All, &sorted),
        QueryPlan::IndexScan("idx_book_title".into())
    );

    let found = store.find("books", &by_genre, &none).await.unwrap();
    assert_eq!(found.len(), 2);

    let stats = manager.index_stats("books").await.unwrap();
    let genre = stats.iter().find(|s| s.name == "idx_book_genre").unwrap();
    assert_eq!(genre.entries, 3);
    assert_eq!(genre.accesses, 1);
    let author_keys = stats.iter().find(|s| s.name == "idx_book_author_keys").unwrap();
    assert_eq!(author_keys.entries, 6);

    assert_eq!(manager.drop_all_indexes().await.unwrap(), 16);
    assert_eq!(engine.explain("books", &by_genre, &none), QueryPlan::CollectionScan);
    assert_eq!(store.find("books", &by_genre, &none).await.unwrap().len(), 2);
}
