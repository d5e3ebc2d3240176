//! Index manager
//!
//! Owns the fixed catalog of secondary indexes on the mirrored collections.
//! Index names are stable identifiers: declaring the catalog again finds
//! every index already present and changes nothing.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::CollectionNames;
use crate::document::{DocumentStore, IndexCreation, IndexDescriptor, IndexField, IndexStats};
use crate::error::Result;

/// The set of indexes managed on the three collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCatalog {
    descriptors: Vec<IndexDescriptor>,
}

impl IndexCatalog {
    /// The standard catalog, bound to the configured collection names.
    pub fn standard(collections: &CollectionNames) -> Self {
        let authors = collections.authors.as_str();
        let books = collections.books.as_str();
        let embedded = collections.books_with_embedded_authors.as_str();
        let asc = IndexField::asc;

        let descriptors = vec![
            IndexDescriptor::new("idx_author_api_key", authors, vec![asc("api_key")]).unique(),
            IndexDescriptor::new("idx_author_penname", authors, vec![asc("penname")]),
            IndexDescriptor::new("idx_author_email", authors, vec![asc("email")]),
            IndexDescriptor::new(
                "idx_author_name",
                authors,
                vec![asc("last_name"), asc("first_name")],
            ),
            IndexDescriptor::new("idx_author_book_keys", authors, vec![asc("book_keys")]),
            IndexDescriptor::new("idx_book_api_key", books, vec![asc("api_key")]).unique(),
            IndexDescriptor::new("idx_book_title", books, vec![asc("title")]),
            IndexDescriptor::new("idx_book_genre", books, vec![asc("genre")]),
            IndexDescriptor::new(
                "idx_book_genre_type",
                books,
                vec![asc("genre"), asc("book_type")],
            ),
            IndexDescriptor::new(
                "idx_book_publication_date",
                books,
                vec![IndexField::desc("publication_date")],
            ),
            IndexDescriptor::new("idx_book_author_keys", books, vec![asc("author_keys")]),
            IndexDescriptor::new("idx_embedded_book_api_key", embedded, vec![asc("api_key")])
                .unique(),
            IndexDescriptor::new("idx_embedded_book_title", embedded, vec![asc("title")]),
            IndexDescriptor::new("idx_embedded_book_genre", embedded, vec![asc("genre")]),
            IndexDescriptor::new(
                "idx_embedded_author_api_key",
                embedded,
                vec![asc("authors.api_key")],
            ),
            IndexDescriptor::new(
                "idx_embedded_author_email",
                embedded,
                vec![asc("authors.email")],
            ),
        ];
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[IndexDescriptor] {
        &self.descriptors
    }

    /// Distinct collections covered by the catalog, in declaration order.
    pub fn collections(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for d in &self.descriptors {
            if !out.contains(&d.collection.as_str()) {
                out.push(&d.collection);
            }
        }
        out
    }
}

/// What `ensure_indexes` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsureReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

/// Declares, drops and inspects the catalog's indexes.
pub struct IndexManager {
    store: Arc<DocumentStore>,
    catalog: IndexCatalog,
}

impl IndexManager {
    pub fn new(store: Arc<DocumentStore>, collections: &CollectionNames) -> Self {
        Self::with_catalog(store, IndexCatalog::standard(collections))
    }

    pub fn with_catalog(store: Arc<DocumentStore>, catalog: IndexCatalog) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> &IndexCatalog {
        &self.catalog
    }

    /// Declares every catalog index. Existing identical indexes are kept;
    /// a conflicting definition or a unique index violated by existing
    /// documents aborts with the store's error.
    pub async fn ensure_indexes(&self) -> Result<EnsureReport> {
        let mut report = EnsureReport::default();
        for descriptor in self.catalog.descriptors() {
            match self.store.create_index(descriptor).await {
                Ok(IndexCreation::Created) => report.created.push(descriptor.name.clone()),
                Ok(IndexCreation::AlreadyExists) => report.existing.push(descriptor.name.clone()),
                Err(e) => {
                    warn!(index = %descriptor, error = %e, "Failed to create index");
                    return Err(e);
                }
            }
        }
        info!(
            created = report.created.len(),
            existing = report.existing.len(),
            "Indexes ensured"
        );
        Ok(report)
    }

    /// Drops every index on the managed collections. Returns how many went.
    pub async fn drop_all_indexes(&self) -> Result<usize> {
        let mut dropped = 0;
        for collection in self.catalog.collections() {
            for descriptor in self.store.list_indexes(collection).await? {
                if self.store.drop_index(collection, &descriptor.name).await? {
                    dropped += 1;
                }
            }
        }
        info!(dropped, "Dropped all indexes");
        Ok(dropped)
    }

    pub async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexDescriptor>> {
        self.store.list_indexes(collection).await
    }

    pub async fn index_stats(&self, collection: &str) -> Result<Vec<IndexStats>> {
        self.store.index_stats(collection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_shape() {
        let catalog = IndexCatalog::standard(&CollectionNames::default());
        assert_eq!(catalog.descriptors().len(), 16);
        assert_eq!(
            catalog.collections(),
            vec!["authors", "books", "books_with_embedded_authors"]
        );
        let unique: Vec<_> = catalog
            .descriptors()
            .iter()
            .filter(|d| d.unique)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            unique,
            vec!["idx_author_api_key", "idx_book_api_key", "idx_embedded_book_api_key"]
        );
    }

    #[tokio::test]
    async fn test_ensure_then_drop() {
        let store = Arc::new(DocumentStore::in_memory());
        let manager = IndexManager::new(store, &CollectionNames::default());

        let first = manager.ensure_indexes().await.unwrap();
        assert_eq!(first.created.len(), 16);
        let second = manager.ensure_indexes().await.unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.existing.len(), 16);

        assert_eq!(manager.list_indexes("books").await.unwrap().len(), 6);
        assert_eq!(manager.drop_all_indexes().await.unwrap(), 16);
        assert!(manager.list_indexes("authors").await.unwrap().is_empty());
    }
}
