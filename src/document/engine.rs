//! Document engine trait

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Datum, Filter, FindOptions, IndexDescriptor, IndexStats, WriteOutcome};
use crate::error::{Error, Result};

/// Result of declaring an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexCreation {
    Created,
    /// An index with this name and the same definition already existed.
    AlreadyExists,
}

/// Document engine trait
///
/// Collections spring into existence on first write or index declaration,
/// like in a schemaless document store.
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    async fn insert_one(&self, collection: &str, doc: Datum) -> Result<()>;

    /// Inserts documents in order, stopping at the first failure.
    async fn insert_many(&self, collection: &str, docs: Vec<Datum>) -> Result<usize> {
        let mut inserted = 0;
        for doc in docs {
            self.insert_one(collection, doc).await?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Datum>>;

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Datum>> {
        let mut docs = self
            .find(collection, filter, &FindOptions::default().limit(1))
            .await?;
        Ok(docs.pop())
    }

    /// Replaces the first document matching `filter`, inserting `doc` when
    /// nothing matches and `upsert` is set.
    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Datum,
        upsert: bool,
    ) -> Result<WriteOutcome>;

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64>;

    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<IndexCreation>;

    async fn drop_index(&self, collection: &str, name: &str) -> Result<bool>;

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexDescriptor>>;

    async fn index_stats(&self, collection: &str) -> Result<Vec<IndexStats>>;

    async fn drop_collection(&self, collection: &str) -> Result<()>;

    async fn list_collections(&self) -> Result<Vec<String>>;
}

/// Shared engines, so a caller can keep a handle on the engine a
/// [`DocumentStore`] owns.
#[async_trait]
impl<E: DocumentEngine + ?Sized> DocumentEngine for std::sync::Arc<E> {
    async fn insert_one(&self, collection: &str, doc: Datum) -> Result<()> {
        (**self).insert_one(collection, doc).await
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Datum>) -> Result<usize> {
        (**self).insert_many(collection, docs).await
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Datum>> {
        (**self).find(collection, filter, options).await
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Datum>> {
        (**self).find_one(collection, filter).await
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Datum,
        upsert: bool,
    ) -> Result<WriteOutcome> {
        (**self).replace_one(collection, filter, doc, upsert).await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        (**self).delete_many(collection, filter).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        (**self).count(collection, filter).await
    }

    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<IndexCreation> {
        (**self).create_index(descriptor).await
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<bool> {
        (**self).drop_index(collection, name).await
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexDescriptor>> {
        (**self).list_indexes(collection).await
    }

    async fn index_stats(&self, collection: &str) -> Result<Vec<IndexStats>> {
        (**self).index_stats(collection).await
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        (**self).drop_collection(collection).await
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        (**self).list_collections().await
    }
}

/// Main document store interface
pub struct DocumentStore {
    engine: Box<dyn DocumentEngine>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore").finish()
    }
}

impl DocumentStore {
    pub fn new(engine: Box<dyn DocumentEngine>) -> Self {
        Self { engine }
    }

    /// Store backed by a fresh in-memory engine.
    pub fn in_memory() -> Self {
        Self::new(Box::new(super::MemoryDocumentEngine::new()))
    }

    pub async fn insert_one(&self, collection: &str, doc: Datum) -> Result<()> {
        self.engine.insert_one(collection, doc).await
    }

    pub async fn insert_many(&self, collection: &str, docs: Vec<Datum>) -> Result<usize> {
        self.engine.insert_many(collection, docs).await
    }

    pub async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Datum>> {
        self.engine.find(collection, filter, options).await
    }

    pub async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Datum>> {
        self.engine.find_one(collection, filter).await
    }

    pub async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Datum,
        upsert: bool,
    ) -> Result<WriteOutcome> {
        self.engine.replace_one(collection, filter, doc, upsert).await
    }

    pub async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        self.engine.delete_many(collection, filter).await
    }

    pub async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        self.engine.count(collection, filter).await
    }

    pub async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<IndexCreation> {
        self.engine.create_index(descriptor).await
    }

    pub async fn drop_index(&self, collection: &str, name: &str) -> Result<bool> {
        self.engine.drop_index(collection, name).await
    }

    pub async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexDescriptor>> {
        self.engine.list_indexes(collection).await
    }

    pub async fn index_stats(&self, collection: &str) -> Result<Vec<IndexStats>> {
        self.engine.index_stats(collection).await
    }

    pub async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.engine.drop_collection(collection).await
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.engine.list_collections().await
    }

    // ===== Typed helpers =====

    /// Serializes `value` into a document.
    pub fn to_datum<T: Serialize>(value: &T) -> Result<Datum> {
        Ok(Datum::from(serde_json::to_value(value)?))
    }

    /// Decodes a document into `T`.
    pub fn from_datum<T: DeserializeOwned>(doc: Datum) -> Result<T> {
        serde_json::from_value(serde_json::Value::from(doc))
            .map_err(|e| Error::Serialization(format!("Failed to decode document: {}", e)))
    }

    /// Upserts `value` as the document whose `key_path` equals `key`.
    pub async fn upsert_typed<T: Serialize + Sync>(
        &self,
        collection: &str,
        key_path: &str,
        key: &str,
        value: &T,
    ) -> Result<WriteOutcome> {
        let doc = Self::to_datum(value)?;
        self.replace_one(collection, &Filter::eq(key_path, key), doc, true)
            .await
    }

    pub async fn find_one_typed<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<T>> {
        self.find_one(collection, filter)
            .await?
            .map(Self::from_datum)
            .transpose()
    }

    pub async fn find_typed<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<T>> {
        self.find(collection, filter, options)
            .await?
            .into_iter()
            .map(Self::from_datum)
            .collect()
    }
}
