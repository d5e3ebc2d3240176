//! In-memory document engine
//!
//! Collections hold documents keyed by an insertion sequence number. Each
//! collection carries its secondary indexes, which are maintained on every
//! write and consulted by a small planner:
//!
//! - an equality or membership term on the leading field of an index turns
//!   into an index scan,
//! - an unfiltered query sorted by the field of a single-field index walks
//!   the index in order,
//! - everything else scans the collection.
//!
//! Arrays sort by their smallest element ascending and largest element
//! descending, so index walks and scans order multikey fields the same way.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use super::engine::{DocumentEngine, IndexCreation};
use super::index::{render_key, SecondaryIndex};
use super::{
    Datum, Filter, FindOptions, IndexDescriptor, IndexStats, QueryPlan, Sort, SortOrder,
    WriteOutcome,
};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Collection {
    docs: BTreeMap<u64, Datum>,
    next_seq: u64,
    indexes: Vec<SecondaryIndex>,
}

impl Collection {
    /// Picks the index answering `filter`, if any.
    fn index_for_filter(&self, filter: &Filter) -> Option<(usize, Vec<Datum>)> {
        for (path, values) in filter.indexable_terms() {
            if values
                .iter()
                .any(|v| matches!(v, Datum::Array(_) | Datum::Object(_)))
            {
                continue;
            }
            if let Some(pos) = self
                .indexes
                .iter()
                .position(|idx| idx.descriptor.leading_path() == Some(path))
            {
                return Some((pos, values.into_iter().cloned().collect()));
            }
        }
        None
    }

    fn index_for_sort(&self, filter: &Filter, sort: Option<&Sort>) -> Option<usize> {
        let sort = sort?;
        if *filter != Filter::All {
            return None;
        }
        self.indexes.iter().position(|idx| {
            idx.descriptor.fields.len() == 1
                && idx.descriptor.leading_path() == Some(sort.path.as_str())
        })
    }

    fn plan(&self, filter: &Filter, options: &FindOptions) -> QueryPlan {
        if let Some((pos, _)) = self.index_for_filter(filter) {
            return QueryPlan::IndexScan(self.indexes[pos].descriptor.name.clone());
        }
        match self.index_for_sort(filter, options.sort.as_ref()) {
            Some(pos) => QueryPlan::IndexScan(self.indexes[pos].descriptor.name.clone()),
            None => QueryPlan::CollectionScan,
        }
    }

    /// Sequence numbers of matching documents, in result order.
    fn matching(&self, filter: &Filter, options: &FindOptions) -> Vec<u64> {
        if let Some((pos, values)) = self.index_for_filter(filter) {
            let index = &self.indexes[pos];
            let candidates: BTreeSet<u64> = values
                .iter()
                .flat_map(|v| index.lookup_leading(v))
                .collect();
            let mut seqs: Vec<u64> = candidates
                .into_iter()
                .filter(|seq| self.docs.get(seq).is_some_and(|doc| filter.matches(doc)))
                .collect();
            if let Some(sort) = &options.sort {
                self.sort_seqs(&mut seqs, sort);
            }
            return truncate(seqs, options.limit);
        }

        if let Some(pos) = self.index_for_sort(filter, options.sort.as_ref()) {
            let order = options
                .sort
                .as_ref()
                .map(|s| s.order)
                .unwrap_or(SortOrder::Ascending);
            let seqs = self.indexes[pos].ordered_seqs(order);
            return truncate(seqs, options.limit);
        }

        let mut seqs: Vec<u64> = self
            .docs
            .iter()
            .filter(|(_, doc)| filter.matches(doc))
            .map(|(seq, _)| *seq)
            .collect();
        match &options.sort {
            Some(sort) => {
                self.sort_seqs(&mut seqs, sort);
                truncate(seqs, options.limit)
            }
            None => truncate(seqs, options.limit),
        }
    }

    fn sort_seqs(&self, seqs: &mut [u64], sort: &Sort) {
        let key = |seq: &u64| -> Datum {
            let values = self
                .docs
                .get(seq)
                .map(|doc| doc.resolve(&sort.path))
                .unwrap_or_default();
            let picked = match sort.order {
                SortOrder::Ascending => values.into_iter().min_by(|a, b| a.total_cmp(b)),
                SortOrder::Descending => values.into_iter().max_by(|a, b| a.total_cmp(b)),
            };
            picked.cloned().unwrap_or(Datum::Null)
        };
        seqs.sort_by(|a, b| sort.order.apply(key(a).total_cmp(&key(b))));
    }

    fn check_unique(&self, collection: &str, seq: Option<u64>, doc: &Datum) -> Result<()> {
        for index in &self.indexes {
            if let Some(key) = index.conflicting_key(seq, doc) {
                return Err(Error::DuplicateKey {
                    collection: collection.to_string(),
                    index: index.descriptor.name.clone(),
                    key: render_key(&key),
                });
            }
        }
        Ok(())
    }

    fn insert(&mut self, collection: &str, doc: Datum) -> Result<u64> {
        if doc.as_object().is_none() {
            return Err(Error::Document(format!(
                "Documents in {} must be objects, got {}",
                collection, doc
            )));
        }
        self.check_unique(collection, None, &doc)?;
        let seq = self.next_seq;
        self.next_seq += 1;
        for index in &mut self.indexes {
            index.add(seq, &doc);
        }
        self.docs.insert(seq, doc);
        Ok(seq)
    }

    fn remove(&mut self, seq: u64) -> Option<Datum> {
        let doc = self.docs.remove(&seq)?;
        for index in &mut self.indexes {
            index.remove(seq, &doc);
        }
        Some(doc)
    }
}

fn truncate(mut seqs: Vec<u64>, limit: Option<usize>) -> Vec<u64> {
    if let Some(limit) = limit {
        seqs.truncate(limit);
    }
    seqs
}

/// In-memory document engine
#[derive(Debug, Default)]
pub struct MemoryDocumentEngine {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryDocumentEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// How `find` would answer this query, without running it.
    pub fn explain(&self, collection: &str, filter: &Filter, options: &FindOptions) -> QueryPlan {
        self.collections
            .read()
            .get(collection)
            .map(|coll| coll.plan(filter, options))
            .unwrap_or(QueryPlan::CollectionScan)
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|coll| coll.docs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl DocumentEngine for MemoryDocumentEngine {
    async fn insert_one(&self, collection: &str, doc: Datum) -> Result<()> {
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();
        let seq = coll.insert(collection, doc)?;
        debug!(collection, seq, "Inserted document");
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Datum>> {
        let collections = self.collections.read();
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(coll
            .matching(filter, options)
            .into_iter()
            .filter_map(|seq| coll.docs.get(&seq).cloned())
            .collect())
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Datum,
        upsert: bool,
    ) -> Result<WriteOutcome> {
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();

        let target = coll
            .matching(filter, &FindOptions::default().limit(1))
            .into_iter()
            .next();

        match target {
            Some(seq) => {
                if doc.as_object().is_none() {
                    return Err(Error::Document(format!(
                        "Documents in {} must be objects, got {}",
                        collection, doc
                    )));
                }
                coll.check_unique(collection, Some(seq), &doc)?;
                let modified = coll.docs.get(&seq) != Some(&doc);
                if modified {
                    if let Some(old) = coll.docs.get(&seq).cloned() {
                        for index in &mut coll.indexes {
                            index.remove(seq, &old);
                            index.add(seq, &doc);
                        }
                    }
                    coll.docs.insert(seq, doc);
                }
                debug!(collection, seq, modified, "Replaced document");
                Ok(WriteOutcome {
                    matched: 1,
                    modified: u64::from(modified),
                    upserted: false,
                })
            }
            None if upsert => {
                let seq = coll.insert(collection, doc)?;
                debug!(collection, seq, "Upserted document");
                Ok(WriteOutcome {
                    matched: 0,
                    modified: 0,
                    upserted: true,
                })
            }
            None => Ok(WriteOutcome::default()),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut collections = self.collections.write();
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let seqs = coll.matching(filter, &FindOptions::default());
        let deleted = seqs
            .into_iter()
            .filter(|seq| coll.remove(*seq).is_some())
            .count() as u64;
        debug!(collection, deleted, "Deleted documents");
        Ok(deleted)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|coll| coll.matching(filter, &FindOptions::default()).len() as u64)
            .unwrap_or(0))
    }

    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<IndexCreation> {
        if descriptor.fields.is_empty() {
            return Err(Error::IndexConflict(format!(
                "Index {} declares no fields",
                descriptor.name
            )));
        }

        let mut collections = self.collections.write();
        let coll = collections
            .entry(descriptor.collection.clone())
            .or_default();

        for existing in &coll.indexes {
            let same_def = existing.descriptor.same_definition(descriptor);
            if existing.descriptor.name == descriptor.name {
                if same_def {
                    return Ok(IndexCreation::AlreadyExists);
                }
                return Err(Error::IndexConflict(format!(
                    "An index named {} already exists with a different definition: {}",
                    descriptor.name, existing.descriptor
                )));
            }
            if same_def {
                return Err(Error::IndexConflict(format!(
                    "Index {} duplicates existing index {}",
                    descriptor.name, existing.descriptor.name
                )));
            }
        }

        let mut index = SecondaryIndex::new(descriptor.clone());
        for (seq, doc) in &coll.docs {
            if let Some(key) = index.conflicting_key(Some(*seq), doc) {
                return Err(Error::DuplicateKey {
                    collection: descriptor.collection.clone(),
                    index: descriptor.name.clone(),
                    key: render_key(&key),
                });
            }
            index.add(*seq, doc);
        }
        debug!(index = %descriptor, "Created index");
        coll.indexes.push(index);
        Ok(IndexCreation::Created)
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<bool> {
        let mut collections = self.collections.write();
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = coll.indexes.len();
        coll.indexes.retain(|idx| idx.descriptor.name != name);
        Ok(coll.indexes.len() != before)
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexDescriptor>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|coll| {
                coll.indexes
                    .iter()
                    .map(|idx| idx.descriptor.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn index_stats(&self, collection: &str) -> Result<Vec<IndexStats>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|coll| coll.indexes.iter().map(SecondaryIndex::stats).collect())
            .unwrap_or_default())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.collections.write().remove(collection);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::IndexField;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Datum {
        Datum::from(value)
    }

    async fn seeded() -> MemoryDocumentEngine {
        let engine = MemoryDocumentEngine::new();
        for (key, title, genre) in [("k1", "b", "MY"), ("k2", "a", "TH"), ("k3", "c", "MY")] {
            engine
                .insert_one(
                    "books",
                    doc(json!({"api_key": key, "title": title, "genre": genre})),
                )
                .await
                .unwrap();
        }
        engine
    }

    #[tokio::test]
    async fn test_find_by_scan_and_by_index_agree() {
        let engine = seeded().await;
        let filter = Filter::eq("genre", "MY");
        let scanned = engine
            .find("books", &filter, &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(
            engine.explain("books", &filter, &FindOptions::default()),
            QueryPlan::CollectionScan
        );

        let descriptor = IndexDescriptor::new("g", "books", vec![IndexField::asc("genre")]);
        engine.create_index(&descriptor).await.unwrap();
        let indexed = engine
            .find("books", &filter, &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(
            engine.explain("books", &filter, &FindOptions::default()),
            QueryPlan::IndexScan("g".to_string())
        );
        assert_eq!(scanned, indexed);
        assert_eq!(indexed.len(), 2);
    }

    #[tokio::test]
    async fn test_sorted_find_uses_title_index() {
        let engine = seeded().await;
        let options = FindOptions::sorted("title", SortOrder::Descending);
        let scanned = engine.find("books", &Filter::All, &options).await.unwrap();

        let descriptor = IndexDescriptor::new("t", "books", vec![IndexField::asc("title")]);
        engine.create_index(&descriptor).await.unwrap();
        let indexed = engine.find("books", &Filter::All, &options).await.unwrap();

        assert_eq!(scanned, indexed);
        let titles: Vec<_> = indexed
            .iter()
            .filter_map(|d| d.field("title").and_then(Datum::as_string))
            .collect();
        assert_eq!(titles, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicates() {
        let engine = seeded().await;
        let descriptor =
            IndexDescriptor::new("key", "books", vec![IndexField::asc("api_key")]).unique();
        engine.create_index(&descriptor).await.unwrap();

        let err = engine
            .insert_one("books", doc(json!({"api_key": "k1", "title": "dup"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
        assert_eq!(engine.len("books"), 3);
    }

    #[tokio::test]
    async fn test_unique_index_over_existing_duplicates_fails() {
        let engine = seeded().await;
        let descriptor =
            IndexDescriptor::new("genre_u", "books", vec![IndexField::asc("genre")]).unique();
        let err = engine.create_index(&descriptor).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
        assert!(engine.list_indexes("books").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_index_idempotence_and_conflicts() {
        let engine = MemoryDocumentEngine::new();
        let descriptor = IndexDescriptor::new("t", "books", vec![IndexField::asc("title")]);
        assert_eq!(
            engine.create_index(&descriptor).await.unwrap(),
            IndexCreation::Created
        );
        assert_eq!(
            engine.create_index(&descriptor).await.unwrap(),
            IndexCreation::AlreadyExists
        );

        let redefined = IndexDescriptor::new("t", "books", vec![IndexField::desc("title")]);
        assert!(matches!(
            engine.create_index(&redefined).await,
            Err(Error::IndexConflict(_))
        ));

        let renamed = IndexDescriptor::new("t2", "books", vec![IndexField::asc("title")]);
        assert!(matches!(
            engine.create_index(&renamed).await,
            Err(Error::IndexConflict(_))
        ));
        assert_eq!(engine.list_indexes("books").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_one_updates_indexes() {
        let engine = seeded().await;
        let descriptor = IndexDescriptor::new("g", "books", vec![IndexField::asc("genre")]);
        engine.create_index(&descriptor).await.unwrap();

        let outcome = engine
            .replace_one(
                "books",
                &Filter::eq("api_key", "k1"),
                doc(json!({"api_key": "k1", "title": "b", "genre": "HO"})),
                false,
            )
            .await
            .unwrap();
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.modified, 1);

        assert_eq!(engine.count("books", &Filter::eq("genre", "HO")).await.unwrap(), 1);
        assert_eq!(engine.count("books", &Filter::eq("genre", "MY")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_one_upsert_and_noop() {
        let engine = MemoryDocumentEngine::new();
        let filter = Filter::eq("api_key", "x");
        let body = doc(json!({"api_key": "x"}));

        let missing = engine
            .replace_one("authors", &filter, body.clone(), false)
            .await
            .unwrap();
        assert_eq!(missing, WriteOutcome::default());

        let inserted = engine
            .replace_one("authors", &filter, body.clone(), true)
            .await
            .unwrap();
        assert!(inserted.upserted);

        let unchanged = engine
            .replace_one("authors", &filter, body, true)
            .await
            .unwrap();
        assert_eq!(unchanged.matched, 1);
        assert_eq!(unchanged.modified, 0);
        assert_eq!(engine.len("authors"), 1);
    }

    #[tokio::test]
    async fn test_delete_many_and_drop() {
        let engine = seeded().await;
        let deleted = engine
            .delete_many("books", &Filter::eq("genre", "MY"))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(engine.len("books"), 1);

        engine.drop_collection("books").await.unwrap();
        assert!(engine.list_collections().await.unwrap().is_empty());
        assert!(engine.is_empty("books"));
    }

    #[tokio::test]
    async fn test_embedded_path_lookup() {
        let engine = MemoryDocumentEngine::new();
        let descriptor = IndexDescriptor::new(
            "emb",
            "books_with_embedded_authors",
            vec![IndexField::asc("authors.api_key")],
        );
        engine.create_index(&descriptor).await.unwrap();
        engine
            .insert_one(
                "books_with_embedded_authors",
                doc(json!({"api_key": "b1", "authors": [{"api_key": "a1"}, {"api_key": "a2"}]})),
            )
            .await
            .unwrap();
        engine
            .insert_one(
                "books_with_embedded_authors",
                doc(json!({"api_key": "b2", "authors": [{"api_key": "a2"}]})),
            )
            .await
            .unwrap();

        let filter = Filter::eq("authors.api_key", "a2");
        let hits = engine
            .find("books_with_embedded_authors", &filter, &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);

        let stats = engine
            .index_stats("books_with_embedded_authors")
            .await
            .unwrap();
        assert_eq!(stats[0].entries, 3);
        assert_eq!(stats[0].accesses, 1);
    }

    #[tokio::test]
    async fn test_rejects_non_object_documents() {
        let engine = MemoryDocumentEngine::new();
        let err = engine.insert_one("books", Datum::from("nope")).await.unwrap_err();
        assert!(matches!(err, Error::Document(_)));
    }
}
