//! Synchronization service
//!
//! Every logical write of an author or a book goes through here:
//!
//! 1. the relational store commits the change (or rejects it, and nothing
//!    else happens),
//! 2. the mapper derives the referencing and embedding documents,
//! 3. each document write runs on its own; a failure is logged and kept in
//!    the returned [`SyncReport`] instead of undoing the relational change.
//!
//! Updating an author rewrites every embedding book document that carries
//! a snapshot of them, one find-then-replace at a time. Without
//! `sync.serialize_author_fanout` two concurrent updates of the same author
//! may interleave there and the last writer wins per document.

pub mod state;

pub use state::{ResyncSummary, SyncFailure, SyncReport, SyncState};

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument};

use crate::apikey::{self, ApiKey};
use crate::config::MirrorConfig;
use crate::document::{Datum, DocumentStore, Filter, FindOptions};
use crate::error::Result;
use crate::mapper::{
    self, AuthorDocument, AuthorView, BookDocument, BookView, BookWithEmbeddedAuthors,
};
use crate::model::{Author, AuthorCommand, BookCommand, BookGraph, ValidationError};
use crate::relational::RelationalStore;
use state::Tracker;

const KEY_PATH: &str = "api_key";
const EMBEDDED_AUTHOR_KEY_PATH: &str = "authors.api_key";

/// Keeps the document mirrors in step with the relational store.
pub struct SyncService {
    relational: Arc<RelationalStore>,
    documents: Arc<DocumentStore>,
    config: MirrorConfig,
    author_locks: DashMap<ApiKey, Arc<Mutex<()>>>,
}

impl SyncService {
    pub fn new(
        relational: Arc<RelationalStore>,
        documents: Arc<DocumentStore>,
        config: MirrorConfig,
    ) -> Self {
        Self {
            relational,
            documents,
            config,
            author_locks: DashMap::new(),
        }
    }

    pub fn relational(&self) -> &Arc<RelationalStore> {
        &self.relational
    }

    pub fn documents(&self) -> &Arc<DocumentStore> {
        &self.documents
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    // ===== Authors =====

    #[instrument(skip(self, command), fields(penname = %command.penname))]
    pub async fn create_author(&self, command: &AuthorCommand) -> Result<SyncReport<AuthorView>> {
        reject_key_on_create(command.api_key.as_deref())?;
        let author = command.build(self.new_key())?;

        let mut tracker = Tracker::new("author", "create");
        let author = tracker.commit(self.relational.insert_author(author))?;
        info!(api_key = %author.api_key, "Created author");

        self.sync_author_document(&mut tracker, &author.api_key).await;
        Ok(self.finish_author(tracker, &author.api_key, author.clone()))
    }

    /// Updates an author and rewrites every document that mirrors them,
    /// including the embedded snapshots in book documents.
    #[instrument(skip(self, command), fields(api_key = ?command.api_key))]
    pub async fn update_author(&self, command: &AuthorCommand) -> Result<SyncReport<AuthorView>> {
        let key = require_key(command.api_key.as_deref())?;
        let author = command.build(key.clone())?;
        let _guard = self.lock_author(&key).await;

        let mut tracker = Tracker::new("author", "update");
        tracker.commit(self.relational.update_author(author.clone()))?;
        info!(api_key = %key, "Updated author");

        self.sync_author_document(&mut tracker, &key).await;
        let rewritten = self.fan_out_author(&mut tracker, &author).await;
        debug!(api_key = %key, rewritten, state = ?tracker.state(), "Author fan-out finished");

        Ok(self.finish_author(tracker, &key, author))
    }

    /// Deletes an author. Rejected while any book references them, in which
    /// case no store is touched.
    #[instrument(skip(self), fields(api_key = %key))]
    pub async fn delete_author(&self, key: &ApiKey) -> Result<SyncReport<Author>> {
        let _guard = self.lock_author(key).await;

        let mut tracker = Tracker::new("author", "delete");
        let author = tracker.commit(self.relational.delete_author(key))?;
        info!("Deleted author");

        let collection = &self.config.collections.authors;
        let result = self
            .documents
            .delete_many(collection, &Filter::eq(KEY_PATH, key))
            .await;
        tracker.absorb(collection, key.as_str(), "delete", result);

        self.author_locks.remove(key);
        Ok(tracker.finish(author))
    }

    // ===== Books =====

    #[instrument(skip(self, command), fields(title = %command.title))]
    pub async fn create_book(&self, command: &BookCommand) -> Result<SyncReport<BookView>> {
        reject_key_on_create(command.api_key.as_deref())?;
        let draft = command.build(self.new_key())?;

        let mut tracker = Tracker::new("book", "create");
        let graph = tracker.commit(self.relational.insert_book(draft))?;
        info!(api_key = %graph.book.api_key, authors = graph.authors.len(), "Created book");

        self.sync_book_documents(&mut tracker, &graph).await;
        let authors: BTreeSet<ApiKey> = graph.authors.iter().map(|a| a.api_key.clone()).collect();
        self.sync_author_documents(&mut tracker, &authors).await;

        Ok(tracker.finish(mapper::book_view(&graph)))
    }

    /// Updates a book. Authors added to or removed from it get their
    /// referencing document re-derived.
    #[instrument(skip(self, command), fields(api_key = ?command.api_key))]
    pub async fn update_book(&self, command: &BookCommand) -> Result<SyncReport<BookView>> {
        let key = require_key(command.api_key.as_deref())?;
        let draft = command.build(key.clone())?;

        let mut tracker = Tracker::new("book", "update");
        let update = tracker.commit(self.relational.update_book(draft))?;
        info!(api_key = %key, "Updated book");

        self.sync_book_documents(&mut tracker, &update.graph).await;
        let authors: BTreeSet<ApiKey> = update
            .previous_authors
            .iter()
            .chain(update.graph.authors.iter())
            .map(|a| a.api_key.clone())
            .collect();
        self.sync_author_documents(&mut tracker, &authors).await;

        Ok(tracker.finish(mapper::book_view(&update.graph)))
    }

    /// Deletes a book and its documents. Rejected while copies or store
    /// editions reference it.
    #[instrument(skip(self), fields(api_key = %key))]
    pub async fn delete_book(&self, key: &ApiKey) -> Result<SyncReport<BookView>> {
        let mut tracker = Tracker::new("book", "delete");
        let graph = tracker.commit(self.relational.delete_book(key))?;
        info!("Deleted book");

        for collection in [
            &self.config.collections.books,
            &self.config.collections.books_with_embedded_authors,
        ] {
            let result = self
                .documents
                .delete_many(collection, &Filter::eq(KEY_PATH, key))
                .await;
            tracker.absorb(collection, key.as_str(), "delete", result);
        }
        let authors: BTreeSet<ApiKey> = graph.authors.iter().map(|a| a.api_key.clone()).collect();
        self.sync_author_documents(&mut tracker, &authors).await;

        Ok(tracker.finish(mapper::book_view(&graph)))
    }

    // ===== Reads =====

    pub fn find_author(&self, key: &ApiKey) -> Option<AuthorView> {
        self.relational
            .author_graph(key)
            .map(|graph| mapper::author_view(&graph))
    }

    pub fn find_book(&self, key: &ApiKey) -> Option<BookView> {
        self.relational
            .book_graph(key)
            .map(|graph| mapper::book_view(&graph))
    }

    pub async fn find_author_document(&self, key: &ApiKey) -> Result<Option<AuthorDocument>> {
        self.documents
            .find_one_typed(&self.config.collections.authors, &Filter::eq(KEY_PATH, key))
            .await
    }

    pub async fn find_book_document(&self, key: &ApiKey) -> Result<Option<BookDocument>> {
        self.documents
            .find_one_typed(&self.config.collections.books, &Filter::eq(KEY_PATH, key))
            .await
    }

    pub async fn find_embedded_book_document(
        &self,
        key: &ApiKey,
    ) -> Result<Option<BookWithEmbeddedAuthors>> {
        self.documents
            .find_one_typed(
                &self.config.collections.books_with_embedded_authors,
                &Filter::eq(KEY_PATH, key),
            )
            .await
    }

    /// Follows the author keys of a referencing book document into the
    /// relational store. Keys without a row are skipped.
    pub fn resolve_authors(&self, document: &BookDocument) -> Vec<Author> {
        document
            .author_keys
            .iter()
            .filter_map(|key| self.relational.author(key))
            .collect()
    }

    /// Rewrites every document from the relational store and removes
    /// documents whose row no longer exists, repairing mirrors left behind
    /// by partially synchronized writes.
    #[instrument(skip(self))]
    pub async fn resync_all(&self) -> Result<SyncReport<ResyncSummary>> {
        let mut tracker = Tracker::new("all", "resync");
        tracker.commit(Ok(()))?;

        let (authors, books): (BTreeSet<ApiKey>, Vec<BookGraph>) = self.relational.read(|t| {
            let authors = t.authors.values().map(|a| a.api_key.clone()).collect();
            let books = t
                .books
                .iter()
                .filter_map(|(id, _)| t.book_graph(id))
                .collect();
            (authors, books)
        });

        let mut summary = ResyncSummary::default();
        for graph in &books {
            summary.written += self.sync_book_documents(&mut tracker, graph).await;
        }
        summary.written += self.sync_author_documents(&mut tracker, &authors).await;

        let book_keys: BTreeSet<ApiKey> = books.into_iter().map(|g| g.book.api_key).collect();
        let collections = &self.config.collections;
        summary.removed += self
            .prune_orphans(&mut tracker, &collections.authors, &authors)
            .await;
        for collection in [&collections.books, &collections.books_with_embedded_authors] {
            summary.removed += self.prune_orphans(&mut tracker, collection, &book_keys).await;
        }

        info!(
            written = summary.written,
            removed = summary.removed,
            "Resynchronized document mirrors"
        );
        Ok(tracker.finish(summary))
    }

    // ===== Internals =====

    fn new_key(&self) -> ApiKey {
        apikey::generate(self.config.identifiers.length)
    }

    async fn lock_author(&self, key: &ApiKey) -> Option<OwnedMutexGuard<()>> {
        if !self.config.sync.serialize_author_fanout {
            return None;
        }
        let lock = self
            .author_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Some(lock.lock_owned().await)
    }

    fn finish_author(&self, tracker: Tracker, key: &ApiKey, author: Author) -> SyncReport<AuthorView> {
        let view = self.find_author(key).unwrap_or_else(|| {
            mapper::author_view(&crate::model::AuthorGraph {
                author,
                books: Vec::new(),
            })
        });
        tracker.finish(view)
    }

    /// Re-derives and upserts the referencing document of one author.
    /// Returns 1 when written.
    async fn sync_author_document(&self, tracker: &mut Tracker, key: &ApiKey) -> usize {
        let Some(graph) = self.relational.author_graph(key) else {
            return 0;
        };
        let collection = &self.config.collections.authors;
        let document = mapper::author_to_referencing(&graph);
        let result = self
            .documents
            .upsert_typed(collection, KEY_PATH, key.as_str(), &document)
            .await;
        usize::from(tracker.absorb(collection, key.as_str(), "upsert", result).is_some())
    }

    async fn sync_author_documents(&self, tracker: &mut Tracker, keys: &BTreeSet<ApiKey>) -> usize {
        let mut written = 0;
        for key in keys {
            written += self.sync_author_document(tracker, key).await;
        }
        written
    }

    /// Upserts both document shapes of a book.
    async fn sync_book_documents(&self, tracker: &mut Tracker, graph: &BookGraph) -> usize {
        let key = graph.book.api_key.as_str();
        let mut written = 0;

        let collection = &self.config.collections.books;
        let result = self
            .documents
            .upsert_typed(collection, KEY_PATH, key, &mapper::book_to_referencing(graph))
            .await;
        written += usize::from(tracker.absorb(collection, key, "upsert", result).is_some());

        let collection = &self.config.collections.books_with_embedded_authors;
        let result = self
            .documents
            .upsert_typed(collection, KEY_PATH, key, &mapper::book_to_embedding(graph))
            .await;
        written += usize::from(tracker.absorb(collection, key, "upsert", result).is_some());

        written
    }

    /// Deletes the documents of `collection` whose api key is not in `live`.
    async fn prune_orphans(
        &self,
        tracker: &mut Tracker,
        collection: &str,
        live: &BTreeSet<ApiKey>,
    ) -> u64 {
        let found = self
            .documents
            .find(collection, &Filter::All, &FindOptions::default())
            .await;
        let Some(documents) = tracker.absorb(collection, "*", "find", found) else {
            return 0;
        };

        let live: BTreeSet<&str> = live.iter().map(ApiKey::as_str).collect();
        let orphans: Vec<Datum> = documents
            .iter()
            .filter_map(|doc| doc.field(KEY_PATH).and_then(Datum::as_string))
            .filter(|key| !live.contains(key))
            .map(Datum::from)
            .collect();
        if orphans.is_empty() {
            return 0;
        }
        debug!(collection, orphans = orphans.len(), "Removing orphaned documents");

        let result = self
            .documents
            .delete_many(collection, &Filter::any_of(KEY_PATH, orphans))
            .await;
        tracker
            .absorb(collection, "*", "delete", result)
            .unwrap_or(0)
    }

    /// Finds every embedding document carrying a snapshot of `author` and
    /// rewrites the stale ones one by one.
    async fn fan_out_author(&self, tracker: &mut Tracker, author: &Author) -> u64 {
        let collection = &self.config.collections.books_with_embedded_authors;
        let key = author.api_key.as_str();

        let found = self
            .documents
            .find_typed::<BookWithEmbeddedAuthors>(
                collection,
                &Filter::eq(EMBEDDED_AUTHOR_KEY_PATH, key),
                &FindOptions::default(),
            )
            .await;
        let Some(documents) = tracker.absorb(collection, key, "find", found) else {
            return 0;
        };

        let mut rewritten = 0;
        for mut document in documents {
            if !document.refresh_author(author) {
                continue;
            }
            let book_key = document.api_key.clone();
            let result = match DocumentStore::to_datum(&document) {
                Ok(datum) => {
                    self.documents
                        .replace_one(collection, &Filter::eq(KEY_PATH, &book_key), datum, false)
                        .await
                }
                Err(e) => Err(e),
            };
            if let Some(outcome) = tracker.absorb(collection, book_key.as_str(), "replace", result)
            {
                rewritten += outcome.modified;
            }
        }
        crate::metrics::record_fanout(rewritten);
        rewritten
    }
}

fn require_key(raw: Option<&str>) -> Result<ApiKey> {
    let raw = raw.ok_or(ValidationError::EmptyField("api_key"))?;
    Ok(ApiKey::parse(raw)?)
}

fn reject_key_on_create(raw: Option<&str>) -> Result<()> {
    match raw {
        Some(key) => Err(ValidationError::Constraint(format!(
            "api key {} must not be given on create",
            key
        ))
        .into()),
        None => Ok(()),
    }
}
