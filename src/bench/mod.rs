//! Performance comparison harness
//!
//! Measures the same query battery against the relational store and both
//! document layouts, first with every secondary index dropped and then with
//! the catalog declared, at one or more data scales.
//!
//! # Phases (per scale)
//!
//! ```text
//! cleanup ─→ seed (rows + raw documents) ─→ drop indexes ─→ battery
//!                                        ─→ ensure indexes ─→ battery
//! ```
//!
//! Seeding writes rows and documents directly; it does not go through the
//! sync service. Phases run one after another on the calling task so
//! timings never overlap.

pub mod data;
pub mod report;

pub use data::{Dataset, BENCH_GENRES};
pub use report::{ComparisonReport, Measurement, PhaseReport, QueryKind, Speedup, StoreKind};

use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::config::MirrorConfig;
use crate::document::{Datum, DocumentStore, Filter, FindOptions, SortOrder};
use crate::error::Result;
use crate::index::IndexManager;
use crate::mapper;
use crate::metrics;
use crate::relational::RelationalStore;

/// Drives the comparison.
pub struct Harness {
    relational: Arc<RelationalStore>,
    documents: Arc<DocumentStore>,
    indexes: IndexManager,
    config: MirrorConfig,
}

impl Harness {
    pub fn new(
        relational: Arc<RelationalStore>,
        documents: Arc<DocumentStore>,
        config: MirrorConfig,
    ) -> Self {
        let indexes = IndexManager::new(documents.clone(), &config.collections);
        Self {
            relational,
            documents,
            indexes,
            config,
        }
    }

    /// Harness over fresh in-memory stores.
    pub fn in_memory(config: MirrorConfig) -> Self {
        Self::new(
            Arc::new(RelationalStore::new()),
            Arc::new(DocumentStore::in_memory()),
            config,
        )
    }

    pub fn index_manager(&self) -> &IndexManager {
        &self.indexes
    }

    /// Empties all three stores.
    pub async fn cleanup(&self) -> Result<()> {
        self.relational.clear();
        for collection in self.config.collections.all() {
            self.documents.drop_collection(collection).await?;
        }
        debug!("Cleaned up all stores");
        Ok(())
    }

    /// Writes `dataset` into every store.
    #[instrument(skip(self, dataset), fields(books = dataset.books.len()))]
    pub async fn seed(&self, dataset: &Dataset) -> Result<()> {
        for author in &dataset.authors {
            self.relational.insert_author(author.clone())?;
        }

        let mut books = Vec::with_capacity(dataset.books.len());
        let mut embedded = Vec::with_capacity(dataset.books.len());
        for draft in &dataset.books {
            let graph = self.relational.insert_book(draft.clone())?;
            books.push(DocumentStore::to_datum(&mapper::book_to_referencing(&graph))?);
            embedded.push(DocumentStore::to_datum(&mapper::book_to_embedding(&graph))?);
        }

        let mut authors = Vec::with_capacity(dataset.authors.len());
        for author in &dataset.authors {
            if let Some(graph) = self.relational.author_graph(&author.api_key) {
                authors.push(DocumentStore::to_datum(&mapper::author_to_referencing(&graph))?);
            }
        }

        let collections = &self.config.collections;
        self.documents.insert_many(&collections.authors, authors).await?;
        self.documents.insert_many(&collections.books, books).await?;
        self.documents
            .insert_many(&collections.books_with_embedded_authors, embedded)
            .await?;
        Ok(())
    }

    /// Runs the battery `iterations` times per query and store.
    pub async fn run_battery(
        &self,
        dataset: &Dataset,
        indexed: bool,
        iterations: usize,
    ) -> Result<PhaseReport> {
        let mut measurements = Vec::new();
        for query in QueryKind::ALL {
            for store in StoreKind::ALL {
                let mut measurement = Measurement::new(store, query);
                for i in 0..iterations {
                    let start = Instant::now();
                    let rows = self.execute(dataset, store, query, i).await?;
                    let elapsed = start.elapsed();
                    measurement.record(elapsed, rows);
                    metrics::observe_bench_query(store.label(), query.label(), elapsed.as_secs_f64());
                }
                debug!(
                    store = store.label(),
                    query = query.label(),
                    indexed,
                    avg = measurement.average(),
                    "Measured"
                );
                measurements.push(measurement);
            }
        }
        Ok(PhaseReport {
            indexed,
            measurements,
        })
    }

    /// Runs both phases at one scale.
    #[instrument(skip(self))]
    pub async fn compare(&self, scale: usize) -> Result<ComparisonReport> {
        let bench = &self.config.bench;
        let dataset = Dataset::generate(
            scale,
            bench.books_per_author,
            self.config.identifiers.length,
            bench.seed,
        )?;

        self.cleanup().await?;
        self.seed(&dataset).await?;

        self.indexes.drop_all_indexes().await?;
        let unindexed = self.run_battery(&dataset, false, bench.iterations).await?;

        self.indexes.ensure_indexes().await?;
        let indexed = self.run_battery(&dataset, true, bench.iterations).await?;

        info!(scale, "Comparison finished");
        Ok(ComparisonReport {
            scale,
            iterations: bench.iterations,
            unindexed,
            indexed,
        })
    }

    /// Runs [`compare`](Self::compare) for each scale, smallest first, and
    /// leaves the stores empty afterwards.
    pub async fn run_scales(&self, scales: &[usize]) -> Result<Vec<ComparisonReport>> {
        let mut sorted = scales.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut reports = Vec::with_capacity(sorted.len());
        for scale in sorted {
            reports.push(self.compare(scale).await?);
        }
        self.cleanup().await?;
        Ok(reports)
    }

    /// One call of `query` against `store`. Returns the number of rows.
    async fn execute(
        &self,
        dataset: &Dataset,
        store: StoreKind,
        query: QueryKind,
        i: usize,
    ) -> Result<usize> {
        let collections = &self.config.collections;
        let rows = match store {
            StoreKind::Relational => match query {
                QueryKind::PointLookup => {
                    let found = dataset.book_key(i).and_then(|k| self.relational.book(k));
                    usize::from(black_box(found).is_some())
                }
                QueryKind::ByAuthor => match dataset.author_key(i) {
                    Some(key) => black_box(self.relational.books_by_author(key)).len(),
                    None => 0,
                },
                QueryKind::ByGenre => {
                    black_box(self.relational.books_by_genre(dataset.genre(i))).len()
                }
                QueryKind::ScanSortedByTitle => {
                    black_box(self.relational.books_sorted_by_title()).len()
                }
            },
            StoreKind::Referencing | StoreKind::Embedding => {
                let (collection, author_path) = match store {
                    StoreKind::Referencing => (&collections.books, "author_keys"),
                    _ => (&collections.books_with_embedded_authors, "authors.api_key"),
                };
                let (filter, options) = match query {
                    QueryKind::PointLookup => (
                        key_filter("api_key", dataset.book_key(i)),
                        FindOptions::default().limit(1),
                    ),
                    QueryKind::ByAuthor => (
                        key_filter(author_path, dataset.author_key(i)),
                        FindOptions::default(),
                    ),
                    QueryKind::ByGenre => (
                        Filter::eq("genre", dataset.genre(i).code()),
                        FindOptions::default(),
                    ),
                    QueryKind::ScanSortedByTitle => (
                        Filter::All,
                        FindOptions::sorted("title", SortOrder::Ascending),
                    ),
                };
                black_box(self.documents.find(collection, &filter, &options).await?).len()
            }
        };
        Ok(rows)
    }
}

fn key_filter(path: &str, key: Option<&crate::apikey::ApiKey>) -> Filter {
    match key {
        Some(key) => Filter::eq(path, key),
        None => Filter::Eq(path.to_string(), Datum::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BenchConfig;

    fn small_config() -> MirrorConfig {
        MirrorConfig {
            bench: BenchConfig {
                scales: vec![60],
                iterations: 3,
                books_per_author: 3,
                seed: 11,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stores_agree_on_row_counts() {
        let harness = Harness::in_memory(small_config());
        let report = harness.compare(60).await.unwrap();

        for phase in [&report.unindexed, &report.indexed] {
            assert_eq!(phase.measurements.len(), 12);
            for query in QueryKind::ALL {
                let rows: Vec<usize> = StoreKind::ALL
                    .iter()
                    .filter_map(|store| phase.get(*store, query))
                    .map(|m| m.rows)
                    .collect();
                assert!(rows.windows(2).all(|w| w[0] == w[1]), "{query:?}: {rows:?}");
            }
        }
        let scan = report
            .indexed
            .get(StoreKind::Embedding, QueryKind::ScanSortedByTitle)
            .unwrap();
        assert_eq!(scan.rows, 60);
    }

    #[tokio::test]
    async fn test_run_scales_cleans_up() {
        let harness = Harness::in_memory(small_config());
        let reports = harness.run_scales(&[40, 20, 40]).await.unwrap();
        assert_eq!(
            reports.iter().map(|r| r.scale).collect::<Vec<_>>(),
            vec![20, 40]
        );
        assert_eq!(harness.relational.book_count(), 0);
        assert!(harness.documents.list_collections().await.unwrap().is_empty());
    }
}
