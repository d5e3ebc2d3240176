//! Measurements and comparison reports.

use serde::Serialize;
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::fmt::{self, Write as _};
use std::time::Duration;

/// The three representations under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Relational,
    Referencing,
    Embedding,
}

impl StoreKind {
    pub const ALL: [StoreKind; 3] = [
        StoreKind::Relational,
        StoreKind::Referencing,
        StoreKind::Embedding,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StoreKind::Relational => "relational",
            StoreKind::Referencing => "referencing",
            StoreKind::Embedding => "embedding",
        }
    }
}

/// The fixed query battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// One book by API key.
    PointLookup,
    /// Books of one author (relationship membership).
    ByAuthor,
    /// Books of one genre.
    ByGenre,
    /// Every book ordered by title.
    ScanSortedByTitle,
}

impl QueryKind {
    pub const ALL: [QueryKind; 4] = [
        QueryKind::PointLookup,
        QueryKind::ByAuthor,
        QueryKind::ByGenre,
        QueryKind::ScanSortedByTitle,
    ];

    pub fn label(self) -> &'static str {
        match self {
            QueryKind::PointLookup => "point_lookup",
            QueryKind::ByAuthor => "by_author",
            QueryKind::ByGenre => "by_genre",
            QueryKind::ScanSortedByTitle => "scan_sorted_by_title",
        }
    }
}

/// Timings of one query against one store.
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub store: StoreKind,
    pub query: QueryKind,
    /// Rows returned by the last call, to check stores agree.
    pub rows: usize,
    samples: Vec<f64>,
}

impl Measurement {
    pub fn new(store: StoreKind, query: QueryKind) -> Self {
        Self {
            store,
            query,
            rows: 0,
            samples: Vec::new(),
        }
    }

    pub fn record(&mut self, elapsed: Duration, rows: usize) {
        self.samples.push(elapsed.as_secs_f64());
        self.rows = rows;
    }

    pub fn calls(&self) -> usize {
        self.samples.len()
    }

    pub fn total(&self) -> Duration {
        Duration::from_secs_f64(self.samples.iter().sum())
    }

    /// Mean seconds per call.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().mean()
    }

    pub fn median(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        Data::new(self.samples.clone()).median()
    }

    pub fn p95(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        Data::new(self.samples.clone()).percentile(95)
    }

    pub fn std_dev(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        self.samples.iter().std_dev()
    }
}

/// All measurements of one phase (with or without indexes).
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub indexed: bool,
    pub measurements: Vec<Measurement>,
}

impl PhaseReport {
    pub fn get(&self, store: StoreKind, query: QueryKind) -> Option<&Measurement> {
        self.measurements
            .iter()
            .find(|m| m.store == store && m.query == query)
    }
}

/// Baseline average over indexed average for one store and query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Speedup {
    pub store: StoreKind,
    pub query: QueryKind,
    pub baseline: f64,
    pub indexed: f64,
    pub ratio: f64,
}

/// Both phases at one scale.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub scale: usize,
    pub iterations: usize,
    pub unindexed: PhaseReport,
    pub indexed: PhaseReport,
}

impl ComparisonReport {
    pub fn speedups(&self) -> Vec<Speedup> {
        self.unindexed
            .measurements
            .iter()
            .filter_map(|base| {
                let indexed = self.indexed.get(base.store, base.query)?;
                let (baseline, with_index) = (base.average(), indexed.average());
                let ratio = if with_index > 0.0 {
                    baseline / with_index
                } else {
                    f64::INFINITY
                };
                Some(Speedup {
                    store: base.store,
                    query: base.query,
                    baseline,
                    indexed: with_index,
                    ratio,
                })
            })
            .collect()
    }

    pub fn speedup(&self, store: StoreKind, query: QueryKind) -> Option<Speedup> {
        self.speedups()
            .into_iter()
            .find(|s| s.store == store && s.query == query)
    }

    /// Renders the report as an aligned text table.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "scale {} ({} calls per query and store)",
            self.scale, self.iterations
        );
        let _ = writeln!(
            out,
            "{:<22} {:<12} {:>7} {:>12} {:>12} {:>12} {:>12} {:>9}",
            "query", "store", "rows", "avg", "p95", "avg idx", "p95 idx", "speedup"
        );
        for speedup in self.speedups() {
            let (Some(base), Some(indexed)) = (
                self.unindexed.get(speedup.store, speedup.query),
                self.indexed.get(speedup.store, speedup.query),
            ) else {
                continue;
            };
            let _ = writeln!(
                out,
                "{:<22} {:<12} {:>7} {:>12} {:>12} {:>12} {:>12} {:>8.2}x",
                speedup.query.label(),
                speedup.store.label(),
                indexed.rows,
                Seconds(base.average()),
                Seconds(base.p95()),
                Seconds(indexed.average()),
                Seconds(indexed.p95()),
                speedup.ratio
            );
        }
        out
    }
}

/// Human-readable duration in seconds.
struct Seconds(f64);

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        let text = if s >= 1.0 {
            format!("{:.3}s", s)
        } else if s >= 1e-3 {
            format!("{:.3}ms", s * 1e3)
        } else {
            format!("{:.3}µs", s * 1e6)
        };
        f.pad(&text)
    }
}
