//! Configuration
//!
//! One [`MirrorConfig`] is built at startup and handed to the services that
//! need it. Values come from, in increasing priority:
//!
//! 1. `Default` impls below
//! 2. an optional TOML file
//! 3. environment variables prefixed `BOOKMIRROR__`, sections separated by
//!    `__` (e.g. `BOOKMIRROR__SYNC__SERIALIZE_AUTHOR_FANOUT=true`)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::apikey;
use crate::error::{Error, Result};

/// Names of the mirrored document collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionNames {
    pub authors: String,
    pub books: String,
    pub books_with_embedded_authors: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            authors: "authors".to_string(),
            books: "books".to_string(),
            books_with_embedded_authors: "books_with_embedded_authors".to_string(),
        }
    }
}

impl CollectionNames {
    pub fn all(&self) -> [&str; 3] {
        [&self.authors, &self.books, &self.books_with_embedded_authors]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierConfig {
    /// Length of newly generated API keys.
    pub length: usize,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            length: apikey::DEFAULT_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Serialize concurrent fan-out loops of the same author.
    pub serialize_author_fanout: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Record counts to compare at, smallest first.
    pub scales: Vec<usize>,
    /// Calls per query and store.
    pub iterations: usize,
    /// Authors generated per scale, as a divisor of the book count.
    pub books_per_author: usize,
    pub seed: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            scales: vec![100, 1_000, 10_000],
            iterations: 100,
            books_per_author: 5,
            seed: 42,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub collections: CollectionNames,
    pub identifiers: IdentifierConfig,
    pub sync: SyncConfig,
    pub bench: BenchConfig,
}

impl MirrorConfig {
    /// Loads configuration from an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("BOOKMIRROR")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("bench.scales")
                .try_parsing(true),
        );

        let config: MirrorConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.identifiers.length == 0 {
            return Err(Error::Config("identifiers.length must be positive".to_string()));
        }
        let names = self.collections.all();
        if names.iter().any(|n| n.is_empty()) {
            return Err(Error::Config("collection names must not be empty".to_string()));
        }
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(Error::Config("collection names must be distinct".to_string()));
        }
        if self.bench.iterations == 0 || self.bench.books_per_author == 0 {
            return Err(Error::Config(
                "bench.iterations and bench.books_per_author must be positive".to_string(),
            ));
        }
        if self.bench.scales.contains(&0) {
            return Err(Error::Config("bench.scales must be positive".to_string()));
        }
        Ok(())
    }

    /// Renders the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
