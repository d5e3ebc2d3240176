// Bookmirror - Rust Implementation
// A relational library catalog mirrored into two document-store layouts

#![warn(rust_2018_idioms)]

pub mod apikey;
pub mod bench;
pub mod catalog;
pub mod config;
pub mod document;
pub mod index;
pub mod mapper;
pub mod metrics;
pub mod model;
pub mod relational;
pub mod sync;

// Re-exports for convenience
pub use apikey::ApiKey;
pub use config::MirrorConfig;
pub use document::{Datum, DocumentStore, MemoryDocumentEngine};
pub use index::IndexManager;
pub use relational::RelationalStore;
pub use sync::{ResyncSummary, SyncReport, SyncService, SyncState};

/// Bookmirror error types
pub mod error {
    use crate::model::ValidationError;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Validation error: {0}")]
        Validation(#[from] ValidationError),

        #[error("Not found: {0}")]
        NotFound(String),

        #[error("Referential conflict: {0}")]
        ReferentialConflict(String),

        #[error("Duplicate key {key} in {collection} (index {index})")]
        DuplicateKey {
            collection: String,
            index: String,
            key: String,
        },

        #[error("Index conflict: {0}")]
        IndexConflict(String),

        #[error("Document store error: {0}")]
        Document(String),

        #[error("Serialization error: {0}")]
        Serialization(String),

        #[error("Configuration error: {0}")]
        Config(String),
    }

    impl From<serde_json::Error> for Error {
        fn from(e: serde_json::Error) -> Self {
            Error::Serialization(e.to_string())
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
