//! Document store
//!
//! Schemaless collections of [`Datum`] objects with multikey secondary
//! indexes. Both mirrored layouts (referencing and embedding) live here as
//! separate collections of the same engine.
//!
//! # Example
//!
//! ```rust
//! use bookmirror::document::{Datum, DocumentStore, Filter};
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let store = DocumentStore::in_memory();
//! store
//!     .insert_one("books", Datum::from(json!({"api_key": "k", "genre": "MY"})))
//!     .await
//!     .unwrap();
//! let hit = store.find_one("books", &Filter::eq("genre", "MY")).await.unwrap();
//! assert!(hit.is_some());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
//! # }
//! ```

pub mod datum;
pub mod engine;
pub mod index;
pub mod memory;
pub mod query;

pub use datum::Datum;
pub use engine::{DocumentEngine, DocumentStore, IndexCreation};
pub use index::{IndexDescriptor, IndexField, IndexStats, SortOrder};
pub use memory::MemoryDocumentEngine;
pub use query::{Filter, FindOptions, QueryPlan, Sort, WriteOutcome};
