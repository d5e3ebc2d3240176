//! Relational store
//!
//! # Architecture
//!
//! ```text
//! RelationalStore
//!   └─→ RwLock<Tables>
//!        ├─→ Table<Author>   id → row, api_key → id (unique)
//!        ├─→ Table<Book>     publisher_id → Table<Publisher>
//!        ├─→ JoinTable       book id ↔ author id
//!        └─→ Table<Copy>, Table<Branch>, Table<Borrowing>, ...
//! ```
//!
//! Surrogate ids stay inside this module and the entities; everything that
//! leaves the crate is addressed by API key.

pub mod store;
pub mod table;

pub use store::{BookUpdate, RelationalStore, Tables};
pub use table::{JoinTable, Table};
