//! Domain model
//!
//! # Layout
//!
//! ```text
//! values    Email, Address, PersonFields, SpecificationFields, ValidationError
//! enums     BookType (H/P/E), BookGenre (24 two-letter codes), OrderStatus
//! entities  rows of the relational store (Author, Book, Copy, ...)
//! commands  inbound carriers from the web layer
//! ```
//!
//! Person-like and edition-like entities share fields by composition:
//! `Author` and `Customer` both hold a `PersonFields`, `Copy` and
//! `BuyableBook` both hold a `SpecificationFields`.

pub mod commands;
pub mod entities;
pub mod enums;
pub mod values;

pub use commands::{
    AuthorCommand, BookCommand, BookDraft, BorrowingCommand, BranchCommand, BuyableBookCommand,
    CopyCommand, CustomerCommand, LibraryCommand, OrderCommand, PublisherCommand,
    SubscriptionCommand,
};
pub use entities::{
    Author, AuthorGraph, Book, BookGraph, Borrowing, Branch, BuyableBook, Copy, Customer, Entity,
    Library, Order, Publisher, Subscription,
};
pub use enums::{BookGenre, BookType, OrderStatus};
pub use values::{Address, Email, PersonFields, SpecificationFields, ValidationError};
