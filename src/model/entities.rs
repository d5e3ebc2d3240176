//! Relational entities.
//!
//! Entities never hold each other: relations are surrogate ids resolved
//! through the relational store (`publisher_id`, `branch_id`, ...). The
//! many-to-many Book ↔ Author relation lives in the store's join table and
//! does not appear on either struct.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Address, BookGenre, BookType, OrderStatus, PersonFields, SpecificationFields};
use crate::apikey::ApiKey;

/// Common surface of every table row.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Table name, used in error messages and logs.
    const TABLE: &'static str;

    fn api_key(&self) -> &ApiKey;
}

macro_rules! entity {
    ($ty:ty, $table:literal) => {
        impl Entity for $ty {
            const TABLE: &'static str = $table;

            fn api_key(&self) -> &ApiKey {
                &self.api_key
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub api_key: ApiKey,
    pub person: PersonFields,
    pub penname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub api_key: ApiKey,
    pub person: PersonFields,
    pub customer_number: String,
    pub registered_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    pub api_key: ApiKey,
    pub name: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub api_key: ApiKey,
    pub title: String,
    pub isbn: String,
    pub genre: BookGenre,
    pub book_type: BookType,
    pub publication_date: NaiveDate,
    pub publisher_id: Option<i64>,
}

/// A lendable physical copy held by a library branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Copy {
    pub api_key: ApiKey,
    pub specification: SpecificationFields,
    pub branch_id: i64,
    pub shelf_location: String,
}

/// A book edition sold by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyableBook {
    pub api_key: ApiKey,
    pub specification: SpecificationFields,
    pub price_cents: u64,
    pub stock: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub api_key: ApiKey,
    pub name: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub api_key: ApiKey,
    pub library_id: i64,
    pub name: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrowing {
    pub api_key: ApiKey,
    pub copy_id: i64,
    pub customer_id: i64,
    pub borrowed_on: NaiveDate,
    pub due_on: NaiveDate,
    pub returned_on: Option<NaiveDate>,
}

impl Borrowing {
    pub fn is_open(&self) -> bool {
        self.returned_on.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub api_key: ApiKey,
    pub customer_id: i64,
    pub item_ids: Vec<i64>,
    pub ordered_on: NaiveDate,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub api_key: ApiKey,
    pub customer_id: i64,
    pub library_id: i64,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
}

entity!(Author, "authors");
entity!(Customer, "customers");
entity!(Publisher, "publishers");
entity!(Book, "books");
entity!(Copy, "copies");
entity!(BuyableBook, "buyable_books");
entity!(Library, "libraries");
entity!(Branch, "branches");
entity!(Borrowing, "borrowings");
entity!(Order, "orders");
entity!(Subscription, "subscriptions");

/// A book together with everything the document shapes need about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookGraph {
    pub book: Book,
    pub authors: Vec<Author>,
    pub publisher: Option<Publisher>,
}

/// An author together with the books they wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorGraph {
    pub author: Author,
    pub books: Vec<Book>,
}
