//! Catalog service
//!
//! Command handling for the entities that live only in the relational
//! store: publishers, libraries and their branches, customers, library
//! copies, store editions, borrowings, orders and subscriptions.
//!
//! Deletes follow one rule: a row that something else still points at is
//! not deleted, and the caller gets a referential conflict naming the
//! dependants.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::apikey::{self, ApiKey};
use crate::error::{Error, Result};
use crate::model::commands::date_range;
use crate::model::values::{parse_date, parse_keys, require};
use crate::model::{
    Address, Book, BookType, Borrowing, BorrowingCommand, Branch, BranchCommand, BuyableBook,
    BuyableBookCommand, Copy, CopyCommand, Customer, CustomerCommand, Library, LibraryCommand,
    Order, OrderCommand, OrderStatus, PersonFields, Publisher, PublisherCommand,
    SpecificationFields, Subscription, SubscriptionCommand, ValidationError,
};
use crate::relational::{RelationalStore, Tables};

fn required_address(address: &Option<Address>) -> std::result::Result<Address, ValidationError> {
    address
        .clone()
        .ok_or(ValidationError::EmptyField("address"))?
        .validated()
}

fn parse_key(raw: &str) -> Result<ApiKey> {
    Ok(ApiKey::parse(raw)?)
}

fn conflict(what: &str, key: &ApiKey, dependants: &[(usize, &str)]) -> Result<()> {
    let parts: Vec<String> = dependants
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, name)| format!("{} {}", count, name))
        .collect();
    if parts.is_empty() {
        Ok(())
    } else {
        Err(Error::ReferentialConflict(format!(
            "{} {} is referenced by {}",
            what,
            key,
            parts.join(" and ")
        )))
    }
}

/// Checks every constraint of an order, then takes one unit of stock per
/// item and inserts the order row.
fn place_order(
    t: &mut Tables,
    api_key: ApiKey,
    customer_key: &ApiKey,
    item_keys: &[ApiKey],
    ordered_on: NaiveDate,
    status: OrderStatus,
) -> Result<Order> {
    if t.orders.id_of(&api_key).is_ok() {
        return Err(Error::DuplicateKey {
            collection: "orders".to_string(),
            index: "api_key".to_string(),
            key: api_key.into_string(),
        });
    }
    let customer_id = t.customers.id_of(customer_key)?;
    let item_ids = item_keys
        .iter()
        .map(|k| t.buyable_books.id_of(k))
        .collect::<Result<Vec<_>>>()?;

    let mut needed: BTreeMap<i64, u32> = BTreeMap::new();
    for id in &item_ids {
        *needed.entry(*id).or_default() += 1;
    }
    for (id, count) in &needed {
        let edition = t
            .buyable_books
            .get(*id)
            .ok_or_else(|| Error::NotFound(format!("buyable_books #{}", id)))?;
        if edition.stock < *count {
            return Err(ValidationError::Constraint(format!(
                "store edition {} has {} in stock, {} ordered",
                edition.api_key, edition.stock, count
            ))
            .into());
        }
    }

    for (id, count) in needed {
        if let Some(edition) = t.buyable_books.get(id).cloned() {
            let stock = edition.stock - count;
            t.buyable_books.replace(id, BuyableBook { stock, ..edition })?;
        }
    }
    let order = Order {
        api_key,
        customer_id,
        item_ids,
        ordered_on,
        status,
    };
    t.orders.insert(order.clone())?;
    Ok(order)
}

/// Relational-only command handling.
pub struct CatalogService {
    relational: Arc<RelationalStore>,
    key_length: usize,
}

impl CatalogService {
    pub fn new(relational: Arc<RelationalStore>, key_length: usize) -> Self {
        Self {
            relational,
            key_length,
        }
    }

    fn new_key(&self) -> ApiKey {
        apikey::generate(self.key_length)
    }

    // ===== Publishers =====

    pub fn create_publisher(&self, command: &PublisherCommand) -> Result<Publisher> {
        let publisher = Publisher {
            api_key: self.new_key(),
            name: require("name", &command.name)?,
            address: required_address(&command.address)?,
        };
        self.relational.write(|t| {
            t.publishers.insert(publisher.clone())?;
            Ok(())
        })?;
        info!(api_key = %publisher.api_key, "Created publisher");
        Ok(publisher)
    }

    /// Deletes a publisher no book is published by.
    pub fn delete_publisher(&self, key: &ApiKey) -> Result<Publisher> {
        self.relational.write(|t| {
            let id = t.publishers.id_of(key)?;
            let books = t
                .books
                .values()
                .filter(|b| b.publisher_id == Some(id))
                .count();
            conflict("publisher", key, &[(books, "book(s)")])?;
            t.publishers
                .remove(id)
                .ok_or_else(|| Error::NotFound(format!("publishers {}", key)))
        })
    }

    // ===== Libraries and branches =====

    pub fn create_library(&self, command: &LibraryCommand) -> Result<Library> {
        let library = Library {
            api_key: self.new_key(),
            name: require("name", &command.name)?,
            address: required_address(&command.address)?,
        };
        self.relational.write(|t| {
            t.libraries.insert(library.clone())?;
            Ok(())
        })?;
        info!(api_key = %library.api_key, "Created library");
        Ok(library)
    }

    /// Renames or moves a library.
    pub fn update_library(&self, command: &LibraryCommand) -> Result<Library> {
        let key = parse_key(
            command
                .api_key
                .as_deref()
                .ok_or(ValidationError::EmptyField("api_key"))?,
        )?;
        let library = Library {
            api_key: key.clone(),
            name: require("name", &command.name)?,
            address: required_address(&command.address)?,
        };
        self.relational.write(|t| {
            let id = t.libraries.id_of(&key)?;
            t.libraries.replace(id, library.clone())?;
            Ok(library)
        })
    }

    pub fn delete_library(&self, key: &ApiKey) -> Result<Library> {
        self.relational.write(|t| {
            let id = t.libraries.id_of(key)?;
            let branches = t.branches.values().filter(|b| b.library_id == id).count();
            let subscriptions = t
                .subscriptions
                .values()
                .filter(|s| s.library_id == id)
                .count();
            conflict(
                "library",
                key,
                &[(branches, "branch(es)"), (subscriptions, "subscription(s)")],
            )?;
            t.libraries
                .remove(id)
                .ok_or_else(|| Error::NotFound(format!("libraries {}", key)))
        })
    }

    pub fn create_branch(&self, command: &BranchCommand) -> Result<Branch> {
        let library_key = parse_key(&command.library_key)?;
        let name = require("name", &command.name)?;
        let address = required_address(&command.address)?;
        let api_key = self.new_key();
        let branch = self.relational.write(|t| {
            let library_id = t.libraries.id_of(&library_key)?;
            let branch = Branch {
                api_key,
                library_id,
                name,
                address,
            };
            t.branches.insert(branch.clone())?;
            Ok(branch)
        })?;
        info!(api_key = %branch.api_key, library = %library_key, "Created branch");
        Ok(branch)
    }

    pub fn delete_branch(&self, key: &ApiKey) -> Result<Branch> {
        self.relational.write(|t| {
            let id = t.branches.id_of(key)?;
            let copies = t.copies.values().filter(|c| c.branch_id == id).count();
            conflict("branch", key, &[(copies, "copy(ies)")])?;
            t.branches
                .remove(id)
                .ok_or_else(|| Error::NotFound(format!("branches {}", key)))
        })
    }

    /// Branches of a library, by API key.
    pub fn branches_of(&self, library_key: &ApiKey) -> Vec<Branch> {
        self.relational.read(|t| {
            let Some((library_id, _)) = t.libraries.get_by_key(library_key) else {
                return Vec::new();
            };
            t.branches
                .values()
                .filter(|b| b.library_id == library_id)
                .cloned()
                .collect()
        })
    }

    // ===== Customers =====

    pub fn create_customer(&self, command: &CustomerCommand) -> Result<Customer> {
        let customer = Customer {
            api_key: self.new_key(),
            person: PersonFields::new(
                &command.first_name,
                &command.last_name,
                &command.email,
                command.addresses.clone(),
            )?,
            customer_number: require("customer_number", &command.customer_number)?,
            registered_on: parse_date("registered_on", &command.registered_on)?,
        };
        self.relational.write(|t| {
            if t
                .customers
                .values()
                .any(|c| c.customer_number == customer.customer_number)
            {
                return Err(ValidationError::Constraint(format!(
                    "customer number {} is already taken",
                    customer.customer_number
                ))
                .into());
            }
            t.customers.insert(customer.clone())?;
            Ok(())
        })?;
        info!(api_key = %customer.api_key, "Created customer");
        Ok(customer)
    }

    pub fn delete_customer(&self, key: &ApiKey) -> Result<Customer> {
        self.relational.write(|t| {
            let id = t.customers.id_of(key)?;
            let borrowings = t
                .borrowings
                .values()
                .filter(|b| b.customer_id == id)
                .count();
            let orders = t.orders.values().filter(|o| o.customer_id == id).count();
            let subscriptions = t
                .subscriptions
                .values()
                .filter(|s| s.customer_id == id)
                .count();
            conflict(
                "customer",
                key,
                &[
                    (borrowings, "borrowing(s)"),
                    (orders, "order(s)"),
                    (subscriptions, "subscription(s)"),
                ],
            )?;
            t.customers
                .remove(id)
                .ok_or_else(|| Error::NotFound(format!("customers {}", key)))
        })
    }

    // ===== Copies and store editions =====

    pub fn create_copy(&self, command: &CopyCommand) -> Result<Copy> {
        let book_key = parse_key(&command.book_key)?;
        let branch_key = parse_key(&command.branch_key)?;
        let book_type = command.book_type.parse::<BookType>()?;
        let shelf_location = require("shelf_location", &command.shelf_location)?;
        let api_key = self.new_key();

        let copy = self.relational.write(|t| {
            let book_id = t.books.id_of(&book_key)?;
            let branch_id = t.branches.id_of(&branch_key)?;
            let copy = Copy {
                api_key,
                specification: SpecificationFields { book_id, book_type },
                branch_id,
                shelf_location,
            };
            t.copies.insert(copy.clone())?;
            Ok(copy)
        })?;
        info!(api_key = %copy.api_key, book = %book_key, "Created copy");
        Ok(copy)
    }

    /// Deletes a copy that has never been lent out.
    pub fn delete_copy(&self, key: &ApiKey) -> Result<Copy> {
        self.relational.write(|t| {
            let id = t.copies.id_of(key)?;
            let borrowings = t.borrowings.values().filter(|b| b.copy_id == id).count();
            conflict("copy", key, &[(borrowings, "borrowing(s)")])?;
            t.copies
                .remove(id)
                .ok_or_else(|| Error::NotFound(format!("copies {}", key)))
        })
    }

    /// Library copies of a book.
    pub fn copies_of(&self, book_key: &ApiKey) -> Vec<Copy> {
        self.relational.read(|t| {
            let Some((book_id, _)) = t.books.get_by_key(book_key) else {
                return Vec::new();
            };
            t.copies
                .values()
                .filter(|c| c.specification.book_id == book_id)
                .cloned()
                .collect()
        })
    }

    pub fn create_buyable_book(&self, command: &BuyableBookCommand) -> Result<BuyableBook> {
        let book_key = parse_key(&command.book_key)?;
        let book_type = command.book_type.parse::<BookType>()?;
        if command.price_cents == 0 {
            return Err(ValidationError::Constraint("price must be positive".to_string()).into());
        }
        let api_key = self.new_key();

        let edition = self.relational.write(|t| {
            let book_id = t.books.id_of(&book_key)?;
            let edition = BuyableBook {
                api_key,
                specification: SpecificationFields { book_id, book_type },
                price_cents: command.price_cents,
                stock: command.stock,
            };
            t.buyable_books.insert(edition.clone())?;
            Ok(edition)
        })?;
        info!(api_key = %edition.api_key, book = %book_key, "Created store edition");
        Ok(edition)
    }

    /// Deletes a store edition no order contains.
    pub fn delete_buyable_book(&self, key: &ApiKey) -> Result<BuyableBook> {
        self.relational.write(|t| {
            let id = t.buyable_books.id_of(key)?;
            let orders = t
                .orders
                .values()
                .filter(|o| o.item_ids.contains(&id))
                .count();
            conflict("store edition", key, &[(orders, "order(s)")])?;
            t.buyable_books
                .remove(id)
                .ok_or_else(|| Error::NotFound(format!("buyable_books {}", key)))
        })
    }

    // ===== Borrowings =====

    /// Lends a copy to a customer. A copy can only be out once at a time.
    #[instrument(skip(self, command), fields(copy = %command.copy_key))]
    pub fn create_borrowing(&self, command: &BorrowingCommand) -> Result<Borrowing> {
        let copy_key = parse_key(&command.copy_key)?;
        let customer_key = parse_key(&command.customer_key)?;
        let (borrowed_on, due_on) =
            date_range("borrowed_on", &command.borrowed_on, "due_on", &command.due_on)?;
        let api_key = self.new_key();

        let borrowing = self.relational.write(|t| {
            let copy_id = t.copies.id_of(&copy_key)?;
            let customer_id = t.customers.id_of(&customer_key)?;
            if t
                .borrowings
                .values()
                .any(|b| b.copy_id == copy_id && b.is_open())
            {
                return Err(ValidationError::Constraint(format!(
                    "copy {} is already lent out",
                    copy_key
                ))
                .into());
            }
            let borrowing = Borrowing {
                api_key,
                copy_id,
                customer_id,
                borrowed_on,
                due_on,
                returned_on: None,
            };
            t.borrowings.insert(borrowing.clone())?;
            Ok(borrowing)
        })?;
        info!(api_key = %borrowing.api_key, "Created borrowing");
        Ok(borrowing)
    }

    /// Marks a borrowing as returned on `returned_on` (`YYYY-MM-DD`).
    pub fn return_borrowing(&self, key: &ApiKey, returned_on: &str) -> Result<Borrowing> {
        let returned_on = parse_date("returned_on", returned_on)?;
        self.relational.write(|t| {
            let id = t.borrowings.id_of(key)?;
            let mut borrowing = t
                .borrowings
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("borrowings {}", key)))?;
            if !borrowing.is_open() {
                return Err(ValidationError::Constraint(format!(
                    "borrowing {} was already returned",
                    key
                ))
                .into());
            }
            if returned_on < borrowing.borrowed_on {
                return Err(ValidationError::Constraint(format!(
                    "returned_on ({}) is before borrowed_on ({})",
                    returned_on, borrowing.borrowed_on
                ))
                .into());
            }
            borrowing.returned_on = Some(returned_on);
            t.borrowings.replace(id, borrowing.clone())?;
            debug!(api_key = %key, "Returned borrowing");
            Ok(borrowing)
        })
    }

    pub fn delete_borrowing(&self, key: &ApiKey) -> Result<Borrowing> {
        self.relational.write(|t| {
            let id = t.borrowings.id_of(key)?;
            t.borrowings
                .remove(id)
                .ok_or_else(|| Error::NotFound(format!("borrowings {}", key)))
        })
    }

    /// Books a customer currently has out.
    pub fn borrowed_books(&self, customer_key: &ApiKey) -> Vec<Book> {
        self.relational.read(|t| {
            let Some((customer_id, _)) = t.customers.get_by_key(customer_key) else {
                return Vec::new();
            };
            t.borrowings
                .values()
                .filter(|b| b.customer_id == customer_id && b.is_open())
                .filter_map(|b| t.copies.get(b.copy_id))
                .filter_map(|c| t.books.get(c.specification.book_id).cloned())
                .collect()
        })
    }

    // ===== Orders =====

    /// Places an order. Each item takes one unit of stock.
    #[instrument(skip(self, command), fields(customer = %command.customer_key))]
    pub fn create_order(&self, command: &OrderCommand) -> Result<Order> {
        let customer_key = parse_key(&command.customer_key)?;
        let item_keys = parse_keys(&command.item_keys)?;
        if item_keys.is_empty() {
            return Err(ValidationError::EmptyField("item_keys").into());
        }
        let ordered_on = parse_date("ordered_on", &command.ordered_on)?;
        let status = if command.status.trim().is_empty() {
            OrderStatus::Placed
        } else {
            command.status.parse::<OrderStatus>()?
        };
        let api_key = self.new_key();

        let order = self.relational.write(|t| {
            place_order(t, api_key, &customer_key, &item_keys, ordered_on, status)
        })?;
        info!(api_key = %order.api_key, items = order.item_ids.len(), "Placed order");
        Ok(order)
    }

    pub fn update_order_status(&self, key: &ApiKey, status: &str) -> Result<Order> {
        let status = status.parse::<OrderStatus>()?;
        self.relational.write(|t| {
            let id = t.orders.id_of(key)?;
            let order = t
                .orders
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("orders {}", key)))?;
            let order = Order { status, ..order };
            t.orders.replace(id, order.clone())?;
            Ok(order)
        })
    }

    // ===== Subscriptions =====

    pub fn create_subscription(&self, command: &SubscriptionCommand) -> Result<Subscription> {
        let customer_key = parse_key(&command.customer_key)?;
        let library_key = parse_key(&command.library_key)?;
        let (valid_from, valid_until) = date_range(
            "valid_from",
            &command.valid_from,
            "valid_until",
            &command.valid_until,
        )?;
        let api_key = self.new_key();

        let subscription = self.relational.write(|t| {
            let customer_id = t.customers.id_of(&customer_key)?;
            let library_id = t.libraries.id_of(&library_key)?;
            let subscription = Subscription {
                api_key,
                customer_id,
                library_id,
                valid_from,
                valid_until,
            };
            t.subscriptions.insert(subscription.clone())?;
            Ok(subscription)
        })?;
        info!(api_key = %subscription.api_key, "Created subscription");
        Ok(subscription)
    }

    pub fn delete_subscription(&self, key: &ApiKey) -> Result<Subscription> {
        self.relational.write(|t| {
            let id = t.subscriptions.id_of(key)?;
            t.subscriptions
                .remove(id)
                .ok_or_else(|| Error::NotFound(format!("subscriptions {}", key)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuthorCommand, BookCommand};

    fn address() -> Option<Address> {
        Some(Address::new("Ring", "1", "1010", "Vienna", "AT").unwrap())
    }

    struct Fixture {
        catalog: CatalogService,
        relational: Arc<RelationalStore>,
        book: ApiKey,
        branch: ApiKey,
        customer: ApiKey,
    }

    fn fixture() -> Fixture {
        let relational = Arc::new(RelationalStore::new());
        let catalog = CatalogService::new(relational.clone(), 30);

        let author = AuthorCommand {
            first_name: "Dora".into(),
            last_name: "Dada".into(),
            email: "mail@mail.com".into(),
            penname: "dada".into(),
            ..Default::default()
        }
        .build(apikey::generate(30))
        .unwrap();
        let author = relational.insert_author(author).unwrap();
        let draft = BookCommand {
            title: "Book".into(),
            isbn: "1".into(),
            genre: "MY".into(),
            book_type: "P".into(),
            publication_date: "2020-01-01".into(),
            author_keys: vec![author.api_key.to_string()],
            ..Default::default()
        }
        .build(apikey::generate(30))
        .unwrap();
        let book = relational.insert_book(draft).unwrap().book.api_key;

        let library = catalog
            .create_library(&LibraryCommand {
                name: "City".into(),
                address: address(),
                ..Default::default()
            })
            .unwrap();
        let branch = catalog
            .create_branch(&BranchCommand {
                library_key: library.api_key.to_string(),
                name: "North".into(),
                address: address(),
                ..Default::default()
            })
            .unwrap()
            .api_key;
        let customer = catalog
            .create_customer(&CustomerCommand {
                first_name: "Cee".into(),
                last_name: "Reader".into(),
                email: "c@reader.io".into(),
                customer_number: "C-1".into(),
                registered_on: "2024-01-01".into(),
                ..Default::default()
            })
            .unwrap()
            .api_key;

        Fixture {
            catalog,
            relational,
            book,
            branch,
            customer,
        }
    }

    #[test]
    fn test_copy_blocks_book_and_branch_delete() {
        let f = fixture();
        let copy = f
            .catalog
            .create_copy(&CopyCommand {
                book_key: f.book.to_string(),
                book_type: "P".into(),
                branch_key: f.branch.to_string(),
                shelf_location: "A-1".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(f.catalog.copies_of(&f.book).len(), 1);

        assert!(matches!(
            f.relational.delete_book(&f.book),
            Err(Error::ReferentialConflict(_))
        ));
        assert!(matches!(
            f.catalog.delete_branch(&f.branch),
            Err(Error::ReferentialConflict(_))
        ));

        f.catalog.delete_copy(&copy.api_key).unwrap();
        f.catalog.delete_branch(&f.branch).unwrap();
    }

    #[test]
    fn test_borrowing_lifecycle() {
        let f = fixture();
        let copy = f
            .catalog
            .create_copy(&CopyCommand {
                book_key: f.book.to_string(),
                book_type: "P".into(),
                branch_key: f.branch.to_string(),
                shelf_location: "A-1".into(),
                ..Default::default()
            })
            .unwrap();
        let command = BorrowingCommand {
            copy_key: copy.api_key.to_string(),
            customer_key: f.customer.to_string(),
            borrowed_on: "2024-02-01".into(),
            due_on: "2024-02-15".into(),
            ..Default::default()
        };
        let borrowing = f.catalog.create_borrowing(&command).unwrap();
        assert_eq!(f.catalog.borrowed_books(&f.customer).len(), 1);

        assert!(matches!(
            f.catalog.create_borrowing(&command),
            Err(Error::Validation(ValidationError::Constraint(_)))
        ));
        assert!(matches!(
            f.catalog.delete_customer(&f.customer),
            Err(Error::ReferentialConflict(_))
        ));

        let returned = f
            .catalog
            .return_borrowing(&borrowing.api_key, "2024-02-10")
            .unwrap();
        assert!(!returned.is_open());
        assert!(f.catalog.borrowed_books(&f.customer).is_empty());
        assert!(f.catalog.create_borrowing(&command).is_ok());
    }

    #[test]
    fn test_borrowing_rejects_inverted_dates() {
        let f = fixture();
        let result = f.catalog.create_borrowing(&BorrowingCommand {
            copy_key: "abc".into(),
            customer_key: f.customer.to_string(),
            borrowed_on: "2024-02-15".into(),
            due_on: "2024-02-01".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_order_takes_stock() {
        let f = fixture();
        let edition = f
            .catalog
            .create_buyable_book(&BuyableBookCommand {
                book_key: f.book.to_string(),
                book_type: "E".into(),
                price_cents: 999,
                stock: 2,
                ..Default::default()
            })
            .unwrap();
        let command = OrderCommand {
            customer_key: f.customer.to_string(),
            item_keys: vec![edition.api_key.to_string(), edition.api_key.to_string()],
            ordered_on: "2024-03-01".into(),
            ..Default::default()
        };
        let order = f.catalog.create_order(&command).unwrap();
        assert_eq!(order.status, OrderStatus::Placed);
        assert!(matches!(
            f.catalog.create_order(&command),
            Err(Error::Validation(ValidationError::Constraint(_)))
        ));

        let shipped = f
            .catalog
            .update_order_status(&order.api_key, "SHIPPED")
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert!(matches!(
            f.catalog.delete_buyable_book(&edition.api_key),
            Err(Error::ReferentialConflict(_))
        ));
    }

    #[test]
    fn test_order_with_taken_key_leaves_stock_alone() {
        let f = fixture();
        let edition = f
            .catalog
            .create_buyable_book(&BuyableBookCommand {
                book_key: f.book.to_string(),
                book_type: "E".into(),
                price_cents: 999,
                stock: 3,
                ..Default::default()
            })
            .unwrap();
        let key = apikey::generate(30);
        let items = vec![edition.api_key.clone()];
        let day = parse_date("ordered_on", "2024-03-01").unwrap();

        f.relational
            .write(|t| place_order(t, key.clone(), &f.customer, &items, day, OrderStatus::Placed))
            .unwrap();
        let err = f
            .relational
            .write(|t| place_order(t, key.clone(), &f.customer, &items, day, OrderStatus::Placed))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));

        let stock = f.relational.read(|t| {
            t.buyable_books
                .get_by_key(&edition.api_key)
                .map(|(_, b)| b.stock)
        });
        assert_eq!(stock, Some(2));
        assert_eq!(f.relational.read(|t| t.orders.len()), 1);
    }

    #[test]
    fn test_library_with_branch_cannot_be_deleted() {
        let f = fixture();
        let library = f.relational.read(|t| {
            let branch = t.branches.get_by_key(&f.branch).map(|(_, b)| b.library_id);
            branch.and_then(|id| t.libraries.get(id).map(|l| l.api_key.clone()))
        });
        let library = library.unwrap();
        assert_eq!(f.catalog.branches_of(&library).len(), 1);
        assert!(matches!(
            f.catalog.delete_library(&library),
            Err(Error::ReferentialConflict(_))
        ));
    }

    #[test]
    fn test_duplicate_customer_number_rejected() {
        let f = fixture();
        let result = f.catalog.create_customer(&CustomerCommand {
            first_name: "Other".into(),
            last_name: "Reader".into(),
            email: "o@reader.io".into(),
            customer_number: "C-1".into(),
            registered_on: "2024-01-02".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_publisher_delete_then_not_found() {
        let f = fixture();
        let publisher = f
            .catalog
            .create_publisher(&PublisherCommand {
                name: "Press".into(),
                address: address(),
                ..Default::default()
            })
            .unwrap();
        assert!(f.catalog.delete_publisher(&publisher.api_key).is_ok());
        assert!(matches!(
            f.catalog.delete_publisher(&publisher.api_key),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_subscription_requires_customer_and_library() {
        let f = fixture();
        let result = f.catalog.create_subscription(&SubscriptionCommand {
            customer_key: f.customer.to_string(),
            library_key: "zzz".into(),
            valid_from: "2024-01-01".into(),
            valid_until: "2024-12-31".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
