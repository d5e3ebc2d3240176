//! The relational store: source of truth for every entity.
//!
//! All tables sit behind one `RwLock`. Each public mutation takes the write
//! lock once, checks every constraint first and only then mutates, so a
//! rejected change leaves no trace.

use parking_lot::RwLock;
use tracing::debug;

use super::table::{JoinTable, Table};
use crate::apikey::ApiKey;
use crate::error::{Error, Result};
use crate::model::{
    Author, AuthorGraph, Book, BookDraft, BookGenre, BookGraph, Borrowing, Branch, BuyableBook,
    Copy, Customer, Library, Order, Publisher, Subscription,
};

/// Every table of the schema.
#[derive(Debug, Default)]
pub struct Tables {
    pub authors: Table<Author>,
    pub books: Table<Book>,
    /// book id → author id
    pub book_authors: JoinTable,
    pub publishers: Table<Publisher>,
    pub libraries: Table<Library>,
    pub branches: Table<Branch>,
    pub customers: Table<Customer>,
    pub copies: Table<Copy>,
    pub buyable_books: Table<BuyableBook>,
    pub borrowings: Table<Borrowing>,
    pub orders: Table<Order>,
    pub subscriptions: Table<Subscription>,
}

impl Tables {
    /// Loads the graph of the book with surrogate id `id`.
    pub fn book_graph(&self, id: i64) -> Option<BookGraph> {
        let book = self.books.get(id)?.clone();
        let authors = self
            .book_authors
            .rights_of(id)
            .into_iter()
            .filter_map(|aid| self.authors.get(aid).cloned())
            .collect();
        let publisher = book
            .publisher_id
            .and_then(|pid| self.publishers.get(pid).cloned());
        Some(BookGraph {
            book,
            authors,
            publisher,
        })
    }

    /// Loads the graph of the author with surrogate id `id`.
    pub fn author_graph(&self, id: i64) -> Option<AuthorGraph> {
        let author = self.authors.get(id)?.clone();
        let books = self
            .book_authors
            .lefts_of(id)
            .into_iter()
            .filter_map(|bid| self.books.get(bid).cloned())
            .collect();
        Some(AuthorGraph { author, books })
    }

    /// Resolves the relation keys of a draft to surrogate ids.
    fn resolve_book_relations(&self, draft: &BookDraft) -> Result<(Option<i64>, Vec<i64>)> {
        let publisher_id = draft
            .publisher
            .as_ref()
            .map(|key| self.publishers.id_of(key))
            .transpose()?;
        let author_ids = draft
            .authors
            .iter()
            .map(|key| self.authors.id_of(key))
            .collect::<Result<Vec<_>>>()?;
        Ok((publisher_id, author_ids))
    }

    fn clear(&mut self) {
        self.authors.clear();
        self.books.clear();
        self.book_authors.clear();
        self.publishers.clear();
        self.libraries.clear();
        self.branches.clear();
        self.customers.clear();
        self.copies.clear();
        self.buyable_books.clear();
        self.borrowings.clear();
        self.orders.clear();
        self.subscriptions.clear();
    }
}

/// Result of a book update: the new state plus the authors it had before.
#[derive(Debug, Clone)]
pub struct BookUpdate {
    pub graph: BookGraph,
    pub previous_authors: Vec<Author>,
}

/// In-process relational engine.
#[derive(Debug, Default)]
pub struct RelationalStore {
    tables: RwLock<Tables>,
}

impl RelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.read())
    }

    /// Runs `f` under the write lock.
    ///
    /// `f` must check its constraints before its first mutation: there is
    /// no undo log.
    pub fn write<R>(&self, f: impl FnOnce(&mut Tables) -> Result<R>) -> Result<R> {
        f(&mut self.tables.write())
    }

    // ===== Authors =====

    pub fn insert_author(&self, author: Author) -> Result<Author> {
        self.write(|t| {
            let id = t.authors.insert(author.clone())?;
            debug!(id, api_key = %author.api_key, "Inserted author row");
            Ok(author)
        })
    }

    /// Replaces the author with the same API key and returns the previous row.
    pub fn update_author(&self, author: Author) -> Result<Author> {
        self.write(|t| {
            let id = t.authors.id_of(&author.api_key)?;
            t.authors.replace(id, author)
        })
    }

    /// Deletes an author. Rejected while any book still references them.
    pub fn delete_author(&self, key: &ApiKey) -> Result<Author> {
        self.write(|t| {
            let id = t.authors.id_of(key)?;
            if t.book_authors.has_right(id) {
                return Err(Error::ReferentialConflict(format!(
                    "author {} is referenced by {} book(s)",
                    key,
                    t.book_authors.lefts_of(id).len()
                )));
            }
            t.authors
                .remove(id)
                .ok_or_else(|| Error::NotFound(format!("authors {}", key)))
        })
    }

    pub fn author(&self, key: &ApiKey) -> Option<Author> {
        self.read(|t| t.authors.get_by_key(key).map(|(_, a)| a.clone()))
    }

    pub fn author_graph(&self, key: &ApiKey) -> Option<AuthorGraph> {
        self.read(|t| {
            let (id, _) = t.authors.get_by_key(key)?;
            t.author_graph(id)
        })
    }

    pub fn authors(&self) -> Vec<Author> {
        self.read(|t| t.authors.values().cloned().collect())
    }

    // ===== Books =====

    /// Inserts a book and links its authors. Every referenced author and the
    /// publisher must exist.
    pub fn insert_book(&self, draft: BookDraft) -> Result<BookGraph> {
        self.write(|t| {
            let (publisher_id, author_ids) = t.resolve_book_relations(&draft)?;
            let key = draft.book.api_key.clone();
            let book = Book {
                publisher_id,
                ..draft.book
            };
            let id = t.books.insert(book)?;
            for author_id in author_ids {
                t.book_authors.link(id, author_id);
            }
            debug!(id, api_key = %key, "Inserted book row");
            t.book_graph(id)
                .ok_or_else(|| Error::NotFound(format!("books {}", key)))
        })
    }

    /// Replaces a book's scalars and author links.
    pub fn update_book(&self, draft: BookDraft) -> Result<BookUpdate> {
        self.write(|t| {
            let id = t.books.id_of(&draft.book.api_key)?;
            let (publisher_id, author_ids) = t.resolve_book_relations(&draft)?;

            let previous_authors = t
                .book_authors
                .rights_of(id)
                .into_iter()
                .filter_map(|aid| t.authors.get(aid).cloned())
                .collect();

            let book = Book {
                publisher_id,
                ..draft.book.clone()
            };
            t.books.replace(id, book)?;
            t.book_authors.unlink_left(id);
            for author_id in author_ids {
                t.book_authors.link(id, author_id);
            }

            let graph = t
                .book_graph(id)
                .ok_or_else(|| Error::NotFound(format!("books {}", draft.book.api_key)))?;
            Ok(BookUpdate {
                graph,
                previous_authors,
            })
        })
    }

    /// Deletes a book. Rejected while library copies or store editions of
    /// it exist. Returns the graph as it was before deletion.
    pub fn delete_book(&self, key: &ApiKey) -> Result<BookGraph> {
        self.write(|t| {
            let id = t.books.id_of(key)?;
            let copies = t
                .copies
                .values()
                .filter(|c| c.specification.book_id == id)
                .count();
            let editions = t
                .buyable_books
                .values()
                .filter(|b| b.specification.book_id == id)
                .count();
            if copies + editions > 0 {
                return Err(Error::ReferentialConflict(format!(
                    "book {} has {} copies and {} store editions",
                    key, copies, editions
                )));
            }

            let graph = t
                .book_graph(id)
                .ok_or_else(|| Error::NotFound(format!("books {}", key)))?;
            t.book_authors.unlink_left(id);
            t.books.remove(id);
            Ok(graph)
        })
    }

    pub fn book(&self, key: &ApiKey) -> Option<Book> {
        self.read(|t| t.books.get_by_key(key).map(|(_, b)| b.clone()))
    }

    pub fn book_graph(&self, key: &ApiKey) -> Option<BookGraph> {
        self.read(|t| {
            let (id, _) = t.books.get_by_key(key)?;
            t.book_graph(id)
        })
    }

    /// Books written by the author with `author_key` (join-table lookup).
    pub fn books_by_author(&self, author_key: &ApiKey) -> Vec<Book> {
        self.read(|t| {
            let Some((author_id, _)) = t.authors.get_by_key(author_key) else {
                return Vec::new();
            };
            t.book_authors
                .lefts_of(author_id)
                .into_iter()
                .filter_map(|bid| t.books.get(bid).cloned())
                .collect()
        })
    }

    /// Books of one genre. There is no secondary index on `genre`.
    pub fn books_by_genre(&self, genre: BookGenre) -> Vec<Book> {
        self.read(|t| t.books.values().filter(|b| b.genre == genre).cloned().collect())
    }

    pub fn books_sorted_by_title(&self) -> Vec<Book> {
        let mut books: Vec<Book> = self.read(|t| t.books.values().cloned().collect());
        books.sort_by(|a, b| a.title.cmp(&b.title));
        books
    }

    pub fn book_count(&self) -> usize {
        self.read(|t| t.books.len())
    }

    pub fn author_count(&self) -> usize {
        self.read(|t| t.authors.len())
    }

    /// Empties every table.
    pub fn clear(&self) {
        self.tables.write().clear();
        debug!("Cleared relational store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apikey;
    use crate::model::{BookType, PersonFields};
    use chrono::NaiveDate;

    fn author(penname: &str) -> Author {
        Author {
            api_key: apikey::generate(30),
            person: PersonFields::new("Ann", "Writer", "ann@mail.com", vec![]).unwrap(),
            penname: penname.to_string(),
        }
    }

    fn draft(title: &str, authors: Vec<ApiKey>) -> BookDraft {
        BookDraft {
            book: Book {
                api_key: apikey::generate(30),
                title: title.to_string(),
                isbn: "isbn".to_string(),
                genre: BookGenre::Crime,
                book_type: BookType::Paperback,
                publication_date: NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
                publisher_id: None,
            },
            publisher: None,
            authors,
        }
    }

    #[test]
    fn test_insert_book_links_authors() -> Result<()> {
        let store = RelationalStore::new();
        let a = store.insert_author(author("a"))?;
        let b = store.insert_author(author("b"))?;

        let graph = store.insert_book(draft("T", vec![a.api_key.clone(), b.api_key.clone()]))?;
        assert_eq!(graph.authors.len(), 2);
        assert_eq!(store.books_by_author(&a.api_key).len(), 1);

        let a_graph = store.author_graph(&a.api_key).unwrap();
        assert_eq!(a_graph.books[0].api_key, graph.book.api_key);
        Ok(())
    }

    #[test]
    fn test_insert_book_unknown_author_is_not_found() {
        let store = RelationalStore::new();
        let result = store.insert_book(draft("T", vec![apikey::generate(30)]));
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(store.book_count(), 0);
    }

    #[test]
    fn test_delete_referenced_author_rejected() -> Result<()> {
        let store = RelationalStore::new();
        let a = store.insert_author(author("a"))?;
        store.insert_book(draft("T", vec![a.api_key.clone()]))?;

        let result = store.delete_author(&a.api_key);
        assert!(matches!(result, Err(Error::ReferentialConflict(_))));
        assert!(store.author(&a.api_key).is_some());
        Ok(())
    }

    #[test]
    fn test_update_book_relinks_authors() -> Result<()> {
        let store = RelationalStore::new();
        let a = store.insert_author(author("a"))?;
        let b = store.insert_author(author("b"))?;
        let graph = store.insert_book(draft("T", vec![a.api_key.clone()]))?;

        let mut change = draft("T2", vec![b.api_key.clone()]);
        change.book.api_key = graph.book.api_key.clone();
        let update = store.update_book(change)?;

        assert_eq!(update.previous_authors[0].api_key, a.api_key);
        assert_eq!(update.graph.authors[0].api_key, b.api_key);
        assert_eq!(update.graph.book.title, "T2");
        assert!(store.books_by_author(&a.api_key).is_empty());

        // a is free to go now
        store.delete_author(&a.api_key)?;
        Ok(())
    }

    #[test]
    fn test_delete_book_then_author() -> Result<()> {
        let store = RelationalStore::new();
        let a = store.insert_author(author("a"))?;
        let graph = store.insert_book(draft("T", vec![a.api_key.clone()]))?;

        let removed = store.delete_book(&graph.book.api_key)?;
        assert_eq!(removed.authors.len(), 1);
        assert!(store.book(&graph.book.api_key).is_none());
        store.delete_author(&a.api_key)?;
        assert_eq!(store.author_count(), 0);
        Ok(())
    }

    #[test]
    fn test_sorted_and_genre_queries() -> Result<()> {
        let store = RelationalStore::new();
        let a = store.insert_author(author("a"))?;
        store.insert_book(draft("b-title", vec![a.api_key.clone()]))?;
        store.insert_book(draft("a-title", vec![a.api_key.clone()]))?;

        let titles: Vec<String> = store
            .books_sorted_by_title()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["a-title", "b-title"]);
        assert_eq!(store.books_by_genre(BookGenre::Crime).len(), 2);
        assert!(store.books_by_genre(BookGenre::Poetry).is_empty());

        store.clear();
        assert_eq!(store.book_count(), 0);
        Ok(())
    }
}
