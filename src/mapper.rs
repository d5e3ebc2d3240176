//! Mapper layer
//!
//! Pure translations from relational graphs to the two document layouts and
//! to read-only views, plus the partial reverse direction.
//!
//! ```text
//! AuthorGraph ──→ AuthorDocument            (book_keys)
//! BookGraph   ──→ BookDocument              (author_keys, publisher_key)
//!             ──→ BookWithEmbeddedAuthors   (authors: [EmbeddedAuthor])
//! ```
//!
//! Going back is lossy on purpose. A referencing document only knows the
//! keys of its relations, so `author_from_document` and `book_from_document`
//! rebuild scalar fields and leave relations to a store lookup
//! (`Book::publisher_id` comes back as `None`). An embedding document carries
//! author snapshots, which do rebuild into authors.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::apikey::ApiKey;
use crate::model::{
    Address, Author, AuthorGraph, Book, BookGenre, BookGraph, BookType, Email, PersonFields,
};

/// Author in the referencing layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDocument {
    pub api_key: ApiKey,
    pub first_name: String,
    pub last_name: String,
    pub penname: String,
    pub email: Email,
    pub addresses: Vec<Address>,
    pub book_keys: Vec<ApiKey>,
}

/// Book in the referencing layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDocument {
    pub api_key: ApiKey,
    pub title: String,
    pub isbn: String,
    pub genre: BookGenre,
    pub book_type: BookType,
    pub publication_date: NaiveDate,
    pub publisher_key: Option<ApiKey>,
    pub author_keys: Vec<ApiKey>,
}

/// Snapshot of an author as embedded in a book document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedAuthor {
    pub api_key: ApiKey,
    pub first_name: String,
    pub last_name: String,
    pub penname: String,
    pub email: Email,
    pub addresses: Vec<Address>,
}

/// Book in the embedding layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookWithEmbeddedAuthors {
    pub api_key: ApiKey,
    pub title: String,
    pub isbn: String,
    pub genre: BookGenre,
    pub book_type: BookType,
    pub publication_date: NaiveDate,
    pub publisher_key: Option<ApiKey>,
    pub authors: Vec<EmbeddedAuthor>,
}

impl BookWithEmbeddedAuthors {
    /// Replaces the snapshot of `author` if this book embeds them. Returns
    /// whether anything changed.
    pub fn refresh_author(&mut self, author: &Author) -> bool {
        let fresh = embedded_author(author);
        let mut changed = false;
        for slot in self.authors.iter_mut().filter(|a| a.api_key == fresh.api_key) {
            if *slot != fresh {
                *slot = fresh.clone();
                changed = true;
            }
        }
        changed
    }
}

/// Read-only projection of an author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorView {
    pub api_key: ApiKey,
    pub first_name: String,
    pub last_name: String,
    pub penname: String,
    pub email: String,
    pub addresses: Vec<Address>,
    pub book_keys: Vec<ApiKey>,
}

/// Read-only projection of a book with its authors resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookView {
    pub api_key: ApiKey,
    pub title: String,
    pub isbn: String,
    pub genre: String,
    pub book_type: String,
    pub publication_date: NaiveDate,
    pub publisher_key: Option<ApiKey>,
    pub publisher_name: Option<String>,
    pub authors: Vec<EmbeddedAuthor>,
}

pub fn author_to_referencing(graph: &AuthorGraph) -> AuthorDocument {
    let author = &graph.author;
    AuthorDocument {
        api_key: author.api_key.clone(),
        first_name: author.person.first_name.clone(),
        last_name: author.person.last_name.clone(),
        penname: author.penname.clone(),
        email: author.person.email.clone(),
        addresses: author.person.addresses.clone(),
        book_keys: graph.books.iter().map(|b| b.api_key.clone()).collect(),
    }
}

pub fn book_to_referencing(graph: &BookGraph) -> BookDocument {
    let book = &graph.book;
    BookDocument {
        api_key: book.api_key.clone(),
        title: book.title.clone(),
        isbn: book.isbn.clone(),
        genre: book.genre,
        book_type: book.book_type,
        publication_date: book.publication_date,
        publisher_key: graph.publisher.as_ref().map(|p| p.api_key.clone()),
        author_keys: graph.authors.iter().map(|a| a.api_key.clone()).collect(),
    }
}

pub fn embedded_author(author: &Author) -> EmbeddedAuthor {
    EmbeddedAuthor {
        api_key: author.api_key.clone(),
        first_name: author.person.first_name.clone(),
        last_name: author.person.last_name.clone(),
        penname: author.penname.clone(),
        email: author.person.email.clone(),
        addresses: author.person.addresses.clone(),
    }
}

pub fn book_to_embedding(graph: &BookGraph) -> BookWithEmbeddedAuthors {
    let book = &graph.book;
    BookWithEmbeddedAuthors {
        api_key: book.api_key.clone(),
        title: book.title.clone(),
        isbn: book.isbn.clone(),
        genre: book.genre,
        book_type: book.book_type,
        publication_date: book.publication_date,
        publisher_key: graph.publisher.as_ref().map(|p| p.api_key.clone()),
        authors: graph.authors.iter().map(embedded_author).collect(),
    }
}

/// Scalar fields of an author; `book_keys` are not followed.
pub fn author_from_document(doc: &AuthorDocument) -> Author {
    Author {
        api_key: doc.api_key.clone(),
        person: PersonFields {
            first_name: doc.first_name.clone(),
            last_name: doc.last_name.clone(),
            email: doc.email.clone(),
            addresses: doc.addresses.clone(),
        },
        penname: doc.penname.clone(),
    }
}

/// Scalar fields of a book; the publisher is left unresolved.
pub fn book_from_document(doc: &BookDocument) -> Book {
    Book {
        api_key: doc.api_key.clone(),
        title: doc.title.clone(),
        isbn: doc.isbn.clone(),
        genre: doc.genre,
        book_type: doc.book_type,
        publication_date: doc.publication_date,
        publisher_id: None,
    }
}

/// Scalar fields of a book plus its embedded author snapshots.
pub fn book_from_embedding(doc: &BookWithEmbeddedAuthors) -> (Book, Vec<Author>) {
    let book = Book {
        api_key: doc.api_key.clone(),
        title: doc.title.clone(),
        isbn: doc.isbn.clone(),
        genre: doc.genre,
        book_type: doc.book_type,
        publication_date: doc.publication_date,
        publisher_id: None,
    };
    let authors = doc
        .authors
        .iter()
        .map(|a| Author {
            api_key: a.api_key.clone(),
            person: PersonFields {
                first_name: a.first_name.clone(),
                last_name: a.last_name.clone(),
                email: a.email.clone(),
                addresses: a.addresses.clone(),
            },
            penname: a.penname.clone(),
        })
        .collect();
    (book, authors)
}

pub fn author_view(graph: &AuthorGraph) -> AuthorView {
    let author = &graph.author;
    AuthorView {
        api_key: author.api_key.clone(),
        first_name: author.person.first_name.clone(),
        last_name: author.person.last_name.clone(),
        penname: author.penname.clone(),
        email: author.person.email.to_string(),
        addresses: author.person.addresses.clone(),
        book_keys: graph.books.iter().map(|b| b.api_key.clone()).collect(),
    }
}

pub fn book_view(graph: &BookGraph) -> BookView {
    let book = &graph.book;
    BookView {
        api_key: book.api_key.clone(),
        title: book.title.clone(),
        isbn: book.isbn.clone(),
        genre: book.genre.code().to_string(),
        book_type: book.book_type.code().to_string(),
        publication_date: book.publication_date,
        publisher_key: graph.publisher.as_ref().map(|p| p.api_key.clone()),
        publisher_name: graph.publisher.as_ref().map(|p| p.name.clone()),
        authors: graph.authors.iter().map(embedded_author).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Publisher;

    fn key(raw: &str) -> ApiKey {
        ApiKey::parse(raw).unwrap()
    }

    fn author(k: &str, email: &str) -> Author {
        Author {
            api_key: key(k),
            person: PersonFields::new(
                "Ada",
                "Lovelace",
                email,
                vec![Address::new("Main", "1", "1010", "Vienna", "AT").unwrap()],
            )
            .unwrap(),
            penname: "dada".to_string(),
        }
    }

    fn book(k: &str) -> Book {
        Book {
            api_key: key(k),
            title: "Notes".to_string(),
            isbn: "978-3-16-148410-0".to_string(),
            genre: BookGenre::ALL[0],
            book_type: BookType::ALL[0],
            publication_date: NaiveDate::from_ymd_opt(1843, 9, 1).unwrap(),
            publisher_id: Some(4),
        }
    }

    #[test]
    fn test_referencing_documents_hold_keys_only() {
        let graph = BookGraph {
            book: book("bk1"),
            authors: vec![author("au1", "mail@mail.com"), author("au2", "b@mail.com")],
            publisher: Some(Publisher {
                api_key: key("pub1"),
                name: "Taylor".to_string(),
                address: Address::new("Fleet", "2", "EC4", "London", "UK").unwrap(),
            }),
        };
        let doc = book_to_referencing(&graph);
        assert_eq!(doc.author_keys, vec![key("au1"), key("au2")]);
        assert_eq!(doc.publisher_key, Some(key("pub1")));

        let back = book_from_document(&doc);
        assert_eq!(back.title, graph.book.title);
        assert_eq!(back.publisher_id, None);
    }

    #[test]
    fn test_author_without_books_maps_to_empty_list() {
        let graph = AuthorGraph {
            author: author("au1", "mail@mail.com"),
            books: Vec::new(),
        };
        let doc = author_to_referencing(&graph);
        assert!(doc.book_keys.is_empty());
        assert_eq!(author_from_document(&doc), graph.author);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["book_keys"], serde_json::json!([]));
        assert_eq!(json["email"], "mail@mail.com");
    }

    #[test]
    fn test_embedding_snapshots_and_refresh() {
        let graph = BookGraph {
            book: book("bk1"),
            authors: vec![author("au1", "mail@mail.com")],
            publisher: None,
        };
        let mut doc = book_to_embedding(&graph);
        assert_eq!(doc.authors[0].email.as_str(), "mail@mail.com");
        assert_eq!(doc.authors[0].addresses.len(), 1);

        let (_, authors) = book_from_embedding(&doc);
        assert_eq!(authors, graph.authors);

        assert!(!doc.refresh_author(&graph.authors[0]));
        assert!(doc.refresh_author(&author("au1", "new@mail.com")));
        assert_eq!(doc.authors[0].email.as_str(), "new@mail.com");
        assert!(!doc.refresh_author(&author("other", "x@mail.com")));
    }

    #[test]
    fn test_book_view_uses_wire_codes() {
        let graph = BookGraph {
            book: book("bk1"),
            authors: vec![author("au1", "mail@mail.com")],
            publisher: None,
        };
        let view = book_view(&graph);
        assert_eq!(view.genre, BookGenre::ALL[0].code());
        assert_eq!(view.book_type, "H");
        assert_eq!(view.authors.len(), 1);
    }
}
