//! Inbound commands.
//!
//! Plain carriers handed over by the (external) web layer. `api_key` is
//! absent on create and present on update; relations are given as API keys
//! and enums as their wire codes. Nothing here is trusted until validated.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::values::{parse_date, parse_keys, require};
use super::{Address, Author, Book, BookGenre, BookType, PersonFields, ValidationError};
use crate::apikey::ApiKey;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorCommand {
    pub api_key: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub addresses: Vec<Address>,
    pub penname: String,
}

impl AuthorCommand {
    /// Validates every field and builds the entity under `api_key`.
    pub fn build(&self, api_key: ApiKey) -> Result<Author, ValidationError> {
        Ok(Author {
            api_key,
            person: PersonFields::new(
                &self.first_name,
                &self.last_name,
                &self.email,
                self.addresses.clone(),
            )?,
            penname: require("penname", &self.penname)?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookCommand {
    pub api_key: Option<String>,
    pub title: String,
    pub isbn: String,
    pub genre: String,
    pub book_type: String,
    pub publication_date: String,
    pub publisher_key: Option<String>,
    pub author_keys: Vec<String>,
}

/// A validated book whose relations are still unresolved API keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    pub book: Book,
    pub publisher: Option<ApiKey>,
    pub authors: Vec<ApiKey>,
}

impl BookCommand {
    /// Validates scalars and relation keys. At least one author is required;
    /// duplicate author keys collapse to one.
    pub fn build(&self, api_key: ApiKey) -> Result<BookDraft, ValidationError> {
        let mut authors = parse_keys(&self.author_keys)?;
        let mut seen = std::collections::HashSet::new();
        authors.retain(|k| seen.insert(k.clone()));
        if authors.is_empty() {
            return Err(ValidationError::EmptyField("author_keys"));
        }

        let publisher = self
            .publisher_key
            .as_deref()
            .map(ApiKey::parse)
            .transpose()?;

        let book = Book {
            api_key,
            title: require("title", &self.title)?,
            isbn: require("isbn", &self.isbn)?,
            genre: self.genre.parse::<BookGenre>()?,
            book_type: self.book_type.parse::<BookType>()?,
            publication_date: parse_date("publication_date", &self.publication_date)?,
            publisher_id: None,
        };

        Ok(BookDraft {
            book,
            publisher,
            authors,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerCommand {
    pub api_key: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub addresses: Vec<Address>,
    pub customer_number: String,
    pub registered_on: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherCommand {
    pub api_key: Option<String>,
    pub name: String,
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryCommand {
    pub api_key: Option<String>,
    pub name: String,
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchCommand {
    pub api_key: Option<String>,
    pub library_key: String,
    pub name: String,
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyCommand {
    pub api_key: Option<String>,
    pub book_key: String,
    pub book_type: String,
    pub branch_key: String,
    pub shelf_location: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuyableBookCommand {
    pub api_key: Option<String>,
    pub book_key: String,
    pub book_type: String,
    pub price_cents: u64,
    pub stock: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BorrowingCommand {
    pub api_key: Option<String>,
    pub copy_key: String,
    pub customer_key: String,
    pub borrowed_on: String,
    pub due_on: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderCommand {
    pub api_key: Option<String>,
    pub customer_key: String,
    pub item_keys: Vec<String>,
    pub ordered_on: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionCommand {
    pub api_key: Option<String>,
    pub customer_key: String,
    pub library_key: String,
    pub valid_from: String,
    pub valid_until: String,
}

/// Parses the date range of a subscription or borrowing, rejecting an end
/// before the start.
pub(crate) fn date_range(
    start_field: &'static str,
    start: &str,
    end_field: &'static str,
    end: &str,
) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let from = parse_date(start_field, start)?;
    let until = parse_date(end_field, end)?;
    if until < from {
        return Err(ValidationError::Constraint(format!(
            "{} ({}) is before {} ({})",
            end_field, until, start_field, from
        )));
    }
    Ok((from, until))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apikey;

    fn book_command() -> BookCommand {
        BookCommand {
            title: "The Hound".into(),
            isbn: "978-3-16-148410-0".into(),
            genre: "MY".into(),
            book_type: "H".into(),
            publication_date: "1902-04-01".into(),
            author_keys: vec!["abc".into(), "abc".into(), "def".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_author_command_build() {
        let cmd = AuthorCommand {
            first_name: "Dora".into(),
            last_name: "Dada".into(),
            email: "mail@mail.com".into(),
            penname: "dada".into(),
            ..Default::default()
        };
        let key = apikey::generate(30);
        let author = cmd.build(key.clone()).unwrap();
        assert_eq!(author.api_key, key);
        assert_eq!(author.person.email.as_str(), "mail@mail.com");
        assert!(author.person.addresses.is_empty());
    }

    #[test]
    fn test_author_command_rejects_bad_email() {
        let cmd = AuthorCommand {
            first_name: "Dora".into(),
            last_name: "Dada".into(),
            email: "mail.mail.com".into(),
            penname: "dada".into(),
            ..Default::default()
        };
        assert!(matches!(
            cmd.build(apikey::generate(30)),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_book_command_dedupes_authors() {
        let draft = book_command().build(apikey::generate(30)).unwrap();
        assert_eq!(draft.authors.len(), 2);
        assert_eq!(draft.book.genre, BookGenre::Mystery);
        assert_eq!(draft.book.book_type, BookType::Hardcover);
        assert!(draft.publisher.is_none());
    }

    #[test]
    fn test_book_command_requires_authors() {
        let cmd = BookCommand {
            author_keys: vec![],
            ..book_command()
        };
        assert_eq!(
            cmd.build(apikey::generate(30)),
            Err(ValidationError::EmptyField("author_keys"))
        );
    }

    #[test]
    fn test_book_command_rejects_bad_codes() {
        let bad_genre = BookCommand {
            genre: "XX".into(),
            ..book_command()
        };
        assert!(matches!(
            bad_genre.build(apikey::generate(30)),
            Err(ValidationError::InvalidGenre(_))
        ));
        let bad_type = BookCommand {
            book_type: "Q".into(),
            ..book_command()
        };
        assert!(matches!(
            bad_type.build(apikey::generate(30)),
            Err(ValidationError::InvalidBookType(_))
        ));
    }

    #[test]
    fn test_date_range_order() {
        assert!(date_range("from", "2024-01-01", "until", "2024-12-31").is_ok());
        assert!(matches!(
            date_range("from", "2024-12-31", "until", "2024-01-01"),
            Err(ValidationError::Constraint(_))
        ));
    }
}
