//! Synthetic data for the comparison harness.
//!
//! Everything is drawn from one seeded generator, so the same seed and
//! scale always produce the same rows, documents and query targets.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::apikey::{self, ApiKey};
use crate::model::{
    Address, Author, Book, BookDraft, BookGenre, BookType, Email, PersonFields, ValidationError,
};

/// Genres synthetic books are spread over.
pub const BENCH_GENRES: [BookGenre; 5] = [
    BookGenre::Mystery,
    BookGenre::Thriller,
    BookGenre::ScienceFiction,
    BookGenre::Romance,
    BookGenre::Historical,
];

const FIRST_NAMES: [&str; 8] = ["Ada", "Ben", "Cleo", "Dora", "Emil", "Fay", "Gus", "Hana"];
const LAST_NAMES: [&str; 8] = [
    "Adler", "Brandt", "Castell", "Dada", "Eberl", "Frisch", "Gruber", "Huber",
];
const TITLE_WORDS: [&str; 10] = [
    "Silent", "River", "Night", "Garden", "Empire", "Shadow", "Letter", "Winter", "Harbor", "Glass",
];

/// One generated scale: rows to insert and the keys queries will target.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub authors: Vec<Author>,
    pub books: Vec<BookDraft>,
}

impl Dataset {
    /// Generates `books` books written by `books / books_per_author` authors
    /// (at least one). Each book has one to three distinct authors.
    pub fn generate(
        books: usize,
        books_per_author: usize,
        key_length: usize,
        seed: u64,
    ) -> Result<Self, ValidationError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let author_count = (books / books_per_author.max(1)).max(1);

        let authors: Vec<Author> = (0..author_count)
            .map(|i| synthetic_author(&mut rng, i, key_length))
            .collect::<Result<_, _>>()?;

        let epoch = NaiveDate::from_ymd_opt(1950, 1, 1).unwrap_or_default();
        let drafts = (0..books)
            .map(|i| {
                let title = format!(
                    "{} {} {}",
                    TITLE_WORDS[rng.random_range(0..TITLE_WORDS.len())],
                    TITLE_WORDS[rng.random_range(0..TITLE_WORDS.len())],
                    i
                );
                let book = Book {
                    api_key: apikey::generate_with(&mut rng, key_length),
                    title,
                    isbn: format!("978-0-{:06}-{}", i, i % 10),
                    genre: BENCH_GENRES[rng.random_range(0..BENCH_GENRES.len())],
                    book_type: BookType::ALL[rng.random_range(0..BookType::ALL.len())],
                    publication_date: epoch + Duration::days(rng.random_range(0..27_000)),
                    publisher_id: None,
                };

                let wanted = rng.random_range(1..=3usize).min(author_count);
                let mut picked: Vec<ApiKey> = Vec::with_capacity(wanted);
                while picked.len() < wanted {
                    let key = &authors[rng.random_range(0..author_count)].api_key;
                    if !picked.contains(key) {
                        picked.push(key.clone());
                    }
                }
                BookDraft {
                    book,
                    publisher: None,
                    authors: picked,
                }
            })
            .collect();

        Ok(Self {
            authors,
            books: drafts,
        })
    }

    /// Query target number `i`, cycling through the generated rows.
    pub fn book_key(&self, i: usize) -> Option<&ApiKey> {
        (!self.books.is_empty()).then(|| &self.books[i % self.books.len()].book.api_key)
    }

    pub fn author_key(&self, i: usize) -> Option<&ApiKey> {
        (!self.authors.is_empty()).then(|| &self.authors[i % self.authors.len()].api_key)
    }

    pub fn genre(&self, i: usize) -> BookGenre {
        BENCH_GENRES[i % BENCH_GENRES.len()]
    }
}

fn synthetic_author(
    rng: &mut StdRng,
    i: usize,
    key_length: usize,
) -> Result<Author, ValidationError> {
    let first = FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())];
    let last = LAST_NAMES[rng.random_range(0..LAST_NAMES.len())];
    let address = Address {
        street: "Hauptstrasse".to_string(),
        house_number: (i % 200 + 1).to_string(),
        postal_code: format!("{:04}", 1000 + i % 9000),
        city: "Wien".to_string(),
        country: "AT".to_string(),
    };
    Ok(Author {
        api_key: apikey::generate_with(rng, key_length),
        person: PersonFields {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: Email::parse(&format!("author{}@bench.example.org", i))?,
            addresses: vec![address],
        },
        penname: format!("{}{}", first.to_lowercase(), i),
    })
}
