//! Enumerations with fixed wire encodings.
//!
//! The codes are what gets persisted in every store, so they are a storage
//! contract: `BookType` is one character, `BookGenre` two.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Physical format of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BookType {
    Hardcover,
    Paperback,
    Ebook,
}

impl BookType {
    pub const ALL: [BookType; 3] = [BookType::Hardcover, BookType::Paperback, BookType::Ebook];

    pub fn code(self) -> &'static str {
        match self {
            BookType::Hardcover => "H",
            BookType::Paperback => "P",
            BookType::Ebook => "E",
        }
    }
}

impl FromStr for BookType {
    type Err = ValidationError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or_else(|| ValidationError::InvalidBookType(code.to_string()))
    }
}

impl fmt::Display for BookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<String> for BookType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BookType> for String {
    fn from(t: BookType) -> Self {
        t.code().to_string()
    }
}

macro_rules! genres {
    ($($variant:ident => $code:literal),+ $(,)?) => {
        /// Literary genre of a book.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum BookGenre {
            $($variant),+
        }

        impl BookGenre {
            pub const ALL: &'static [BookGenre] = &[$(BookGenre::$variant),+];

            pub fn code(self) -> &'static str {
                match self {
                    $(BookGenre::$variant => $code),+
                }
            }
        }
    };
}

genres! {
    Mystery => "MY",
    Thriller => "TH",
    Crime => "CR",
    Horror => "HO",
    Fantasy => "FA",
    ScienceFiction => "SF",
    Romance => "RO",
    Historical => "HI",
    Biography => "BI",
    Autobiography => "AB",
    Poetry => "PO",
    Drama => "DR",
    Comic => "CO",
    Adventure => "AD",
    YoungAdult => "YA",
    Children => "CH",
    SelfHelp => "SH",
    Science => "SC",
    Philosophy => "PH",
    Religion => "RE",
    Travel => "TR",
    Cooking => "CK",
    Art => "AR",
    Humor => "HU",
}

impl FromStr for BookGenre {
    type Err = ValidationError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.code() == code)
            .ok_or_else(|| ValidationError::InvalidGenre(code.to_string()))
    }
}

impl fmt::Display for BookGenre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<String> for BookGenre {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BookGenre> for String {
    fn from(g: BookGenre) -> Self {
        g.code().to_string()
    }
}

/// Lifecycle of a store order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Shipped,
    Delivered,
    Cancelled,
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLACED" => Ok(OrderStatus::Placed),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(ValidationError::InvalidOrderStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_book_type_codes() {
        assert_eq!(BookType::Hardcover.code(), "H");
        assert_eq!(BookType::Paperback.code(), "P");
        assert_eq!(BookType::Ebook.code(), "E");
        assert_eq!("P".parse::<BookType>().unwrap(), BookType::Paperback);
        assert!("X".parse::<BookType>().is_err());
        assert!("h".parse::<BookType>().is_err());
    }

    #[test]
    fn test_genre_catalog_is_complete_and_distinct() {
        assert_eq!(BookGenre::ALL.len(), 24);
        let codes: HashSet<&str> = BookGenre::ALL.iter().map(|g| g.code()).collect();
        assert_eq!(codes.len(), 24);
        assert!(codes.iter().all(|c| c.len() == 2));
        for code in ["MY", "TH", "CR"] {
            assert!(codes.contains(code));
        }
    }

    #[test]
    fn test_genre_parse_rejects_unknown() {
        assert_eq!("SF".parse::<BookGenre>().unwrap(), BookGenre::ScienceFiction);
        assert_eq!(
            "ZZ".parse::<BookGenre>(),
            Err(ValidationError::InvalidGenre("ZZ".to_string()))
        );
    }

    #[test]
    fn test_enums_serialize_as_codes() {
        assert_eq!(serde_json::to_string(&BookGenre::Crime).unwrap(), "\"CR\"");
        assert_eq!(serde_json::to_string(&BookType::Ebook).unwrap(), "\"E\"");
        let g: BookGenre = serde_json::from_str("\"TH\"").unwrap();
        assert_eq!(g, BookGenre::Thriller);
        assert!(serde_json::from_str::<BookType>("\"Z\"").is_err());
    }

    #[test]
    fn test_order_status_parse() {
        assert_eq!("SHIPPED".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
