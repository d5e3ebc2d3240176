//! Validated value objects shared by several entities.
//!
//! Construction is the only place validation happens: a value that exists
//! is valid. Constructors return [`ValidationError`] instead of panicking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::apikey::ApiKey;

/// Reasons a command or value object is rejected before persistence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid book type code: {0}")]
    InvalidBookType(String),

    #[error("invalid book genre code: {0}")]
    InvalidGenre(String),

    #[error("invalid order status: {0}")]
    InvalidOrderStatus(String),

    #[error("invalid api key: {0:?}")]
    InvalidApiKey(String),

    #[error("invalid date {value:?} for {field}")]
    InvalidDate { field: &'static str, value: String },

    #[error("field {0} must not be empty")]
    EmptyField(&'static str),

    #[error("{0}")]
    Constraint(String),
}

/// An email address.
///
/// Accepts `local@domain.tld` with no whitespace, exactly one `@`, and a
/// domain made of non-empty dot-separated labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        let invalid = || ValidationError::InvalidEmail(raw.to_string());

        if raw.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        let (local, domain) = raw.split_once('@').ok_or_else(invalid)?;
        if local.is_empty() || domain.contains('@') {
            return Err(invalid());
        }
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
            return Err(invalid());
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A postal address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub house_number: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

impl Address {
    /// Builds a validated address. Every part is required; the postal code
    /// may only contain letters, digits, spaces and dashes.
    pub fn new(
        street: &str,
        house_number: &str,
        postal_code: &str,
        city: &str,
        country: &str,
    ) -> Result<Self, ValidationError> {
        let parts = [
            ("street", street),
            ("house_number", house_number),
            ("postal_code", postal_code),
            ("city", city),
            ("country", country),
        ];
        for (name, value) in parts {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidAddress(format!("{} is empty", name)));
            }
        }
        if !postal_code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
        {
            return Err(ValidationError::InvalidAddress(format!(
                "postal code {:?} contains invalid characters",
                postal_code
            )));
        }

        Ok(Self {
            street: street.trim().to_string(),
            house_number: house_number.trim().to_string(),
            postal_code: postal_code.trim().to_string(),
            city: city.trim().to_string(),
            country: country.trim().to_string(),
        })
    }

    /// Re-validates an address that arrived already structured (commands).
    pub fn validated(self) -> Result<Self, ValidationError> {
        Self::new(
            &self.street,
            &self.house_number,
            &self.postal_code,
            &self.city,
            &self.country,
        )
    }
}

/// Fields every person-like entity (authors, customers) carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonFields {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub addresses: Vec<Address>,
}

impl PersonFields {
    pub fn new(
        first_name: &str,
        last_name: &str,
        email: &str,
        addresses: Vec<Address>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            first_name: require("first_name", first_name)?,
            last_name: require("last_name", last_name)?,
            email: Email::parse(email)?,
            addresses: addresses
                .into_iter()
                .map(Address::validated)
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Fields shared by every concrete edition of a book (library copies and
/// store stock). Points at the book by surrogate id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationFields {
    pub book_id: i64,
    pub book_type: super::BookType,
}

/// Trims `value` and rejects it when nothing is left.
pub(crate) fn require(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parses an ISO-8601 calendar date (`YYYY-MM-DD`).
pub(crate) fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// Parses every key in `keys`.
pub(crate) fn parse_keys(keys: &[String]) -> Result<Vec<ApiKey>, ValidationError> {
    keys.iter().map(|k| ApiKey::parse(k)).collect()
}
