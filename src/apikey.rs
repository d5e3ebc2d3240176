//! External entity identifiers.
//!
//! Every entity carries two identities: the surrogate row id assigned by the
//! relational engine (never leaves the crate) and an [`ApiKey`], a short
//! random string that is the only identity documents, views and commands
//! ever see.
//!
//! # Format
//!
//! ```text
//! 30 characters, each drawn uniformly with replacement from ALPHABET
//! ```
//!
//! The alphabet is kept byte-for-byte as it appears in identifiers already
//! issued, including the repeated `Q` and the missing `Y`, so keys written
//! by earlier deployments still parse.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ValidationError;

/// The 58 symbols identifiers are drawn from.
pub const ALPHABET: &[u8; 58] = b"123456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXQZ";

/// Default identifier length.
pub const DEFAULT_LENGTH: usize = 30;

/// Opaque external identifier of an entity.
///
/// Generated once when the entity is constructed and immutable afterwards.
///
/// # Examples
///
/// ```rust
/// use bookmirror::apikey::{self, ApiKey};
///
/// let key = apikey::generate(30);
/// assert_eq!(key.as_str().len(), 30);
///
/// let parsed = ApiKey::parse(key.as_str()).unwrap();
/// assert_eq!(parsed, key);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    /// Parses an identifier received from outside the crate.
    ///
    /// Length is not fixed here: keys generated with a non-default length
    /// are still valid keys.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::InvalidApiKey(raw.to_string()));
        }
        if !raw.bytes().all(|b| ALPHABET.contains(&b)) {
            return Err(ValidationError::InvalidApiKey(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ApiKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generates a new identifier of `length` characters.
///
/// Uses the thread-local CSPRNG (ChaCha, seeded from the OS). No collision
/// check is made.
pub fn generate(length: usize) -> ApiKey {
    generate_with(&mut rand::rng(), length)
}

/// Generates an identifier from a caller-supplied source, e.g. a seeded
/// generator for reproducible benchmark data.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, length: usize) -> ApiKey {
    let key: String = (0..length)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    ApiKey(key)
}
