//! Datum - the JSON-like value documents are made of.
//!
//! # Supported Types
//!
//! - **Null**: Absence of a value
//! - **Boolean**: true or false
//! - **Number**: f64 floating point numbers
//! - **String**: UTF-8 encoded text
//! - **Array**: Ordered list of datums
//! - **Object**: Field map (sorted by field name)
//!
//! # Field paths
//!
//! Queries and indexes address values with dotted paths. A path step that
//! meets an array applies to every element, so `authors.email` on a book
//! document yields the email of each embedded author:
//!
//! ```rust
//! use bookmirror::document::Datum;
//! use serde_json::json;
//!
//! let doc = Datum::from(json!({
//!     "title": "T",
//!     "authors": [{"email": "a@x.io"}, {"email": "b@x.io"}]
//! }));
//! let emails: Vec<_> = doc.resolve("authors.email").into_iter().cloned().collect();
//! assert_eq!(emails, vec![Datum::from("a@x.io"), Datum::from("b@x.io")]);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A value stored in a document collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Datum {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<Datum>),
    Object(BTreeMap<String, Datum>),
}

impl Datum {
    /// Check if datum is null
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Datum::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Option<&Vec<Datum>> {
        match self {
            Datum::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Get as object
    pub fn as_object(&self) -> Option<&BTreeMap<String, Datum>> {
        match self {
            Datum::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Top-level field of an object.
    pub fn field(&self, name: &str) -> Option<&Datum> {
        self.as_object().and_then(|obj| obj.get(name))
    }

    /// Resolves a dotted path to the leaf values it reaches.
    ///
    /// Arrays met along the way fan out over their elements, and an array at
    /// the leaf contributes its elements. A missing path resolves to nothing.
    pub fn resolve<'a>(&'a self, path: &str) -> Vec<&'a Datum> {
        let mut out = Vec::new();
        let steps: Vec<&str> = path.split('.').collect();
        resolve_into(self, &steps, &mut out);
        out
    }

    /// Whether any value at `path` equals `expected`. A missing path matches
    /// `Null`.
    pub fn matches(&self, path: &str, expected: &Datum) -> bool {
        let values = self.resolve(path);
        if values.is_empty() {
            return expected.is_null();
        }
        values.into_iter().any(|v| v == expected)
    }

    fn type_rank(&self) -> u8 {
        match self {
            Datum::Null => 0,
            Datum::Boolean(_) => 1,
            Datum::Number(_) => 2,
            Datum::String(_) => 3,
            Datum::Array(_) => 4,
            Datum::Object(_) => 5,
        }
    }

    /// Total order over datums: by type first (null < bool < number <
    /// string < array < object), then by value.
    pub fn total_cmp(&self, other: &Datum) -> Ordering {
        match (self, other) {
            (Datum::Null, Datum::Null) => Ordering::Equal,
            (Datum::Boolean(a), Datum::Boolean(b)) => a.cmp(b),
            (Datum::Number(a), Datum::Number(b)) => a.total_cmp(b),
            (Datum::String(a), Datum::String(b)) => a.cmp(b),
            (Datum::Array(a), Datum::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.total_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Datum::Object(a), Datum::Object(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.total_cmp(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

fn resolve_into<'a>(value: &'a Datum, steps: &[&str], out: &mut Vec<&'a Datum>) {
    match (steps.split_first(), value) {
        (None, Datum::Array(items)) => out.extend(items.iter()),
        (None, leaf) => out.push(leaf),
        (Some(_), Datum::Array(items)) => {
            for item in items {
                resolve_into(item, steps, out);
            }
        }
        (Some((head, rest)), Datum::Object(obj)) => {
            if let Some(child) = obj.get(*head) {
                resolve_into(child, rest, out);
            }
        }
        (Some(_), _) => {}
    }
}

// Conversions
impl From<bool> for Datum {
    fn from(b: bool) -> Self {
        Datum::Boolean(b)
    }
}

impl From<i64> for Datum {
    fn from(n: i64) -> Self {
        Datum::Number(n as f64)
    }
}

impl From<f64> for Datum {
    fn from(n: f64) -> Self {
        Datum::Number(n)
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::String(s)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::String(s.to_string())
    }
}

impl From<&crate::apikey::ApiKey> for Datum {
    fn from(key: &crate::apikey::ApiKey) -> Self {
        Datum::String(key.as_str().to_string())
    }
}

impl From<serde_json::Value> for Datum {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Datum::Null,
            serde_json::Value::Bool(b) => Datum::Boolean(b),
            serde_json::Value::Number(n) => Datum::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Datum::String(s),
            serde_json::Value::Array(arr) => {
                Datum::Array(arr.into_iter().map(Datum::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Datum::Object(obj.into_iter().map(|(k, v)| (k, Datum::from(v))).collect())
            }
        }
    }
}

impl From<Datum> for serde_json::Value {
    fn from(datum: Datum) -> Self {
        match datum {
            Datum::Null => serde_json::Value::Null,
            Datum::Boolean(b) => serde_json::Value::Bool(b),
            Datum::Number(n) => {
                // Integral values go back as integers so typed decoding into
                // u64/i64 fields keeps working.
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serde_json::Value::Number(serde_json::Number::from(n as i64))
                } else {
                    serde_json::Number::from_f64(n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Datum::String(s) => serde_json::Value::String(s),
            Datum::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(serde_json::Value::from).collect())
            }
            Datum::Object(obj) => serde_json::Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl std::fmt::Display for Datum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Datum::Null => write!(f, "null"),
            Datum::Boolean(b) => write!(f, "{}", b),
            Datum::Number(n) => write!(f, "{}", n),
            Datum::String(s) => write!(f, "\"{}\"", s),
            Datum::Array(arr) => {
                write!(f, "[")?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Datum::Object(obj) => {
                write!(f, "{{")?;
                for (i, (key, value)) in obj.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_nested_and_missing() {
        let doc = Datum::from(json!({
            "a": {"b": 1},
            "tags": ["x", "y"],
            "list": [{"k": "1"}, {"k": "2"}, {"other": true}]
        }));
        assert_eq!(doc.resolve("a.b"), vec![&Datum::Number(1.0)]);
        assert_eq!(doc.resolve("tags").len(), 2);
        assert_eq!(doc.resolve("list.k").len(), 2);
        assert!(doc.resolve("missing").is_empty());
        assert!(doc.resolve("a.b.c").is_empty());
    }

    #[test]
    fn test_matches_array_membership() {
        let doc = Datum::from(json!({"author_keys": ["k1", "k2"], "title": "T"}));
        assert!(doc.matches("author_keys", &Datum::from("k2")));
        assert!(!doc.matches("author_keys", &Datum::from("k3")));
        assert!(doc.matches("publisher_key", &Datum::Null));
        assert!(!doc.matches("title", &Datum::Null));
    }

    #[test]
    fn test_total_cmp_orders_across_types() {
        let mut values = vec![
            Datum::from("b"),
            Datum::Number(2.0),
            Datum::Null,
            Datum::from("a"),
            Datum::Boolean(true),
            Datum::Number(-1.0),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![
                Datum::Null,
                Datum::Boolean(true),
                Datum::Number(-1.0),
                Datum::Number(2.0),
                Datum::from("a"),
                Datum::from("b"),
            ]
        );
    }

    #[test]
    fn test_json_roundtrip_keeps_integers() {
        let value = json!({"price_cents": 1299, "ratio": 0.5});
        let back = serde_json::Value::from(Datum::from(value.clone()));
        assert_eq!(back, value);
    }
}
