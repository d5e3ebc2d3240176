//! Secondary index definitions and their in-memory structure.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use super::Datum;

/// Sort direction of an index field or a query sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    }
}

/// One key field of an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexField {
    pub path: String,
    pub order: SortOrder,
}

impl IndexField {
    pub fn asc(path: &str) -> Self {
        Self {
            path: path.to_string(),
            order: SortOrder::Ascending,
        }
    }

    pub fn desc(path: &str) -> Self {
        Self {
            path: path.to_string(),
            order: SortOrder::Descending,
        }
    }
}

/// Declaration of a secondary index on a collection.
///
/// The name is the stable identity: declaring an index whose name already
/// exists with the same definition is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub collection: String,
    pub fields: Vec<IndexField>,
    pub unique: bool,
}

impl IndexDescriptor {
    pub fn new(name: &str, collection: &str, fields: Vec<IndexField>) -> Self {
        Self {
            name: name.to_string(),
            collection: collection.to_string(),
            fields,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Whether two descriptors index the same keys the same way.
    pub fn same_definition(&self, other: &IndexDescriptor) -> bool {
        self.collection == other.collection
            && self.fields == other.fields
            && self.unique == other.unique
    }

    pub fn leading_path(&self) -> Option<&str> {
        self.fields.first().map(|f| f.path.as_str())
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} (", self.name, self.collection)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let dir = match field.order {
                SortOrder::Ascending => 1,
                SortOrder::Descending => -1,
            };
            write!(f, "{}: {}", field.path, dir)?;
        }
        write!(f, ")")?;
        if self.unique {
            write!(f, " unique")?;
        }
        Ok(())
    }
}

/// Usage statistics of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub name: String,
    pub entries: usize,
    pub accesses: u64,
}

/// A `Datum` ordered by [`Datum::total_cmp`], usable as a map key.
#[derive(Debug, Clone)]
pub struct KeyPart(pub Datum);

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

pub type IndexKey = Vec<KeyPart>;

/// Computes every index key a document produces.
///
/// Multikey: a field resolving to several values contributes one key per
/// value (cartesian product across fields). A missing field indexes as null.
pub fn keys_for(descriptor: &IndexDescriptor, doc: &Datum) -> Vec<IndexKey> {
    let mut keys: Vec<IndexKey> = vec![Vec::new()];
    for field in &descriptor.fields {
        let mut values: Vec<Datum> = doc.resolve(&field.path).into_iter().cloned().collect();
        if values.is_empty() {
            values.push(Datum::Null);
        }
        keys = keys
            .into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |v| {
                    let mut key = prefix.clone();
                    key.push(KeyPart(v.clone()));
                    key
                })
            })
            .collect();
    }
    keys.sort();
    keys.dedup();
    keys
}

/// A built index: key → document sequence numbers.
#[derive(Debug)]
pub struct SecondaryIndex {
    pub descriptor: IndexDescriptor,
    pub entries: BTreeMap<IndexKey, BTreeSet<u64>>,
    accesses: AtomicU64,
}

impl SecondaryIndex {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self {
            descriptor,
            entries: BTreeMap::new(),
            accesses: AtomicU64::new(0),
        }
    }

    pub fn add(&mut self, seq: u64, doc: &Datum) {
        for key in keys_for(&self.descriptor, doc) {
            self.entries.entry(key).or_default().insert(seq);
        }
    }

    pub fn remove(&mut self, seq: u64, doc: &Datum) {
        for key in keys_for(&self.descriptor, doc) {
            if let Some(seqs) = self.entries.get_mut(&key) {
                seqs.remove(&seq);
                if seqs.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    /// For a unique index, the first key of `doc` already owned by a
    /// document other than `seq`.
    pub fn conflicting_key(&self, seq: Option<u64>, doc: &Datum) -> Option<IndexKey> {
        if !self.descriptor.unique {
            return None;
        }
        keys_for(&self.descriptor, doc).into_iter().find(|key| {
            self.entries
                .get(key)
                .is_some_and(|owners| owners.iter().any(|owner| Some(*owner) != seq))
        })
    }

    /// Sequence numbers whose leading key field equals `value`.
    pub fn lookup_leading(&self, value: &Datum) -> BTreeSet<u64> {
        self.accesses.fetch_add(1, AtomicOrdering::Relaxed);
        let start: IndexKey = vec![KeyPart(value.clone())];
        self.entries
            .range(start..)
            .take_while(|(key, _)| key.first().is_some_and(|k| k.0 == *value))
            .flat_map(|(_, seqs)| seqs.iter().copied())
            .collect()
    }

    /// Sequence numbers in leading-key order, each once.
    pub fn ordered_seqs(&self, order: SortOrder) -> Vec<u64> {
        self.accesses.fetch_add(1, AtomicOrdering::Relaxed);
        let mut seen = BTreeSet::new();
        let iter: Box<dyn Iterator<Item = &BTreeSet<u64>>> = match order {
            SortOrder::Ascending => Box::new(self.entries.values()),
            SortOrder::Descending => Box::new(self.entries.values().rev()),
        };
        iter.flat_map(|seqs| seqs.iter().copied())
            .filter(|seq| seen.insert(*seq))
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            name: self.descriptor.name.clone(),
            entries: self.entries.values().map(BTreeSet::len).sum(),
            accesses: self.accesses.load(AtomicOrdering::Relaxed),
        }
    }
}

/// Renders an index key for error messages.
pub fn render_key(key: &IndexKey) -> String {
    key.iter()
        .map(|part| part.0.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn book_index() -> IndexDescriptor {
        IndexDescriptor::new(
            "idx_genre_type",
            "books",
            vec![IndexField::asc("genre"), IndexField::asc("book_type")],
        )
    }

    #[test]
    fn test_multikey_produces_one_key_per_element() {
        let descriptor = IndexDescriptor::new("k", "books", vec![IndexField::asc("author_keys")]);
        let doc = Datum::from(json!({"author_keys": ["a", "b", "a"]}));
        assert_eq!(keys_for(&descriptor, &doc).len(), 2);
    }

    #[test]
    fn test_compound_key_and_missing_field() {
        let doc = Datum::from(json!({"genre": "MY"}));
        let keys = keys_for(&book_index(), &doc);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0][1].0, Datum::Null);
    }

    #[test]
    fn test_lookup_leading_on_compound() {
        let mut index = SecondaryIndex::new(book_index());
        index.add(1, &Datum::from(json!({"genre": "MY", "book_type": "H"})));
        index.add(2, &Datum::from(json!({"genre": "MY", "book_type": "P"})));
        index.add(3, &Datum::from(json!({"genre": "TH", "book_type": "H"})));

        let hits = index.lookup_leading(&Datum::from("MY"));
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(index.stats().accesses, 1);
        assert_eq!(index.stats().entries, 3);

        index.remove(1, &Datum::from(json!({"genre": "MY", "book_type": "H"})));
        assert_eq!(index.lookup_leading(&Datum::from("MY")).len(), 1);
    }

    #[test]
    fn test_unique_conflict_ignores_own_document() {
        let descriptor =
            IndexDescriptor::new("u", "authors", vec![IndexField::asc("api_key")]).unique();
        let mut index = SecondaryIndex::new(descriptor);
        let doc = Datum::from(json!({"api_key": "k"}));
        index.add(7, &doc);

        assert!(index.conflicting_key(Some(7), &doc).is_none());
        assert!(index.conflicting_key(Some(8), &doc).is_some());
        assert!(index.conflicting_key(None, &doc).is_some());
    }

    #[test]
    fn test_ordered_seqs_descending() {
        let descriptor = IndexDescriptor::new("t", "books", vec![IndexField::asc("title")]);
        let mut index = SecondaryIndex::new(descriptor);
        index.add(1, &Datum::from(json!({"title": "b"})));
        index.add(2, &Datum::from(json!({"title": "a"})));
        index.add(3, &Datum::from(json!({"title": "c"})));
        assert_eq!(index.ordered_seqs(SortOrder::Ascending), vec![2, 1, 3]);
        assert_eq!(index.ordered_seqs(SortOrder::Descending), vec![3, 1, 2]);
    }

    #[test]
    fn test_descriptor_display() {
        let d = IndexDescriptor::new("idx", "books", vec![IndexField::desc("publication_date")])
            .unique();
        assert_eq!(d.to_string(), "idx on books (publication_date: -1) unique");
    }
}
