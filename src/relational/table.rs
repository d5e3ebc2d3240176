//! Row storage for one relational table.
//!
//! Rows are keyed by an auto-incremented surrogate id. Every table also
//! carries a unique index on the entity's API key, the only column lookups
//! from outside the crate use.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::apikey::ApiKey;
use crate::error::{Error, Result};
use crate::model::Entity;

/// One table of `T` rows.
#[derive(Debug, Clone)]
pub struct Table<T: Entity> {
    rows: BTreeMap<i64, T>,
    by_key: HashMap<ApiKey, i64>,
    next_id: i64,
}

impl<T: Entity> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            by_key: HashMap::new(),
            next_id: 1,
        }
    }
}

impl<T: Entity> Table<T> {
    /// Inserts a row and returns its new surrogate id.
    pub fn insert(&mut self, row: T) -> Result<i64> {
        let key = row.api_key().clone();
        if self.by_key.contains_key(&key) {
            return Err(Error::DuplicateKey {
                collection: T::TABLE.to_string(),
                index: "api_key".to_string(),
                key: key.into_string(),
            });
        }
        let id = self.next_id;
        self.next_id += 1;
        self.by_key.insert(key, id);
        self.rows.insert(id, row);
        Ok(id)
    }

    /// Overwrites the row with `id`. The API key must not change.
    pub fn replace(&mut self, id: i64, row: T) -> Result<T> {
        let current = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("{} row {}", T::TABLE, id)))?;
        if current.api_key() != row.api_key() {
            return Err(Error::Validation(crate::model::ValidationError::Constraint(
                format!("api key of {} row {} is immutable", T::TABLE, id),
            )));
        }
        Ok(std::mem::replace(current, row))
    }

    pub fn remove(&mut self, id: i64) -> Option<T> {
        let row = self.rows.remove(&id)?;
        self.by_key.remove(row.api_key());
        Some(row)
    }

    pub fn get(&self, id: i64) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn get_by_key(&self, key: &ApiKey) -> Option<(i64, &T)> {
        let id = *self.by_key.get(key)?;
        self.rows.get(&id).map(|row| (id, row))
    }

    /// Resolves an API key to a surrogate id, failing with `NotFound`.
    pub fn id_of(&self, key: &ApiKey) -> Result<i64> {
        self.by_key
            .get(key)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("{} {}", T::TABLE, key)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &T)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Removes every row. Surrogate ids keep counting up.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.by_key.clear();
    }
}

/// Many-to-many association between two tables, indexed both ways.
#[derive(Debug, Clone, Default)]
pub struct JoinTable {
    forward: BTreeSet<(i64, i64)>,
    reverse: BTreeSet<(i64, i64)>,
}

impl JoinTable {
    pub fn link(&mut self, left: i64, right: i64) {
        self.forward.insert((left, right));
        self.reverse.insert((right, left));
    }

    /// Drops every association of `left` and returns the rights it had.
    pub fn unlink_left(&mut self, left: i64) -> Vec<i64> {
        let rights = self.rights_of(left);
        for right in &rights {
            self.forward.remove(&(left, *right));
            self.reverse.remove(&(*right, left));
        }
        rights
    }

    pub fn rights_of(&self, left: i64) -> Vec<i64> {
        self.forward
            .range((left, i64::MIN)..=(left, i64::MAX))
            .map(|(_, r)| *r)
            .collect()
    }

    pub fn lefts_of(&self, right: i64) -> Vec<i64> {
        self.reverse
            .range((right, i64::MIN)..=(right, i64::MAX))
            .map(|(_, l)| *l)
            .collect()
    }

    pub fn has_right(&self, right: i64) -> bool {
        self.reverse
            .range((right, i64::MIN)..=(right, i64::MAX))
            .next()
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apikey;
    use crate::model::{Address, Library};

    fn library(name: &str) -> Library {
        Library {
            api_key: apikey::generate(30),
            name: name.to_string(),
            address: Address::new("Ring", "1", "1010", "Vienna", "AT").unwrap(),
        }
    }

    #[test]
    fn test_insert_assigns_increasing_ids() -> Result<()> {
        let mut table = Table::<Library>::default();
        let a = table.insert(library("a"))?;
        let b = table.insert(library("b"))?;
        assert_eq!((a, b), (1, 2));
        assert_eq!(table.len(), 2);

        table.remove(a);
        table.clear();
        let c = table.insert(library("c"))?;
        assert_eq!(c, 3);
        Ok(())
    }

    #[test]
    fn test_duplicate_api_key_rejected() -> Result<()> {
        let mut table = Table::<Library>::default();
        let lib = library("a");
        table.insert(lib.clone())?;
        assert!(matches!(table.insert(lib), Err(Error::DuplicateKey { .. })));
        Ok(())
    }

    #[test]
    fn test_replace_keeps_key_immutable() -> Result<()> {
        let mut table = Table::<Library>::default();
        let lib = library("a");
        let id = table.insert(lib.clone())?;

        let renamed = Library {
            name: "renamed".into(),
            ..lib.clone()
        };
        table.replace(id, renamed)?;
        assert_eq!(table.get_by_key(&lib.api_key).unwrap().1.name, "renamed");

        assert!(table.replace(id, library("other")).is_err());
        assert!(table.replace(99, lib).is_err());
        Ok(())
    }

    #[test]
    fn test_join_table_both_directions() {
        let mut join = JoinTable::default();
        join.link(1, 10);
        join.link(1, 11);
        join.link(2, 10);

        assert_eq!(join.rights_of(1), vec![10, 11]);
        assert_eq!(join.lefts_of(10), vec![1, 2]);
        assert!(join.has_right(11));

        assert_eq!(join.unlink_left(1), vec![10, 11]);
        assert!(!join.has_right(11));
        assert_eq!(join.lefts_of(10), vec![2]);
        assert_eq!(join.len(), 1);
    }
}
