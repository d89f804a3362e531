//! Hash-consing tables (§4.1).
//!
//! Each table maps a structural hash to a value. Insertion returns the hash;
//! collisions are not assumed impossible, so the original value is stored
//! alongside the hash and re-verified on every lookup — a mismatch is an
//! [`Error::IntegrityError`], never a silently wrong answer.
//!
//! Analogous to `plotnik_core::Interner`, generalized from string-only
//! interning to any `Clone + Eq` content.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::stable_hash::stable_hash;

/// A content-addressed table. Iteration order is insertion order, which is
/// what makes the packer's "dense indices by iteration order" (§4.4)
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct HashConsTable<T> {
    name: &'static str,
    by_hash: HashMap<u64, u32>,
    entries: Vec<T>,
}

impl<T: Clone + PartialEq + std::hash::Hash> HashConsTable<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            by_hash: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Intern `value`, returning its structural hash (the table key).
    /// Deduplicates by hash and verifies equality with the stored value on
    /// reuse; a hash collision between structurally distinct values is an
    /// `IntegrityError` (§4.1).
    pub fn intern(&mut self, value: T) -> Result<u64> {
        let hash = stable_hash(&value);
        match self.by_hash.get(&hash) {
            Some(&index) if self.entries[index as usize] == value => Ok(hash),
            Some(_) => Err(Error::IntegrityError {
                table: self.name,
                hash,
            }),
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(value);
                self.by_hash.insert(hash, index);
                Ok(hash)
            }
        }
    }

    /// Dense index of a previously-interned hash, used by the packer once
    /// every value has been collected (§4.4).
    pub fn index_of(&self, hash: u64) -> Option<u32> {
        self.by_hash.get(&hash).copied()
    }

    pub fn get_by_hash(&self, hash: u64) -> Option<&T> {
        self.by_hash.get(&hash).map(|&i| &self.entries[i as usize])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in insertion order — the order the packer assigns dense
    /// indices in.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Consume the table into its dense, index-addressed array (§4.4
    /// "materialized into dense index-addressed arrays").
    pub fn into_vec(self) -> Vec<T> {
        self.entries
    }
}

#[cfg(test)]
#[path = "interner_tests.rs"]
mod interner_tests;
