//! Module implement the index engine.
//!
//! On every put the table's indexer callback emits typed keys into an
//! [IndexKeys] sink. The sink flat-encodes them into raw index entries
//! and canonicalizes the collection by sorting on (ordinal, key), which
//! lets the update path diff the new entries against the row's previous
//! embedded list in a single linear walk. Unique indices store the
//! primary key as a single-element tuple in the entry value; non-unique
//! indices append the primary key as the last element of the entry key
//! and store an empty value.

use std::sync::Arc;

use crate::{
    flat::Flat,
    table::{IndexH, IndexMeta},
    tuple,
    value::IndexKey,
    Error, Result,
};

// One raw index entry produced for a row.
pub(crate) struct Entry {
    pub meta: Arc<IndexMeta>,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Sink passed to a table's indexer callback. The callback emits, for
/// each applicable index, one or more typed key values; the sink may
/// not escape the current put.
pub struct IndexKeys {
    pk: Vec<u8>,
    entries: Vec<Entry>,
}

impl IndexKeys {
    pub(crate) fn new(pk: Vec<u8>) -> IndexKeys {
        IndexKeys { pk, entries: Vec::new() }
    }

    /// Emit one key value for `index`.
    pub fn put<K>(&mut self, index: &IndexH<K>, key: &K)
    where
        K: Flat,
    {
        let mut enc = tuple::Encoder::new();
        key.encode(&mut enc);
        let (key, value) = if index.meta.unique {
            (enc.finish(), tuple::encode(&[self.pk.as_slice()]))
        } else {
            enc.push(&self.pk);
            (enc.finish(), Vec::new())
        };
        self.entries.push(Entry { meta: Arc::clone(&index.meta), key, value });
    }

    /// Number of entries emitted so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // canonical order: (ordinal, raw key), duplicates collapsed.
    pub(crate) fn into_entries(mut self) -> Vec<Entry> {
        self.entries
            .sort_by(|a, b| (a.meta.ordinal(), &a.key).cmp(&(b.meta.ordinal(), &b.key)));
        self.entries
            .dedup_by(|a, b| a.meta.ordinal() == b.meta.ordinal() && a.key == b.key);
        self.entries
    }
}

// The row's new embedded index-key list, from canonicalized entries.
pub(crate) fn embedded_list(entries: &[Entry]) -> Vec<IndexKey> {
    entries
        .iter()
        .map(|e| IndexKey { ordinal: e.meta.ordinal(), key: e.key.clone() })
        .collect()
}

// Prior entries with no equal counterpart in the sorted new list. Both
// inputs are ordered by (ordinal, key), so one linear walk suffices.
pub(crate) fn diff_removed(prior: &[IndexKey], new: &[Entry]) -> Vec<IndexKey> {
    let mut removed = Vec::new();
    let mut i = 0;
    for p in prior {
        while i < new.len() {
            let cur = (new[i].meta.ordinal(), new[i].key.as_slice());
            if cur < (p.ordinal, p.key.as_slice()) {
                i += 1;
            } else {
                break;
            }
        }
        let survives =
            i < new.len() && new[i].meta.ordinal() == p.ordinal && new[i].key == p.key;
        if !survives {
            removed.push(p.clone());
        }
    }
    removed
}

/// Recover the tuple-encoded primary key from an index entry. Reads
/// accept both layouts, the legacy unique layout carrying the primary
/// key as a single-element tuple in the value, and the non-unique
/// layout carrying it as the trailing key element.
pub(crate) fn entry_primary_key(key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    if !value.is_empty() {
        let dec = tuple::Decoder::from_bytes(value)?;
        if dec.len() != 1 {
            return err_at!(
                DecodeFail, msg: "index entry value has {} elements", dec.len()
            );
        }
        Ok(dec.element(0).unwrap().to_vec())
    } else {
        let dec = tuple::Decoder::from_bytes(key)?;
        match dec.element(dec.len() - 1) {
            Some(el) => Ok(el.to_vec()),
            None => err_at!(DecodeFail, msg: "index entry key is empty"),
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
