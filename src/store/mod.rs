//! Module implement the ordered bucket store.
//!
//! Storage is a set of named, ordered key→bytes buckets behind a
//! transaction. Two backends are provided, [mem::Mstore] an in-memory
//! copy-on-write store for tests, and [disk::Dstore] a durable store
//! over an embedded B+tree file. Both are driven through the same
//! [Store]/[Stx]/[Bucket]/[Cursor] surface, so the rest of the package
//! is backend-agnostic.
//!
//! Cursors are stateless-reseek, they remember the current key and
//! re-position with one ordered query per step. That keeps the cursor
//! contract identical across backends and gives read-your-writes inside
//! a write transaction.

use std::{fmt, result};

use crate::{Error, Result};

pub mod disk;
pub mod mem;
mod range;

pub use range::Range;

/// Two-level bucket name. `sub == ""` refers to the table's root
/// bucket, a non-empty `sub` to a nested bucket under it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketName {
    pub table: String,
    pub sub: String,
}

impl BucketName {
    pub fn root(table: &str) -> BucketName {
        BucketName { table: table.to_string(), sub: String::new() }
    }

    pub fn nested(table: &str, sub: &str) -> BucketName {
        BucketName { table: table.to_string(), sub: sub.to_string() }
    }

    pub fn is_root(&self) -> bool {
        self.sub.is_empty()
    }

    /// Flattened single-level name, used by backends whose namespace is
    /// flat.
    pub fn flat(&self) -> String {
        if self.sub.is_empty() {
            self.table.clone()
        } else {
            format!("{}/{}", self.table, self.sub)
        }
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{}", self.flat())
    }
}

/// Per-bucket statistics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stats {
    pub key_count: usize,
    pub in_use_bytes: usize,
    pub alloc_bytes: usize,
}

/// Handle to an open store.
pub enum Store {
    Mem(mem::Mstore),
    Disk(disk::Dstore),
}

impl Store {
    /// Begin a read-only transaction, a consistent snapshot of the last
    /// committed state.
    pub fn begin_read(&self) -> Result<Stx> {
        match self {
            Store::Mem(m) => Ok(Stx::Mem(m.begin_read())),
            Store::Disk(d) => Ok(Stx::Disk(d.begin_read()?)),
        }
    }

    /// Begin a writable transaction. Blocks until the in-flight writer,
    /// if any, finishes.
    pub fn begin_write(&self) -> Result<Stx> {
        match self {
            Store::Mem(m) => Ok(Stx::Mem(m.begin_write())),
            Store::Disk(d) => Ok(Stx::Disk(d.begin_write()?)),
        }
    }

    pub fn close(self) -> Result<()> {
        match self {
            Store::Mem(_) => Ok(()),
            Store::Disk(d) => d.close(),
        }
    }
}

/// A storage transaction, read-only or writable.
pub enum Stx<'a> {
    Mem(mem::Mtx<'a>),
    Disk(disk::Dtx<'a>),
}

impl<'a> Stx<'a> {
    pub fn is_writable(&self) -> bool {
        match self {
            Stx::Mem(m) => m.is_writable(),
            Stx::Disk(d) => d.is_writable(),
        }
    }

    /// Look up a bucket, `None` if it was never created.
    pub fn bucket<'t>(&'t self, name: &BucketName) -> Result<Option<Bucket<'t>>> {
        if self.has_bucket(name)? {
            Ok(Some(Bucket { tx: self, name: name.clone() }))
        } else {
            Ok(None)
        }
    }

    /// Create the bucket if missing and return a handle. Creating a
    /// nested bucket implicitly ensures its root.
    pub fn ensure_bucket<'t>(&'t self, name: &BucketName) -> Result<Bucket<'t>> {
        match self {
            Stx::Mem(m) => m.ensure_bucket(name)?,
            Stx::Disk(d) => d.ensure_bucket(name)?,
        }
        Ok(Bucket { tx: self, name: name.clone() })
    }

    /// Delete a nested bucket. Root-level buckets cannot be deleted.
    pub fn delete_bucket(&self, name: &BucketName) -> Result<()> {
        if name.is_root() {
            return err_at!(BucketNotFound, msg: "cannot delete root bucket {}", name);
        }
        match self {
            Stx::Mem(m) => m.delete_bucket(name),
            Stx::Disk(d) => d.delete_bucket(name),
        }
    }

    pub fn has_bucket(&self, name: &BucketName) -> Result<bool> {
        match self {
            Stx::Mem(m) => Ok(m.has_bucket(name)),
            Stx::Disk(d) => d.has_bucket(name),
        }
    }

    /// Best-effort total size of the store in bytes.
    pub fn size(&self) -> Result<u64> {
        match self {
            Stx::Mem(m) => Ok(m.size()),
            Stx::Disk(d) => d.size(),
        }
    }

    pub fn commit(self) -> Result<()> {
        match self {
            Stx::Mem(mut m) => m.commit(),
            Stx::Disk(d) => d.commit(),
        }
    }

    pub fn rollback(self) -> Result<()> {
        match self {
            Stx::Mem(mut m) => m.rollback(),
            Stx::Disk(d) => d.rollback(),
        }
    }

    pub(crate) fn get(&self, name: &BucketName, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            Stx::Mem(m) => m.get(name, key),
            Stx::Disk(d) => d.get(name, key),
        }
    }

    pub(crate) fn put(&self, name: &BucketName, key: &[u8], value: &[u8]) -> Result<()> {
        match self {
            Stx::Mem(m) => m.put(name, key, value),
            Stx::Disk(d) => d.put(name, key, value),
        }
    }

    pub(crate) fn delete(&self, name: &BucketName, key: &[u8]) -> Result<bool> {
        match self {
            Stx::Mem(m) => m.delete(name, key),
            Stx::Disk(d) => d.delete(name, key),
        }
    }

    pub(crate) fn entry_ge(&self, name: &BucketName, key: &[u8]) -> Result<Option<KV>> {
        match self {
            Stx::Mem(m) => m.entry_ge(name, key),
            Stx::Disk(d) => d.entry_ge(name, key),
        }
    }

    pub(crate) fn entry_gt(&self, name: &BucketName, key: &[u8]) -> Result<Option<KV>> {
        match self {
            Stx::Mem(m) => m.entry_gt(name, key),
            Stx::Disk(d) => d.entry_gt(name, key),
        }
    }

    pub(crate) fn entry_lt(&self, name: &BucketName, key: &[u8]) -> Result<Option<KV>> {
        match self {
            Stx::Mem(m) => m.entry_lt(name, key),
            Stx::Disk(d) => d.entry_lt(name, key),
        }
    }

    pub(crate) fn first_entry(&self, name: &BucketName) -> Result<Option<KV>> {
        match self {
            Stx::Mem(m) => m.first_entry(name),
            Stx::Disk(d) => d.first_entry(name),
        }
    }

    pub(crate) fn last_entry(&self, name: &BucketName) -> Result<Option<KV>> {
        match self {
            Stx::Mem(m) => m.last_entry(name),
            Stx::Disk(d) => d.last_entry(name),
        }
    }

    pub(crate) fn key_count(&self, name: &BucketName) -> Result<usize> {
        match self {
            Stx::Mem(m) => m.key_count(name),
            Stx::Disk(d) => d.key_count(name),
        }
    }

    pub(crate) fn stats(&self, name: &BucketName) -> Result<Stats> {
        match self {
            Stx::Mem(m) => m.stats(name),
            Stx::Disk(d) => d.stats(name),
        }
    }
}

pub(crate) type KV = (Vec<u8>, Vec<u8>);

/// Handle to a named bucket inside a transaction.
pub struct Bucket<'a> {
    tx: &'a Stx<'a>,
    name: BucketName,
}

impl<'a> Bucket<'a> {
    pub fn name(&self) -> &BucketName {
        &self.name
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.tx.get(&self.name, key)
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.tx.put(&self.name, key, value)
    }

    /// Delete `key`, return whether it existed.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.tx.delete(&self.name, key)
    }

    pub fn cursor(&self) -> Cursor<'a> {
        Cursor { tx: self.tx, name: self.name.clone(), cur: None }
    }

    pub fn key_count(&self) -> Result<usize> {
        self.tx.key_count(&self.name)
    }

    pub fn stats(&self) -> Result<Stats> {
        self.tx.stats(&self.name)
    }
}

/// Bidirectional cursor over one bucket. Borrowed from its transaction,
/// a cursor cannot outlive it.
pub struct Cursor<'a> {
    tx: &'a Stx<'a>,
    name: BucketName,
    cur: Option<KV>,
}

impl<'a> Cursor<'a> {
    /// Current entry, if positioned.
    pub fn peek(&self) -> Option<(&[u8], &[u8])> {
        self.cur.as_ref().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.cur.as_ref().map(|(k, _)| k.as_slice())
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.cur.as_ref().map(|(_, v)| v.as_slice())
    }

    pub fn first(&mut self) -> Result<Option<(&[u8], &[u8])>> {
        self.cur = self.tx.first_entry(&self.name)?;
        Ok(self.peek())
    }

    pub fn last(&mut self) -> Result<Option<(&[u8], &[u8])>> {
        self.cur = self.tx.last_entry(&self.name)?;
        Ok(self.peek())
    }

    /// Seek to the first entry whose key is `>= key`.
    pub fn seek_ge(&mut self, key: &[u8]) -> Result<Option<(&[u8], &[u8])>> {
        self.cur = self.tx.entry_ge(&self.name, key)?;
        Ok(self.peek())
    }

    /// Seek to the last entry whose key starts with `prefix`. When no
    /// key carries the prefix this lands on the greatest key strictly
    /// below the prefix's lexicographic successor; when the prefix
    /// cannot be incremented, on the last key.
    pub fn seek_last_with_prefix(&mut self, prefix: &[u8]) -> Result<Option<(&[u8], &[u8])>> {
        self.cur = match prefix_successor(prefix) {
            Some(succ) => self.tx.entry_lt(&self.name, &succ)?,
            None => self.tx.last_entry(&self.name)?,
        };
        Ok(self.peek())
    }

    pub fn next(&mut self) -> Result<Option<(&[u8], &[u8])>> {
        self.cur = match self.cur.take() {
            Some((key, _)) => self.tx.entry_gt(&self.name, &key)?,
            None => None,
        };
        Ok(self.peek())
    }

    pub fn prev(&mut self) -> Result<Option<(&[u8], &[u8])>> {
        self.cur = match self.cur.take() {
            Some((key, _)) => self.tx.entry_lt(&self.name, &key)?,
            None => None,
        };
        Ok(self.peek())
    }

    /// Delete the entry under the cursor. The position is kept for
    /// subsequent [Cursor::next]/[Cursor::prev] navigation.
    pub fn delete_current(&mut self) -> Result<()> {
        match &self.cur {
            Some((key, _)) => {
                self.tx.delete(&self.name, key)?;
                Ok(())
            }
            None => err_at!(Invalid, msg: "cursor not positioned"),
        }
    }
}

/// Smallest byte-string greater than every string prefixed by `prefix`,
/// `None` when all bytes are 0xFF.
pub(crate) fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut succ = prefix.to_vec();
    while let Some(last) = succ.last() {
        if *last == 0xff {
            succ.pop();
        } else {
            *succ.last_mut().unwrap() += 1;
            return Some(succ);
        }
    }
    None
}
