//! In-memory backend.
//!
//! One background writer at a time, writers serialize on a condition
//! variable. Readers take an immutable snapshot of the root map, an
//! `Arc` pointer, and never block. Writers clone the root map of `Arc`
//! bucket pointers and copy a bucket only on first write to it, so a
//! transaction touching few buckets stays cheap even with many buckets
//! in the store.

use std::{
    cell::Cell,
    collections::BTreeMap,
    ops::Bound,
    sync::{Arc, Condvar, Mutex},
};

use crate::{
    store::{BucketName, Stats, KV},
    Error, Result,
};

type BucketMap = BTreeMap<Vec<u8>, Vec<u8>>;
type RootMap = BTreeMap<BucketName, Arc<BucketMap>>;

/// In-memory store, for tests and scratch databases. Clones share the
/// same underlying store.
#[derive(Clone)]
pub struct Mstore {
    name: String,
    root: Arc<Mutex<Arc<RootMap>>>,
    writer: Arc<Mutex<bool>>,
    cv: Arc<Condvar>,
}

impl Mstore {
    pub fn new(name: &str) -> Mstore {
        Mstore {
            name: name.to_string(),
            root: Arc::new(Mutex::new(Arc::new(RootMap::new()))),
            writer: Arc::new(Mutex::new(false)),
            cv: Arc::new(Condvar::new()),
        }
    }

    pub fn to_name(&self) -> String {
        self.name.clone()
    }

    pub(crate) fn begin_read(&self) -> Mtx {
        let snapshot = Arc::clone(&self.root.lock().unwrap());
        Mtx {
            store: self,
            writable: false,
            snapshot,
            dirty: None,
            finished: Cell::new(false),
        }
    }

    pub(crate) fn begin_write(&self) -> Mtx {
        let mut busy = self.writer.lock().unwrap();
        while *busy {
            busy = self.cv.wait(busy).unwrap();
        }
        *busy = true;
        drop(busy);

        let snapshot = Arc::clone(&self.root.lock().unwrap());
        let dirty = (*snapshot).clone(); // clones Arc pointers per bucket
        Mtx {
            store: self,
            writable: true,
            snapshot,
            dirty: Some(Mutex::new(dirty)),
            finished: Cell::new(false),
        }
    }

    fn release_writer(&self) {
        let mut busy = self.writer.lock().unwrap();
        *busy = false;
        self.cv.notify_one();
    }
}

/// Transaction over [Mstore].
pub struct Mtx<'a> {
    store: &'a Mstore,
    writable: bool,
    snapshot: Arc<RootMap>,
    dirty: Option<Mutex<RootMap>>,
    finished: Cell<bool>,
}

impl<'a> Drop for Mtx<'a> {
    fn drop(&mut self) {
        if self.writable && !self.finished.get() {
            self.store.release_writer();
        }
    }
}

impl<'a> Mtx<'a> {
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub(crate) fn commit(&mut self) -> Result<()> {
        if self.finished.get() {
            return err_at!(Invalid, msg: "transaction already finished");
        }
        if self.writable {
            let dirty = match self.dirty.take() {
                Some(dirty) => err_at!(Fatal, dirty.into_inner())?,
                None => return err_at!(Fatal, msg: "writable txn without working set"),
            };
            *self.store.root.lock().unwrap() = Arc::new(dirty);
            self.finished.set(true);
            self.store.release_writer();
        } else {
            self.finished.set(true);
        }
        Ok(())
    }

    pub(crate) fn rollback(&mut self) -> Result<()> {
        if self.finished.get() {
            return err_at!(Invalid, msg: "transaction already finished");
        }
        self.dirty = None;
        self.finished.set(true);
        if self.writable {
            self.store.release_writer();
        }
        Ok(())
    }

    fn require_writable(&self) -> Result<&Mutex<RootMap>> {
        match &self.dirty {
            Some(dirty) => Ok(dirty),
            None => err_at!(Invalid, msg: "write on read-only transaction"),
        }
    }

    // run `f` against the bucket's current map, `None` if the bucket
    // does not exist.
    fn with_map<T, F>(&self, name: &BucketName, f: F) -> T
    where
        F: FnOnce(Option<&BucketMap>) -> T,
    {
        match &self.dirty {
            Some(dirty) => {
                let guard = dirty.lock().unwrap();
                f(guard.get(name).map(Arc::as_ref))
            }
            None => f(self.snapshot.get(name).map(Arc::as_ref)),
        }
    }

    pub(crate) fn has_bucket(&self, name: &BucketName) -> bool {
        self.with_map(name, |m| m.is_some())
    }

    pub(crate) fn ensure_bucket(&self, name: &BucketName) -> Result<()> {
        let dirty = self.require_writable()?;
        let mut guard = dirty.lock().unwrap();
        guard
            .entry(BucketName::root(&name.table))
            .or_insert_with(|| Arc::new(BucketMap::new()));
        if !name.is_root() {
            guard.entry(name.clone()).or_insert_with(|| Arc::new(BucketMap::new()));
        }
        Ok(())
    }

    pub(crate) fn delete_bucket(&self, name: &BucketName) -> Result<()> {
        let dirty = self.require_writable()?;
        dirty.lock().unwrap().remove(name);
        Ok(())
    }

    pub(crate) fn get(&self, name: &BucketName, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.with_map(name, |m| m.and_then(|m| m.get(key).cloned())))
    }

    pub(crate) fn put(&self, name: &BucketName, key: &[u8], value: &[u8]) -> Result<()> {
        let dirty = self.require_writable()?;
        let mut guard = dirty.lock().unwrap();
        match guard.get_mut(name) {
            Some(map) => {
                Arc::make_mut(map).insert(key.to_vec(), value.to_vec());
                Ok(())
            }
            None => err_at!(BucketNotFound, msg: "{}", name),
        }
    }

    pub(crate) fn delete(&self, name: &BucketName, key: &[u8]) -> Result<bool> {
        let dirty = self.require_writable()?;
        let mut guard = dirty.lock().unwrap();
        match guard.get_mut(name) {
            Some(map) => Ok(Arc::make_mut(map).remove(key).is_some()),
            None => err_at!(BucketNotFound, msg: "{}", name),
        }
    }

    pub(crate) fn entry_ge(&self, name: &BucketName, key: &[u8]) -> Result<Option<KV>> {
        Ok(self.with_map(name, |m| {
            m.and_then(|m| {
                m.range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
                    .next()
                    .map(|(k, v)| (k.clone(), v.clone()))
            })
        }))
    }

    pub(crate) fn entry_gt(&self, name: &BucketName, key: &[u8]) -> Result<Option<KV>> {
        Ok(self.with_map(name, |m| {
            m.and_then(|m| {
                m.range::<[u8], _>((Bound::Excluded(key), Bound::Unbounded))
                    .next()
                    .map(|(k, v)| (k.clone(), v.clone()))
            })
        }))
    }

    pub(crate) fn entry_lt(&self, name: &BucketName, key: &[u8]) -> Result<Option<KV>> {
        Ok(self.with_map(name, |m| {
            m.and_then(|m| {
                m.range::<[u8], _>((Bound::Unbounded, Bound::Excluded(key)))
                    .next_back()
                    .map(|(k, v)| (k.clone(), v.clone()))
            })
        }))
    }

    pub(crate) fn first_entry(&self, name: &BucketName) -> Result<Option<KV>> {
        Ok(self.with_map(name, |m| {
            m.and_then(|m| m.iter().next().map(|(k, v)| (k.clone(), v.clone())))
        }))
    }

    pub(crate) fn last_entry(&self, name: &BucketName) -> Result<Option<KV>> {
        Ok(self.with_map(name, |m| {
            m.and_then(|m| m.iter().next_back().map(|(k, v)| (k.clone(), v.clone())))
        }))
    }

    pub(crate) fn key_count(&self, name: &BucketName) -> Result<usize> {
        Ok(self.with_map(name, |m| m.map(BTreeMap::len).unwrap_or(0)))
    }

    pub(crate) fn stats(&self, name: &BucketName) -> Result<Stats> {
        Ok(self.with_map(name, |m| match m {
            Some(m) => {
                let in_use: usize = m.iter().map(|(k, v)| k.len() + v.len()).sum();
                Stats { key_count: m.len(), in_use_bytes: in_use, alloc_bytes: in_use }
            }
            None => Stats::default(),
        }))
    }

    pub(crate) fn size(&self) -> u64 {
        let total = |root: &RootMap| -> u64 {
            root.values()
                .flat_map(|m| m.iter())
                .map(|(k, v)| (k.len() + v.len()) as u64)
                .sum()
        };
        match &self.dirty {
            Some(dirty) => total(&dirty.lock().unwrap()),
            None => total(&self.snapshot),
        }
    }
}

#[cfg(test)]
#[path = "mem_test.rs"]
mod mem_test;
