//! Durable backend over an embedded B+tree file store.
//!
//! The concrete page format belongs to [redb]; this module adapts its
//! tables to the package's bucket naming and cursor contract. One
//! writable transaction at a time is enforced by the underlying store,
//! readers run against MVCC snapshots.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition, TableHandle,
};

use std::{convert::TryFrom, ffi, fs, ops::Bound, path};

use crate::{
    store::{BucketName, Stats, KV},
    Error, Result,
};

fn table_def(name: &str) -> TableDefinition<&'static [u8], &'static [u8]> {
    TableDefinition::new(name)
}

/// Durable store backed by a single database file.
pub struct Dstore {
    db: Database,
    location: ffi::OsString,
}

impl Dstore {
    /// Open the database file at `location`, creating it if missing.
    pub fn open(location: &ffi::OsStr) -> Result<Dstore> {
        let db = err_at!(IOError, Database::create(path::Path::new(location)))?;
        Ok(Dstore { db, location: location.to_os_string() })
    }

    pub fn to_location(&self) -> ffi::OsString {
        self.location.clone()
    }

    pub(crate) fn begin_read(&self) -> Result<Dtx> {
        let rtx = err_at!(IOError, self.db.begin_read())?;
        Ok(Dtx { store: self, inner: Dinner::Read(rtx) })
    }

    pub(crate) fn begin_write(&self) -> Result<Dtx> {
        let wtx = err_at!(IOError, self.db.begin_write())?;
        Ok(Dtx { store: self, inner: Dinner::Write(wtx) })
    }

    pub fn close(self) -> Result<()> {
        // dropping the database flushes and releases the file.
        Ok(())
    }
}

enum Dinner {
    Write(redb::WriteTransaction),
    Read(redb::ReadTransaction),
}

/// Transaction over [Dstore].
pub struct Dtx<'a> {
    store: &'a Dstore,
    inner: Dinner,
}

impl<'a> Dtx<'a> {
    pub fn is_writable(&self) -> bool {
        matches!(self.inner, Dinner::Write(_))
    }

    pub(crate) fn commit(self) -> Result<()> {
        match self.inner {
            Dinner::Write(wtx) => err_at!(IOError, wtx.commit()),
            Dinner::Read(_) => Ok(()),
        }
    }

    pub(crate) fn rollback(self) -> Result<()> {
        match self.inner {
            Dinner::Write(wtx) => err_at!(IOError, wtx.abort()),
            Dinner::Read(_) => Ok(()),
        }
    }

    pub(crate) fn has_bucket(&self, name: &BucketName) -> Result<bool> {
        self.has_table(&name.flat())
    }

    fn has_table(&self, flat: &str) -> Result<bool> {
        let found = match &self.inner {
            Dinner::Write(wtx) => err_at!(IOError, wtx.list_tables())?
                .any(|h| h.name() == flat),
            Dinner::Read(rtx) => err_at!(IOError, rtx.list_tables())?
                .any(|h| h.name() == flat),
        };
        Ok(found)
    }

    fn require_write(&self) -> Result<&redb::WriteTransaction> {
        match &self.inner {
            Dinner::Write(wtx) => Ok(wtx),
            Dinner::Read(_) => err_at!(Invalid, msg: "write on read-only transaction"),
        }
    }

    pub(crate) fn ensure_bucket(&self, name: &BucketName) -> Result<()> {
        let wtx = self.require_write()?;
        let root = BucketName::root(&name.table).flat();
        err_at!(IOError, wtx.open_table(table_def(&root)))?;
        if !name.is_root() {
            let flat = name.flat();
            err_at!(IOError, wtx.open_table(table_def(&flat)))?;
        }
        Ok(())
    }

    pub(crate) fn delete_bucket(&self, name: &BucketName) -> Result<()> {
        let wtx = self.require_write()?;
        let flat = name.flat();
        err_at!(IOError, wtx.delete_table(table_def(&flat)))?;
        Ok(())
    }

    pub(crate) fn get(&self, name: &BucketName, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let flat = name.flat();
        match &self.inner {
            Dinner::Write(wtx) => {
                if !self.has_table(&flat)? {
                    return Ok(None);
                }
                let table = err_at!(IOError, wtx.open_table(table_def(&flat)))?;
                let result = err_at!(IOError, table.get(key))?;
                match result {
                    Some(guard) => Ok(Some(guard.value().to_vec())),
                    None => Ok(None),
                }
            }
            Dinner::Read(rtx) => match rtx.open_table(table_def(&flat)) {
                Ok(table) => match err_at!(IOError, table.get(key))? {
                    Some(guard) => Ok(Some(guard.value().to_vec())),
                    None => Ok(None),
                },
                Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
                Err(err) => err_at!(IOError, Err(err)),
            },
        }
    }

    pub(crate) fn put(&self, name: &BucketName, key: &[u8], value: &[u8]) -> Result<()> {
        let flat = name.flat();
        if !self.has_table(&flat)? {
            return err_at!(BucketNotFound, msg: "{}", name);
        }
        let wtx = self.require_write()?;
        let mut table = err_at!(IOError, wtx.open_table(table_def(&flat)))?;
        err_at!(IOError, table.insert(key, value))?;
        Ok(())
    }

    pub(crate) fn delete(&self, name: &BucketName, key: &[u8]) -> Result<bool> {
        let flat = name.flat();
        if !self.has_table(&flat)? {
            return err_at!(BucketNotFound, msg: "{}", name);
        }
        let wtx = self.require_write()?;
        let mut table = err_at!(IOError, wtx.open_table(table_def(&flat)))?;
        let old = err_at!(IOError, table.remove(key))?;
        Ok(old.is_some())
    }

    // position within an ordered window over the bucket, front or back.
    fn query(
        &self,
        name: &BucketName,
        bounds: (Bound<&[u8]>, Bound<&[u8]>),
        back: bool,
    ) -> Result<Option<KV>> {
        let flat = name.flat();
        match &self.inner {
            Dinner::Write(wtx) => {
                if !self.has_table(&flat)? {
                    return Ok(None);
                }
                let table = err_at!(IOError, wtx.open_table(table_def(&flat)))?;
                seek_table(&table, bounds, back)
            }
            Dinner::Read(rtx) => match rtx.open_table(table_def(&flat)) {
                Ok(table) => seek_table(&table, bounds, back),
                Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
                Err(err) => err_at!(IOError, Err(err)),
            },
        }
    }

    pub(crate) fn entry_ge(&self, name: &BucketName, key: &[u8]) -> Result<Option<KV>> {
        self.query(name, (Bound::Included(key), Bound::Unbounded), false)
    }

    pub(crate) fn entry_gt(&self, name: &BucketName, key: &[u8]) -> Result<Option<KV>> {
        self.query(name, (Bound::Excluded(key), Bound::Unbounded), false)
    }

    pub(crate) fn entry_lt(&self, name: &BucketName, key: &[u8]) -> Result<Option<KV>> {
        self.query(name, (Bound::Unbounded, Bound::Excluded(key)), true)
    }

    pub(crate) fn first_entry(&self, name: &BucketName) -> Result<Option<KV>> {
        self.query(name, (Bound::Unbounded, Bound::Unbounded), false)
    }

    pub(crate) fn last_entry(&self, name: &BucketName) -> Result<Option<KV>> {
        self.query(name, (Bound::Unbounded, Bound::Unbounded), true)
    }

    pub(crate) fn key_count(&self, name: &BucketName) -> Result<usize> {
        Ok(self.stats(name)?.key_count)
    }

    pub(crate) fn stats(&self, name: &BucketName) -> Result<Stats> {
        let flat = name.flat();
        match &self.inner {
            Dinner::Write(wtx) => {
                if !self.has_table(&flat)? {
                    return Ok(Stats::default());
                }
                let table = err_at!(IOError, wtx.open_table(table_def(&flat)))?;
                table_stats(&table)
            }
            Dinner::Read(rtx) => match rtx.open_table(table_def(&flat)) {
                Ok(table) => table_stats(&table),
                Err(redb::TableError::TableDoesNotExist(_)) => Ok(Stats::default()),
                Err(err) => err_at!(IOError, Err(err)),
            },
        }
    }

    pub(crate) fn size(&self) -> Result<u64> {
        let meta = err_at!(IOError, fs::metadata(path::Path::new(&self.store.location)))?;
        Ok(meta.len())
    }
}

fn seek_table<T>(
    table: &T,
    bounds: (Bound<&[u8]>, Bound<&[u8]>),
    back: bool,
) -> Result<Option<KV>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut iter = err_at!(IOError, table.range::<&[u8]>(bounds))?;
    let item = if back { iter.next_back() } else { iter.next() };
    match item {
        Some(Ok((k, v))) => Ok(Some((k.value().to_vec(), v.value().to_vec()))),
        Some(Err(err)) => err_at!(IOError, Err(err)),
        None => Ok(None),
    }
}

fn table_stats<T>(table: &T) -> Result<Stats>
where
    T: ReadableTableMetadata,
{
    let key_count = {
        let n = err_at!(IOError, table.len())?;
        err_at!(FailConvert, usize::try_from(n))?
    };
    let st = err_at!(IOError, table.stats())?;
    let in_use = err_at!(FailConvert, usize::try_from(st.stored_bytes()))?;
    let meta = err_at!(FailConvert, usize::try_from(st.metadata_bytes()))?;
    let frag = err_at!(FailConvert, usize::try_from(st.fragmented_bytes()))?;
    Ok(Stats { key_count, in_use_bytes: in_use, alloc_bytes: in_use + meta + frag })
}

#[cfg(test)]
#[path = "disk_test.rs"]
mod disk_test;
