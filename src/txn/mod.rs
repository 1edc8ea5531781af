//! Module implement the transaction core.
//!
//! A [Db] couples an ordered bucket [Store] with a [Schema] of table
//! definitions. Transactions follow a one writer / many readers
//! discipline: [Db::write] blocks until the in-flight writer finishes,
//! [Db::read] runs against a consistent snapshot and never blocks
//! writers. Write callbacks that error without having written still
//! commit (the batch stays committable); once a callback has written,
//! an error aborts the transaction unless it opted into
//! [Txn::set_commit_despite_error]. Panics inside callbacks are
//! captured and surfaced as [Error::Fatal].
//!
//! The put pipeline owns the mod-count rule: a put producing
//! byte-identical data and index-key list is a no-op; mod count
//! advances only when the data bytes change.

use lazy_static::lazy_static;
use log::{debug, info};

use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::HashMap,
    ops::{BitOr, Bound, RangeBounds},
    panic,
    rc::Rc,
    sync::{
        atomic::{AtomicU64, Ordering::SeqCst},
        Arc, Mutex,
    },
};

use crate::{
    flat::{self, Flat},
    index::{self, IndexKeys},
    scan::{self, IndexIter, PrimaryIter, Strategy},
    store::{Bucket, BucketName, Store, Stx},
    table::{state::TableState, IndexH, IndexMeta, KvTable, Row, Schema, Table},
    util,
    value::{Value, FLAG_VERSION1},
    Error, Result,
};

/// Configuration recognized at open.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Relax durability and enable tighter internal assertions.
    pub is_testing: bool,
    /// Per-operation logging through the `log` facade.
    pub verbose: bool,
    /// Return pooled buffers for reuse when a transaction closes.
    /// Off by default.
    pub reuse_buffers: bool,
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    pub fn set_testing(&mut self, is_testing: bool) -> &mut Self {
        self.is_testing = is_testing;
        self
    }

    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    pub fn set_reuse_buffers(&mut self, reuse: bool) -> &mut Self {
        self.reuse_buffers = reuse;
        self
    }
}

/// Mutation kind carried by a [Change].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Put,
    Delete,
}

/// Payload selection for change handlers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeFlags(u32);

impl ChangeFlags {
    pub const NONE: ChangeFlags = ChangeFlags(0);
    /// Deliver the decoded primary key.
    pub const WANT_KEY: ChangeFlags = ChangeFlags(0x1);
    /// Deliver a reference to the new row on puts.
    pub const WANT_NEW_ROW: ChangeFlags = ChangeFlags(0x2);
    /// Deliver the decoded previous row, when one existed.
    pub const WANT_OLD_ROW: ChangeFlags = ChangeFlags(0x4);

    pub fn contains(self, other: ChangeFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ChangeFlags {
    type Output = ChangeFlags;

    fn bitor(self, rhs: ChangeFlags) -> ChangeFlags {
        ChangeFlags(self.0 | rhs.0)
    }
}

/// One mutation, delivered inline to registered handlers within the
/// same transaction, in invocation order. Handler errors abort the
/// transaction.
pub struct Change<'a, R>
where
    R: Row,
{
    pub op: Op,
    pub table: String,
    pub raw_key: &'a [u8],
    pub key: Option<R::Key>,
    pub new_row: Option<&'a R>,
    pub old_row: Option<R>,
}

lazy_static! {
    static ref KEY_POOL: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());
    static ref VALUE_POOL: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());
    static ref INDEX_KEY_POOL: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());
    static ref INDEX_VALUE_POOL: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());
}

#[derive(Clone, Copy)]
pub(crate) enum Pool {
    Key,
    Value,
    IndexKey,
    IndexValue,
}

fn pool_of(pool: Pool) -> &'static Mutex<Vec<Vec<u8>>> {
    match pool {
        Pool::Key => &KEY_POOL,
        Pool::Value => &VALUE_POOL,
        Pool::IndexKey => &INDEX_KEY_POOL,
        Pool::IndexValue => &INDEX_VALUE_POOL,
    }
}

static N_READERS: AtomicU64 = AtomicU64::new(0);
static N_WRITERS: AtomicU64 = AtomicU64::new(0);

/// Process-wide count of transactions currently inside [Db::read].
pub fn active_readers() -> u64 {
    N_READERS.load(SeqCst)
}

/// Process-wide count of transactions currently inside [Db::write].
pub fn active_writers() -> u64 {
    N_WRITERS.load(SeqCst)
}

// schema-lifecycle entry point, object safe so the registry can drive
// heterogenous tables.
pub(crate) trait TableHook: Send + Sync {
    fn to_name(&self) -> String;

    fn open(&self, txn: &Txn) -> Result<()>;
}

/// Embedded database handle.
pub struct Db {
    config: Config,
    schema: Schema,
    store: Store,
}

impl Db {
    /// Open the database: ensure every table's buckets, load table
    /// states, allocate ordinals for new indices, drop removed ones and
    /// rebuild any index not yet built.
    pub fn open(config: Config, schema: Schema, store: Store) -> Result<Db> {
        let db = Db { config, schema, store };
        db.write(|txn| {
            for hook in &db.schema.hooks {
                hook.open(txn)?;
            }
            for kv in &db.schema.kv {
                txn.stx.ensure_bucket(&kv.bucket())?;
                for index in &kv.def.indices {
                    txn.stx.ensure_bucket(&kv.index_bucket(index))?;
                }
            }
            Ok(())
        })?;
        info!(
            target: "emdb  ",
            "opened database with {} typed and {} kv tables",
            db.schema.hooks.len(),
            db.schema.kv.len()
        );
        Ok(db)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Look up the registered table for row type `R`.
    pub fn table<R>(&self) -> Result<Table<R>>
    where
        R: Row,
    {
        self.schema.table::<R>()
    }

    /// Run `cb` inside a read-only snapshot transaction.
    pub fn read<T, F>(&self, cb: F) -> Result<T>
    where
        F: FnOnce(&Txn) -> Result<T>,
    {
        let stx = self.store.begin_read()?;
        N_READERS.fetch_add(1, SeqCst);
        let res = self.run_tx(stx, cb);
        N_READERS.fetch_sub(1, SeqCst);
        res
    }

    /// Run `cb` inside the single writable transaction.
    pub fn write<T, F>(&self, cb: F) -> Result<T>
    where
        F: FnOnce(&Txn) -> Result<T>,
    {
        let stx = self.store.begin_write()?;
        N_WRITERS.fetch_add(1, SeqCst);
        let res = self.run_tx(stx, cb);
        N_WRITERS.fetch_sub(1, SeqCst);
        res
    }

    /// Batched variant of [Db::write]: a callback that errors after
    /// writing is retried once before the error is surfaced.
    pub fn batch<T, F>(&self, cb: F) -> Result<T>
    where
        F: Fn(&Txn) -> Result<T>,
    {
        match self.write(&cb) {
            Ok(val) => Ok(val),
            Err(Error::Fatal(p, m)) => Err(Error::Fatal(p, m)),
            Err(_) => self.write(&cb),
        }
    }

    fn run_tx<T, F>(&self, stx: Stx, cb: F) -> Result<T>
    where
        F: FnOnce(&Txn) -> Result<T>,
    {
        let txn = Txn::new(&self.config, stx);
        let out = panic::catch_unwind(panic::AssertUnwindSafe(|| cb(&txn)));
        match out {
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                txn.finish(false)?;
                err_at!(Fatal, msg: "panic in transaction: {}", msg)
            }
            Ok(Ok(val)) => {
                txn.finish(true)?;
                Ok(val)
            }
            Ok(Err(err)) => {
                // an un-written transaction stays committable; a
                // written one aborts unless it opted in.
                let commit = !txn.written.get() || txn.commit_despite_err.get();
                txn.finish(commit)?;
                Err(err)
            }
        }
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// An open transaction. Obtained only through [Db::read], [Db::write]
/// or [Db::batch]; completes when the callback returns.
pub struct Txn<'a> {
    verbose: bool,
    is_testing: bool,
    reuse_buffers: bool,
    pub(crate) stx: Stx<'a>,
    memo: RefCell<HashMap<String, Rc<dyn Any>>>,
    written: Cell<bool>,
    commit_despite_err: Cell<bool>,
    retired: RefCell<Vec<(Pool, Vec<u8>)>>,
}

impl<'a> Txn<'a> {
    fn new(config: &Config, stx: Stx<'a>) -> Txn<'a> {
        Txn {
            verbose: config.verbose,
            is_testing: config.is_testing,
            reuse_buffers: config.reuse_buffers,
            stx,
            memo: RefCell::new(HashMap::new()),
            written: Cell::new(false),
            commit_despite_err: Cell::new(false),
            retired: RefCell::new(Vec::new()),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.stx.is_writable()
    }

    /// Whether this transaction has written anything yet.
    pub fn has_written(&self) -> bool {
        self.written.get()
    }

    /// Opt in to committing writes even when the callback returns an
    /// error; the error is still surfaced to the caller.
    pub fn set_commit_despite_error(&self) {
        self.commit_despite_err.set(true);
    }

    /// Best-effort size of the underlying store.
    pub fn size(&self) -> Result<u64> {
        self.stx.size()
    }

    /// Cache an idempotent-within-transaction computation under `key`.
    pub fn memoize<T, F>(&self, key: &str, compute: F) -> Result<Rc<T>>
    where
        T: 'static,
        F: FnOnce() -> Result<T>,
    {
        if let Some(any) = self.memo.borrow().get(key) {
            if let Ok(rc) = Rc::clone(any).downcast::<T>() {
                return Ok(rc);
            }
        }
        let rc = Rc::new(compute()?);
        self.memo.borrow_mut().insert(key.to_string(), rc.clone() as Rc<dyn Any>);
        Ok(rc)
    }

    fn require_writable(&self) -> Result<()> {
        if self.stx.is_writable() {
            Ok(())
        } else {
            err_at!(Invalid, msg: "mutation inside read-only transaction")
        }
    }

    fn set_written(&self) {
        self.written.set(true);
    }

    pub(crate) fn take_buf(&self, pool: Pool) -> Vec<u8> {
        match pool_of(pool).lock().unwrap().pop() {
            Some(mut buf) => {
                buf.clear();
                buf
            }
            None => Vec::new(),
        }
    }

    pub(crate) fn retire_buf(&self, pool: Pool, buf: Vec<u8>) {
        self.retired.borrow_mut().push((pool, buf));
    }

    // pooled buffers go back only as the transaction closes, and only
    // when reuse is enabled.
    fn release_bufs(&self) {
        let retired: Vec<(Pool, Vec<u8>)> = self.retired.borrow_mut().drain(..).collect();
        if self.reuse_buffers {
            for (pool, buf) in retired {
                pool_of(pool).lock().unwrap().push(buf);
            }
        }
    }

    fn finish(self, commit: bool) -> Result<()> {
        self.release_bufs();
        if commit {
            self.stx.commit()
        } else {
            self.stx.rollback()
        }
    }
}

impl<R> TableHook for Table<R>
where
    R: Row,
{
    fn to_name(&self) -> String {
        Table::to_name(self)
    }

    fn open(&self, txn: &Txn) -> Result<()> {
        use crate::table::{index_sub, state::IndexState};

        let def = &self.core.def;
        let root = txn.stx.ensure_bucket(&self.root_bucket())?;
        txn.stx.ensure_bucket(&self.data_bucket())?;

        let mut state = TableState::load(&root)?.unwrap_or_default();
        if state.min_schema_version == 0 || def.schema_version < state.min_schema_version
        {
            state.min_schema_version = def.schema_version;
        }

        // attach known indices, allocate fresh ordinals for new ones.
        for meta in &def.indices {
            match state.index(&meta.name) {
                Some(ix) => {
                    meta.set_ordinal(ix.ordinal);
                    meta.set_built(ix.built);
                }
                None => {
                    let ordinal = state.allocate_ordinal();
                    let built = meta.skip_initial_fill;
                    meta.set_ordinal(ordinal);
                    meta.set_built(built);
                    state.indices.push(IndexState {
                        name: meta.name.clone(),
                        ordinal,
                        built,
                    });
                    info!(
                        target: "emdb  ",
                        "{}, new index {} ordinal {}", def.name, meta.name, ordinal
                    );
                }
            }
            txn.stx.ensure_bucket(&self.index_bucket(meta))?;
        }

        // drop indices that left the definition; their ordinals are
        // never reused.
        let removed: Vec<IndexState> = state
            .indices
            .iter()
            .filter(|ix| !def.indices.iter().any(|meta| meta.name == ix.name))
            .cloned()
            .collect();
        for ix in &removed {
            let bucket = BucketName::nested(&def.name, &index_sub(&ix.name));
            if txn.stx.has_bucket(&bucket)? {
                txn.stx.delete_bucket(&bucket)?;
            }
            info!(target: "emdb  ", "{}, dropped index {}", def.name, ix.name);
        }
        state.indices.retain(|ix| def.indices.iter().any(|meta| meta.name == ix.name));

        // backfill pending indices with a full re-put scan.
        let pending: Vec<Arc<IndexMeta>> = def
            .indices
            .iter()
            .filter(|meta| !meta.is_built())
            .map(Arc::clone)
            .collect();
        if !pending.is_empty() {
            info!(
                target: "emdb  ",
                "{}, rebuilding {} indices ...", def.name, pending.len()
            );
            let rows: Vec<(Vec<u8>, Vec<u8>)> = {
                let data = match txn.stx.bucket(&self.data_bucket())? {
                    Some(bucket) => bucket,
                    None => return err_at!(BucketNotFound, msg: "{}", self.data_bucket()),
                };
                let mut cur = data.cursor();
                let mut rows = vec![];
                let mut entry = cur.first()?.map(|(k, v)| (k.to_vec(), v.to_vec()));
                while let Some(kv) = entry {
                    rows.push(kv);
                    entry = cur.next()?.map(|(k, v)| (k.to_vec(), v.to_vec()));
                }
                rows
            };
            for (key, bytes) in rows {
                let row = scan::decode_stored_row(self, &key, &bytes)?;
                self.put(txn, &row)?;
            }
            for meta in &pending {
                meta.set_built(true);
                if let Some(ix) = state.index_mut(&meta.name) {
                    ix.built = true;
                }
            }
        }

        state.last_seen_at = unix_seconds();
        state.save(&root)?;
        Ok(())
    }
}

fn unix_seconds() -> i64 {
    use std::time;

    match time::SystemTime::now().duration_since(time::UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(_) => 0,
    }
}

impl<R> Table<R>
where
    R: Row,
{
    /// Store `row` under its primary key, incrementally maintaining
    /// secondary indices. A put whose data bytes and index-key list
    /// both match the stored row is a no-op.
    pub fn put(&self, txn: &Txn, row: &R) -> Result<()> {
        txn.require_writable()?;
        let def = &self.core.def;

        let pk = row.primary_key();
        let key_bytes = flat::encode_key_into(&pk, txn.take_buf(Pool::Key));
        if key_bytes == self.core.zero_key {
            return err_at!(Invalid, msg: "zero primary key on table {}", def.name);
        }

        let data = self.data_bucket_of(txn)?;
        let prev = match data.get(&key_bytes)? {
            Some(bytes) => match Value::decode(&bytes) {
                Ok(val) => Some(val),
                Err(err) => {
                    return Err(scan::wrap_corruption(&def.name, None, &key_bytes, err))
                }
            },
            None => None,
        };

        let mut sink = IndexKeys::new(key_bytes.clone());
        if let Some(indexer) = &def.indexer {
            indexer(row, &mut sink);
        }
        let entries = sink.into_entries();
        if txn.is_testing {
            // canonical order is what the diff walk relies on.
            assert!(entries.windows(2).all(|w| {
                (w[0].meta.ordinal(), &w[0].key) <= (w[1].meta.ordinal(), &w[1].key)
            }));
        }
        let new_list = index::embedded_list(&entries);

        let mut payload = txn.take_buf(Pool::Value);
        row.encode_row(&mut payload)?;

        if let Some(prev) = &prev {
            if prev.data == payload && prev.index_keys == new_list {
                txn.retire_buf(Pool::Key, key_bytes);
                txn.retire_buf(Pool::Value, payload);
                return Ok(());
            }
        }

        let mod_count = match &prev {
            Some(p) if p.data == payload => p.mod_count,
            Some(p) => p.mod_count + 1,
            None => 1,
        };

        // deletions first: entries the previous row carried that the
        // new row no longer emits.
        let prior: &[crate::value::IndexKey] =
            prev.as_ref().map(|p| p.index_keys.as_slice()).unwrap_or(&[]);
        for removed in index::diff_removed(prior, &entries) {
            match self.index_by_ordinal(removed.ordinal) {
                Some(meta) => {
                    if let Some(bucket) = txn.stx.bucket(&self.index_bucket(&meta))? {
                        bucket.delete(&removed.key)?;
                    }
                }
                // the index was dropped; its stale ordinal is ignored.
                None => (),
            }
        }

        for entry in &entries {
            match txn.stx.bucket(&self.index_bucket(&entry.meta))? {
                Some(bucket) => bucket.put(&entry.key, &entry.value)?,
                None => {
                    return err_at!(
                        BucketNotFound, msg: "{}", self.index_bucket(&entry.meta)
                    )
                }
            }
        }

        let val = Value {
            flags: FLAG_VERSION1,
            schema_version: def.schema_version,
            mod_count,
            data: payload,
            index_keys: new_list,
        };
        let mut out = txn.take_buf(Pool::Value);
        val.encode(&mut out);
        data.put(&key_bytes, &out)?;
        txn.set_written();

        if txn.verbose {
            if def.redact_content {
                debug!(
                    target: "emdb  ",
                    "{}, put {} ({} bytes, redacted)",
                    def.name,
                    util::key_snippet(&key_bytes),
                    out.len()
                );
            } else {
                debug!(
                    target: "emdb  ",
                    "{}, put {} ({} bytes) {}",
                    def.name,
                    util::key_snippet(&key_bytes),
                    out.len(),
                    util::key_snippet(&out)
                );
            }
        }

        self.notify(Op::Put, &key_bytes, &pk, Some(row), prev.as_ref())?;

        txn.retire_buf(Pool::Key, key_bytes);
        txn.retire_buf(Pool::Value, out);
        for entry in entries {
            txn.retire_buf(Pool::IndexKey, entry.key);
            txn.retire_buf(Pool::IndexValue, entry.value);
        }
        Ok(())
    }

    /// Fetch the row stored under `key`. Missing keys are a `None`
    /// sentinel, not an error.
    pub fn get(&self, txn: &Txn, key: &R::Key) -> Result<Option<R>> {
        let key_bytes = flat::to_key_bytes(key);
        let data = self.data_bucket_of(txn)?;
        match data.get(&key_bytes)? {
            Some(bytes) => scan::decode_stored_row(self, &key_bytes, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Delete the row under `key`, removing every index entry recorded
    /// in its embedded list. Returns whether a row existed.
    pub fn delete(&self, txn: &Txn, key: &R::Key) -> Result<bool> {
        txn.require_writable()?;
        let def = &self.core.def;

        let key_bytes = flat::encode_key_into(key, txn.take_buf(Pool::Key));
        let data = self.data_bucket_of(txn)?;
        let prev = match data.get(&key_bytes)? {
            Some(bytes) => match Value::decode(&bytes) {
                Ok(val) => val,
                Err(err) => {
                    return Err(scan::wrap_corruption(&def.name, None, &key_bytes, err))
                }
            },
            None => {
                txn.retire_buf(Pool::Key, key_bytes);
                return Ok(false);
            }
        };

        for ik in &prev.index_keys {
            if let Some(meta) = self.index_by_ordinal(ik.ordinal) {
                if let Some(bucket) = txn.stx.bucket(&self.index_bucket(&meta))? {
                    bucket.delete(&ik.key)?;
                }
            }
        }
        data.delete(&key_bytes)?;
        txn.set_written();

        // deletion counter rides in the persisted table state.
        match txn.stx.bucket(&self.root_bucket())? {
            Some(root) => {
                let mut state = TableState::load(&root)?.unwrap_or_default();
                state.deletion_count += 1;
                state.save(&root)?;
            }
            None => return err_at!(BucketNotFound, msg: "{}", self.root_bucket()),
        }

        if txn.verbose {
            debug!(
                target: "emdb  ",
                "{}, delete {}", def.name, util::key_snippet(&key_bytes)
            );
        }

        self.notify(Op::Delete, &key_bytes, key, None, Some(&prev))?;

        txn.retire_buf(Pool::Key, key_bytes);
        Ok(true)
    }

    /// Point lookup through an index. On a unique index this is a
    /// single bucket get; otherwise the first match of an exact scan.
    pub fn lookup<K>(&self, txn: &Txn, index: &IndexH<K>, key: &K) -> Result<Option<R>>
    where
        K: Flat,
    {
        if index.meta.unique {
            let raw = flat::to_key_bytes(key);
            let bucket = match txn.stx.bucket(&self.index_bucket(&index.meta))? {
                Some(bucket) => bucket,
                None => {
                    return err_at!(
                        BucketNotFound, msg: "{}", self.index_bucket(&index.meta)
                    )
                }
            };
            let value = match bucket.get(&raw)? {
                Some(value) => value,
                None => return Ok(None),
            };
            let pk = match index::entry_primary_key(&raw, &value) {
                Ok(pk) => pk,
                Err(err) => {
                    return Err(scan::wrap_corruption(
                        &self.core.def.name,
                        Some(&index.meta.name),
                        &raw,
                        err,
                    ))
                }
            };
            let data = self.data_bucket_of(txn)?;
            match data.get(&pk)? {
                Some(bytes) => scan::decode_stored_row(self, &pk, &bytes).map(Some),
                None => {
                    let res: Result<()> =
                        err_at!(DecodeFail, msg: "index entry references missing row");
                    Err(scan::wrap_corruption(
                        &self.core.def.name,
                        Some(&index.meta.name),
                        &raw,
                        res.unwrap_err(),
                    ))
                }
            }
        } else {
            let mut iter = self.scan_index(txn, index, key, false)?;
            iter.next().transpose()
        }
    }

    /// Scan the whole table in primary-key order.
    pub fn scan<'t>(&self, txn: &'t Txn<'t>, reverse: bool) -> Result<PrimaryIter<'t, R>> {
        let data = self.data_bucket_of(txn)?;
        let cursor = data.cursor();
        let range = Strategy::Full { reverse }.to_range();
        Ok(PrimaryIter::new(self.clone(), cursor, range))
    }

    /// Scan rows whose primary key falls within `within`.
    pub fn scan_range<'t, G>(
        &self,
        txn: &'t Txn<'t>,
        within: G,
        reverse: bool,
    ) -> Result<PrimaryIter<'t, R>>
    where
        G: RangeBounds<R::Key>,
    {
        let (start, end) = util::to_start_end(within);
        let (lo, lo_inclusive) = match start {
            Bound::Included(k) => (Some(flat::to_key_bytes(&k)), true),
            Bound::Excluded(k) => (Some(flat::to_key_bytes(&k)), false),
            Bound::Unbounded => (None, true),
        };
        let (hi, hi_inclusive) = match end {
            Bound::Included(k) => (Some(flat::to_key_bytes(&k)), true),
            Bound::Excluded(k) => (Some(flat::to_key_bytes(&k)), false),
            Bound::Unbounded => (None, true),
        };
        let strategy = Strategy::Bounded { lo, lo_inclusive, hi, hi_inclusive, reverse };

        let data = self.data_bucket_of(txn)?;
        let cursor = data.cursor();
        Ok(PrimaryIter::new(self.clone(), cursor, strategy.to_range()))
    }

    /// Scan index entries whose key equals `key` exactly.
    pub fn scan_index<'t, K>(
        &self,
        txn: &'t Txn<'t>,
        index: &IndexH<K>,
        key: &K,
        reverse: bool,
    ) -> Result<IndexIter<'t, R>>
    where
        K: Flat,
    {
        let strategy = Strategy::Exact { components: flat::key_components(key), reverse };
        self.index_iter(txn, index, strategy)
    }

    /// Scan index entries whose leading components equal `prefix`, a
    /// proper subset of the index key's components.
    pub fn scan_index_prefix<'t, K, P>(
        &self,
        txn: &'t Txn<'t>,
        index: &IndexH<K>,
        prefix: &P,
        reverse: bool,
    ) -> Result<IndexIter<'t, R>>
    where
        K: Flat,
        P: Flat,
    {
        if P::COMPONENTS >= K::COMPONENTS {
            return err_at!(
                Invalid, msg: "prefix carries {}/{} components", P::COMPONENTS, K::COMPONENTS
            );
        }
        let strategy =
            Strategy::Exact { components: flat::key_components(prefix), reverse };
        self.index_iter(txn, index, strategy)
    }

    /// Scan index entries between two typed keys.
    pub fn scan_index_range<'t, K, G>(
        &self,
        txn: &'t Txn<'t>,
        index: &IndexH<K>,
        within: G,
        reverse: bool,
    ) -> Result<IndexIter<'t, R>>
    where
        K: Flat + Clone,
        G: RangeBounds<K>,
    {
        use crate::store::prefix_successor;

        let (start, end) = util::to_start_end(within);
        // entry keys extend the raw components with the primary-key
        // element and the tuple footer, so bounds translate through
        // the prefix successor.
        let (lo, lo_inclusive) = match start {
            Bound::Included(k) => (Some(flat::to_raw_components(&k)), true),
            Bound::Excluded(k) => match prefix_successor(&flat::to_raw_components(&k)) {
                Some(succ) => (Some(succ), true),
                None => (None, true),
            },
            Bound::Unbounded => (None, true),
        };
        let (hi, hi_inclusive) = match end {
            Bound::Included(k) => match prefix_successor(&flat::to_raw_components(&k)) {
                Some(succ) => (Some(succ), false),
                None => (None, true),
            },
            Bound::Excluded(k) => (Some(flat::to_raw_components(&k)), false),
            Bound::Unbounded => (None, true),
        };
        let strategy = Strategy::Bounded { lo, lo_inclusive, hi, hi_inclusive, reverse };
        self.index_iter(txn, index, strategy)
    }

    /// Scan a non-unique index for entries equal to `key` whose
    /// trailing primary-key slot falls within `within`.
    pub fn scan_index_key_range<'t, K, G>(
        &self,
        txn: &'t Txn<'t>,
        index: &IndexH<K>,
        key: &K,
        within: G,
        reverse: bool,
    ) -> Result<IndexIter<'t, R>>
    where
        K: Flat,
        G: RangeBounds<R::Key>,
    {
        if index.meta.unique {
            return err_at!(
                Invalid, msg: "primary-key range scan over unique index {}", index.meta.name
            );
        }
        let (start, end) = util::to_start_end(within);
        let (pk_lo, pk_lo_inclusive) = match start {
            Bound::Included(k) => (Some(flat::to_key_bytes(&k)), true),
            Bound::Excluded(k) => (Some(flat::to_key_bytes(&k)), false),
            Bound::Unbounded => (None, true),
        };
        let (pk_hi, pk_hi_inclusive) = match end {
            Bound::Included(k) => (Some(flat::to_key_bytes(&k)), true),
            Bound::Excluded(k) => (Some(flat::to_key_bytes(&k)), false),
            Bound::Unbounded => (None, true),
        };
        let strategy = Strategy::ExactWithKeyRange {
            components: flat::key_components(key),
            pk_lo,
            pk_lo_inclusive,
            pk_hi,
            pk_hi_inclusive,
            reverse,
        };
        self.index_iter(txn, index, strategy)
    }

    fn index_iter<'t, K>(
        &self,
        txn: &'t Txn<'t>,
        index: &IndexH<K>,
        strategy: Strategy,
    ) -> Result<IndexIter<'t, R>>
    where
        K: Flat,
    {
        let data = self.data_bucket_of(txn)?;
        let bucket = match txn.stx.bucket(&self.index_bucket(&index.meta))? {
            Some(bucket) => bucket,
            None => {
                return err_at!(BucketNotFound, msg: "{}", self.index_bucket(&index.meta))
            }
        };
        let cursor = bucket.cursor();
        Ok(IndexIter::new(
            self.clone(),
            Arc::clone(&index.meta),
            data,
            cursor,
            &strategy,
        ))
    }

    fn data_bucket_of<'t>(&self, txn: &'t Txn<'t>) -> Result<Bucket<'t>> {
        match txn.stx.bucket(&self.data_bucket())? {
            Some(bucket) => Ok(bucket),
            None => err_at!(BucketNotFound, msg: "{}", self.data_bucket()),
        }
    }

    // dispatch one change to every registered handler, in order.
    fn notify(
        &self,
        op: Op,
        raw_key: &[u8],
        key: &R::Key,
        new_row: Option<&R>,
        prev: Option<&Value>,
    ) -> Result<()> {
        let handlers = self.core.handlers.read().unwrap();
        if handlers.is_empty() {
            return Ok(());
        }

        // the previous row decodes at most once across handlers.
        let mut old_cache: Option<R> = None;
        for (flags, handler) in handlers.iter() {
            let old_row = if flags.contains(ChangeFlags::WANT_OLD_ROW) {
                match (&old_cache, prev) {
                    (Some(row), _) => Some(row.clone()),
                    (None, Some(prev)) => {
                        let row = match R::decode_row(&prev.data) {
                            Ok(row) => row,
                            Err(err) => {
                                return Err(scan::wrap_corruption(
                                    &self.core.def.name,
                                    None,
                                    raw_key,
                                    err,
                                ))
                            }
                        };
                        old_cache = Some(row.clone());
                        Some(row)
                    }
                    (None, None) => None,
                }
            } else {
                None
            };

            let change = Change {
                op,
                table: self.core.def.name.clone(),
                raw_key,
                key: if flags.contains(ChangeFlags::WANT_KEY) {
                    Some(key.clone())
                } else {
                    None
                },
                new_row: if flags.contains(ChangeFlags::WANT_NEW_ROW) {
                    new_row
                } else {
                    None
                },
                old_row,
            };
            handler(&change)?;
        }
        Ok(())
    }
}

impl KvTable {
    pub fn get(&self, txn: &Txn, key: &[u8]) -> Result<Option<Vec<u8>>> {
        txn.stx.get(&self.bucket(), key)
    }

    pub fn put(&self, txn: &Txn, key: &[u8], value: &[u8]) -> Result<()> {
        txn.require_writable()?;
        txn.stx.put(&self.bucket(), key, value)?;
        txn.set_written();
        Ok(())
    }

    pub fn delete(&self, txn: &Txn, key: &[u8]) -> Result<bool> {
        txn.require_writable()?;
        let existed = txn.stx.delete(&self.bucket(), key)?;
        txn.set_written();
        Ok(existed)
    }

    /// Application-maintained index entry under `<table>_i_<index>`.
    pub fn put_index(&self, txn: &Txn, index: &str, key: &[u8], value: &[u8]) -> Result<()> {
        txn.require_writable()?;
        txn.stx.put(&self.index_bucket(index), key, value)?;
        txn.set_written();
        Ok(())
    }

    pub fn delete_index(&self, txn: &Txn, index: &str, key: &[u8]) -> Result<bool> {
        txn.require_writable()?;
        let existed = txn.stx.delete(&self.index_bucket(index), key)?;
        txn.set_written();
        Ok(existed)
    }

    /// Raw bucket handle, for cursors over the table's flat key space.
    pub fn bucket_of<'t>(&self, txn: &'t Txn<'t>) -> Result<Bucket<'t>> {
        match txn.stx.bucket(&self.bucket())? {
            Some(bucket) => Ok(bucket),
            None => err_at!(BucketNotFound, msg: "{}", self.bucket()),
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
