//! Module implement the schema registry.
//!
//! A [TableDef] describes a typed table, its row type, schema version,
//! secondary indices and callbacks. Registering definitions in a
//! [Schema] produces cloneable [Table] handles, held in a registry
//! keyed by row type. Key,value tables are registered alongside as
//! [KvTableDef]. Persistent per-table state lives in [state].

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    marker,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering::SeqCst},
        Arc, RwLock,
    },
};

use crate::{
    flat::{self, Flat},
    index::IndexKeys,
    store::BucketName,
    txn::{Change, ChangeFlags, TableHook},
    Error, Result,
};

pub mod state;

/// Reserved key inside a table's root bucket holding the table state.
pub const STATE_KEY: &[u8] = b"_state";

/// Nested bucket holding primary-key → row-value entries.
pub const DATA_SUB: &str = "data";

/// Nested bucket name for a secondary index of a typed table.
pub fn index_sub(name: &str) -> String {
    format!("i_{}", name)
}

/// Typed rows stored in a table. The primary key is surfaced through
/// [Row::primary_key]; the row type itself carries no notion of
/// database identity. The row codec is opaque to the core, in practice
/// a CBOR map via `derive(Cborize)` and the [crate::util] helpers.
pub trait Row: Clone + 'static {
    type Key: Flat + Default + Clone + 'static;

    fn primary_key(&self) -> Self::Key;

    fn encode_row(&self, buf: &mut Vec<u8>) -> Result<()>;

    fn decode_row(data: &[u8]) -> Result<Self>;
}

/// Options for registering a secondary index.
#[derive(Clone, Copy, Debug, Default)]
pub struct IndexOpts {
    /// Unique indices store the primary key in the entry value;
    /// non-unique indices append it to the entry key.
    pub unique: bool,
    /// Mark the index built on first registration, skipping the
    /// backfill scan.
    pub skip_initial_fill: bool,
    /// Log every key visited by scans over this index.
    pub debug_scans: bool,
}

// Runtime descriptor of a secondary index. `pos` is its position in
// the table definition, stable for the life of the process; `ordinal`
// is the persistent identity allocated from the table state.
pub(crate) struct IndexMeta {
    pub name: String,
    pub pos: usize,
    pub unique: bool,
    pub skip_initial_fill: bool,
    pub debug_scans: bool,
    pub key_components: usize,
    ordinal: AtomicU32,
    built: AtomicBool,
}

impl IndexMeta {
    pub fn ordinal(&self) -> u32 {
        self.ordinal.load(SeqCst)
    }

    pub fn set_ordinal(&self, ordinal: u32) {
        self.ordinal.store(ordinal, SeqCst)
    }

    pub fn is_built(&self) -> bool {
        self.built.load(SeqCst)
    }

    pub fn set_built(&self, built: bool) {
        self.built.store(built, SeqCst)
    }

    pub fn sub(&self) -> String {
        index_sub(&self.name)
    }
}

/// Cloneable typed handle to a secondary index, returned at definition
/// time and used both to emit keys from the indexer callback and to
/// address lookups and scans.
pub struct IndexH<K> {
    pub(crate) meta: Arc<IndexMeta>,
    _key: marker::PhantomData<fn() -> K>,
}

impl<K> Clone for IndexH<K> {
    fn clone(&self) -> IndexH<K> {
        IndexH { meta: Arc::clone(&self.meta), _key: marker::PhantomData }
    }
}

impl<K> IndexH<K>
where
    K: Flat,
{
    pub fn to_name(&self) -> String {
        self.meta.name.clone()
    }

    pub fn is_unique(&self) -> bool {
        self.meta.unique
    }

    /// Position within the table definition, stable for the life of
    /// the process but not across restarts.
    pub fn position(&self) -> usize {
        self.meta.pos
    }

    /// Persistent ordinal, zero until the schema is opened.
    pub fn ordinal(&self) -> u32 {
        self.meta.ordinal()
    }
}

/// Definition of a typed table, its schema version, indices and
/// callbacks.
pub struct TableDef<R>
where
    R: Row,
{
    pub(crate) name: String,
    pub(crate) schema_version: u32,
    pub(crate) indices: Vec<Arc<IndexMeta>>,
    pub(crate) indexer: Option<Arc<dyn Fn(&R, &mut IndexKeys) + Send + Sync>>,
    pub(crate) migrator: Option<Arc<dyn Fn(u32, R) -> Result<R> + Send + Sync>>,
    pub(crate) redact_content: bool,
}

impl<R> TableDef<R>
where
    R: Row,
{
    pub fn new(name: &str, schema_version: u32) -> TableDef<R> {
        TableDef {
            name: name.to_string(),
            schema_version,
            indices: Vec::new(),
            indexer: None,
            migrator: None,
            redact_content: false,
        }
    }

    pub fn add_index<K>(&mut self, name: &str) -> IndexH<K>
    where
        K: Flat,
    {
        self.add_index_opts(name, IndexOpts::default())
    }

    pub fn add_unique_index<K>(&mut self, name: &str) -> IndexH<K>
    where
        K: Flat,
    {
        self.add_index_opts(name, IndexOpts { unique: true, ..IndexOpts::default() })
    }

    pub fn add_index_opts<K>(&mut self, name: &str, opts: IndexOpts) -> IndexH<K>
    where
        K: Flat,
    {
        let meta = Arc::new(IndexMeta {
            name: name.to_string(),
            pos: self.indices.len(),
            unique: opts.unique,
            skip_initial_fill: opts.skip_initial_fill,
            debug_scans: opts.debug_scans,
            key_components: K::COMPONENTS,
            ordinal: AtomicU32::new(0),
            built: AtomicBool::new(false),
        });
        self.indices.push(Arc::clone(&meta));
        IndexH { meta, _key: marker::PhantomData }
    }

    /// Install the indexer callback. On every put it receives the row
    /// and a sink accepting typed index keys; the emitted entries are
    /// the complete index footprint of the row.
    pub fn set_indexer<F>(&mut self, indexer: F) -> &mut Self
    where
        F: Fn(&R, &mut IndexKeys) + Send + Sync + 'static,
    {
        self.indexer = Some(Arc::new(indexer));
        self
    }

    /// Install the migrator, invoked on reads when a stored row's
    /// schema version is below the current one.
    pub fn set_migrator<F>(&mut self, migrator: F) -> &mut Self
    where
        F: Fn(u32, R) -> Result<R> + Send + Sync + 'static,
    {
        self.migrator = Some(Arc::new(migrator));
        self
    }

    /// Withhold row payload bytes from logging output.
    pub fn set_redact_content(&mut self, redact: bool) -> &mut Self {
        self.redact_content = redact;
        self
    }
}

/// Change-handler callback type, see [crate::txn::Change].
pub type ChangeHandler<R> = Box<dyn Fn(&Change<R>) -> Result<()> + Send + Sync>;

pub(crate) struct TableCore<R>
where
    R: Row,
{
    pub def: TableDef<R>,
    /// Encoded form of the zero primary key, rejected on writes.
    pub zero_key: Vec<u8>,
    pub handlers: RwLock<Vec<(ChangeFlags, ChangeHandler<R>)>>,
}

/// Cloneable handle to a registered table.
pub struct Table<R>
where
    R: Row,
{
    pub(crate) core: Arc<TableCore<R>>,
}

impl<R> Clone for Table<R>
where
    R: Row,
{
    fn clone(&self) -> Table<R> {
        Table { core: Arc::clone(&self.core) }
    }
}

impl<R> Table<R>
where
    R: Row,
{
    pub fn to_name(&self) -> String {
        self.core.def.name.clone()
    }

    pub fn schema_version(&self) -> u32 {
        self.core.def.schema_version
    }

    pub fn root_bucket(&self) -> BucketName {
        BucketName::root(&self.core.def.name)
    }

    pub fn data_bucket(&self) -> BucketName {
        BucketName::nested(&self.core.def.name, DATA_SUB)
    }

    pub(crate) fn index_bucket(&self, meta: &IndexMeta) -> BucketName {
        BucketName::nested(&self.core.def.name, &meta.sub())
    }

    pub(crate) fn index_by_ordinal(&self, ordinal: u32) -> Option<Arc<IndexMeta>> {
        self.core
            .def
            .indices
            .iter()
            .find(|meta| meta.ordinal() == ordinal)
            .map(Arc::clone)
    }

    /// Register a change handler, invoked inline on every put and
    /// delete of this table. `flags` select which optional fields the
    /// handler receives. Handler errors abort the transaction.
    pub fn on_change<F>(&self, flags: ChangeFlags, handler: F)
    where
        F: Fn(&Change<R>) -> Result<()> + Send + Sync + 'static,
    {
        let mut handlers = self.core.handlers.write().unwrap();
        handlers.push((flags, Box::new(handler)));
    }
}

/// Definition of a key,value table, a flat root-level bucket with
/// optional application-maintained index buckets.
#[derive(Clone, Debug, Default)]
pub struct KvTableDef {
    pub name: String,
    pub indices: Vec<String>,
}

impl KvTableDef {
    pub fn new(name: &str) -> KvTableDef {
        KvTableDef { name: name.to_string(), indices: Vec::new() }
    }

    pub fn add_index(&mut self, name: &str) -> &mut Self {
        self.indices.push(name.to_string());
        self
    }
}

/// Cloneable handle to a registered key,value table.
#[derive(Clone)]
pub struct KvTable {
    pub(crate) def: Arc<KvTableDef>,
}

impl KvTable {
    pub fn to_name(&self) -> String {
        self.def.name.clone()
    }

    pub fn bucket(&self) -> BucketName {
        BucketName::root(&self.def.name)
    }

    /// Index buckets of a KV table live at root level, named
    /// `<table>_i_<index>`.
    pub fn index_bucket(&self, index: &str) -> BucketName {
        BucketName::root(&format!("{}_i_{}", self.def.name, index))
    }
}

/// Registry of table definitions, keyed by row type.
#[derive(Default)]
pub struct Schema {
    pub(crate) typed: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    pub(crate) hooks: Vec<Arc<dyn TableHook>>,
    pub(crate) kv: Vec<KvTable>,
    names: Vec<String>,
}

impl Schema {
    pub fn new() -> Schema {
        Schema::default()
    }

    /// Register a typed table. One table per row type; duplicate names
    /// and duplicate row types are programmer errors.
    pub fn add_table<R>(&mut self, def: TableDef<R>) -> Result<Table<R>>
    where
        R: Row,
    {
        if def.schema_version == 0 {
            return err_at!(Invalid, msg: "schema version must be positive");
        }
        if self.names.iter().any(|n| n == &def.name) {
            return err_at!(Invalid, msg: "duplicate table {}", def.name);
        }
        if self.typed.contains_key(&TypeId::of::<R>()) {
            return err_at!(Invalid, msg: "row type already registered");
        }

        self.names.push(def.name.clone());
        let core = TableCore {
            zero_key: flat::to_key_bytes(&R::Key::default()),
            def,
            handlers: RwLock::new(Vec::new()),
        };
        let table = Table { core: Arc::new(core) };
        self.typed.insert(TypeId::of::<R>(), Box::new(table.clone()));
        self.hooks.push(Arc::new(table.clone()));
        Ok(table)
    }

    /// Register a key,value table.
    pub fn add_kv_table(&mut self, def: KvTableDef) -> Result<KvTable> {
        if self.names.iter().any(|n| n == &def.name) {
            return err_at!(Invalid, msg: "duplicate table {}", def.name);
        }
        self.names.push(def.name.clone());
        let kv = KvTable { def: Arc::new(def) };
        self.kv.push(kv.clone());
        Ok(kv)
    }

    /// Look up the table registered for row type `R`.
    pub fn table<R>(&self) -> Result<Table<R>>
    where
        R: Row,
    {
        let table = self
            .typed
            .get(&TypeId::of::<R>())
            .and_then(|any| any.downcast_ref::<Table<R>>());
        match table {
            Some(table) => Ok(table.clone()),
            None => err_at!(Invalid, msg: "unknown table for row type"),
        }
    }
}
