//! Emdb is an embedded, single-process document database layered over
//! an ordered key,value bucket store.
//!
//! Applications define typed row schemas, store rows as opaque values
//! keyed by a primary key, and look rows up through secondary indices,
//! all inside explicit transactions with one writer at a time. The
//! building blocks are,
//!
//! * [tuple] codec, deterministic ordered encoding for composite keys.
//! * [flat] codec, schema driven encoding of scalar and composite
//!   values into tuples.
//! * [value] codec, row framing with metadata and the embedded
//!   index-key history used for incremental index maintenance.
//! * [store] abstraction, ordered buckets with range/prefix/reverse
//!   cursors over an in-memory backend or a durable backend.
//! * [table] registry, schema objects for tables, secondary indices
//!   and key,value tables, with persistent per-table state.
//! * [index] engine, building per-row index entries and diffing them
//!   against the row's previous entries.
//! * [scan] engine, cursor strategies over primary data and indices.
//! * [txn] core, one writer / many readers, change notifications,
//!   memoization and buffer pooling.
//! * [journal], an append-only segmented log with checksums, rotation
//!   and self-healing recovery.
//!
//! Write operations return errors only at commit time; reads return a
//! missing sentinel (`None`) instead of an error. Corruption and
//! programmer errors abort the current transaction with a typed
//! [Error].

use std::{error, fmt, result};

/// Type alias for Result return type, used by this package.
pub type Result<T> = result::Result<T, Error>;

/// Error variants that can be returned by this package's API.
///
/// Each variant carries a prefix, mostly the code location where the
/// error originated, and a message describing the error.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Unrecoverable invariant failure, call the programmer.
    Fatal(String, String),
    /// Invalid argument or misuse of the API.
    Invalid(String, String),
    /// Error from the underlying file-system or storage layer.
    IOError(String, String),
    /// Failed numeric or type conversion.
    FailConvert(String, String),
    /// Failed CBOR encoding or decoding.
    FailCbor(String, String),
    /// Stored bytes failed to decode, data corruption.
    DecodeFail(String, String),
    /// Named bucket is missing, typically concurrent schema drift.
    BucketNotFound(String, String),
    /// Requested key is not present.
    KeyNotFound(String, String),
    /// Journal entered permanently failed mode.
    JournalFail(String, String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        use Error::*;

        match self {
            Fatal(p, m) => write!(f, "Fatal:{} {}", p, m),
            Invalid(p, m) => write!(f, "Invalid:{} {}", p, m),
            IOError(p, m) => write!(f, "IOError:{} {}", p, m),
            FailConvert(p, m) => write!(f, "FailConvert:{} {}", p, m),
            FailCbor(p, m) => write!(f, "FailCbor:{} {}", p, m),
            DecodeFail(p, m) => write!(f, "DecodeFail:{} {}", p, m),
            BucketNotFound(p, m) => write!(f, "BucketNotFound:{} {}", p, m),
            KeyNotFound(p, m) => write!(f, "KeyNotFound:{} {}", p, m),
            JournalFail(p, m) => write!(f, "JournalFail:{} {}", p, m),
        }
    }
}

impl error::Error for Error {}

/// Construct crate-level [Error] values with a `file:line` prefix.
///
/// Usage,
///
/// * `err_at!(Invalid, msg: "bad argument {}", arg)` to fail outright.
/// * `err_at!(IOError, fd.read(&mut buf))` to wrap a foreign error.
/// * `err_at!(IOError, fd.read(&mut buf), "while {}", ctxt)` to wrap
///   with an additional message.
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err(Error::$v(prefix, format!($($arg),+)))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err(Error::$v(prefix, format!("{}", err)))
            }
        }
    }};
    ($v:ident, $e:expr, $($arg:expr),+) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                let msg = format!($($arg),+);
                Err(Error::$v(prefix, format!("{} {}", err, msg)))
            }
        }
    }};
}

#[macro_use]
pub mod util;

pub mod flat;
pub mod index;
pub mod journal;
pub mod scan;
pub mod store;
pub mod table;
pub mod tuple;
pub mod txn;
pub mod value;

pub use crate::flat::{Flat, UnixTime};
pub use crate::index::IndexKeys;
pub use crate::store::{BucketName, Range, Store};
pub use crate::table::{IndexH, IndexOpts, KvTable, KvTableDef, Row, Schema, Table, TableDef};
pub use crate::txn::{Change, ChangeFlags, Config, Db, Op, Txn};
