//! Module implement the append-only segmented journal.
//!
//! A journal is a directory of segment files. Each segment opens with a
//! fixed 128-byte header carrying the magic, format version, segment
//! sequence, timestamps, the previous segment's tail checksum and two
//! 32-byte invariants identifying the journal and its schema. The
//! header is followed by a stream of items: records, and commit markers
//! whose upper 63 bits hold the running checksum of everything since
//! the segment header. Because record items lead with an even byte
//! (sizes are stored left-shifted by one) and markers with an odd one,
//! a single byte distinguishes them.
//!
//! Segments rotate once they exceed the configured size limit. On open
//! the last segment is replayed and self-healed: anything after the
//! last valid commit marker is truncated away, and a segment that never
//! committed is deleted outright.

use arbitrary::Arbitrary;

use std::ffi;

mod files;
mod journal;
mod segment;

pub use crate::journal::journal::{Journal, Record};
pub use crate::journal::segment::SegmentHeader;

/// Default segment file limit, 1GB.
pub const SEGMENT_LIMIT: usize = 1024 * 1024 * 1024;

/// Default segment file suffix.
pub const DEFAULT_SUFFIX: &str = ".wal";

/// Magic constant opening every segment, "EMDBJNL1" on disk.
pub const MAGIC: u64 = 0x314c_4e4a_4244_4d45;

/// Segment format version. The rolling checksum is xxhash64 and may not
/// change without bumping this.
pub const VERSION: u8 = 1;

/// Fixed segment header size in bytes.
pub const HEADER_SIZE: usize = 128;

/// Reserved header flag for aligned segments.
pub const FLAG_ALIGNED: u8 = 0x1;

/// Configuration for [Journal] instances.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory in which segment files are stored.
    pub dir: ffi::OsString,
    /// Segment file name prefix, empty by default.
    pub prefix: String,
    /// Segment file name suffix.
    pub suffix: String,
    /// File-size limit beyond which segments rotate.
    pub segment_limit: usize,
    /// fdatasync on every commit. Errors here are fatal to the journal.
    pub fsync: bool,
    /// Invariant identifying this journal across segments.
    pub journal_id: [u8; 32],
    /// Invariant identifying the record schema of this journal.
    pub schema_id: [u8; 32],
}

impl<'a> Arbitrary<'a> for Config {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        use std::env;

        let dir = env::temp_dir().into_os_string();
        let segment_limit = *u.choose(&[1000, 10_000, 1_000_000, SEGMENT_LIMIT])?;
        let fsync: bool = u.arbitrary()?;

        let config = Config {
            dir,
            prefix: String::new(),
            suffix: DEFAULT_SUFFIX.to_string(),
            segment_limit,
            fsync,
            journal_id: u.arbitrary()?,
            schema_id: u.arbitrary()?,
        };
        Ok(config)
    }
}

impl Config {
    pub fn new(dir: &ffi::OsStr) -> Config {
        Config {
            dir: dir.to_os_string(),
            prefix: String::new(),
            suffix: DEFAULT_SUFFIX.to_string(),
            segment_limit: SEGMENT_LIMIT,
            fsync: true,
            journal_id: [0; 32],
            schema_id: [0; 32],
        }
    }

    pub fn set_prefix(&mut self, prefix: &str) -> &mut Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn set_suffix(&mut self, suffix: &str) -> &mut Self {
        self.suffix = suffix.to_string();
        self
    }

    pub fn set_segment_limit(&mut self, segment_limit: usize) -> &mut Self {
        self.segment_limit = segment_limit;
        self
    }

    pub fn set_fsync(&mut self, fsync: bool) -> &mut Self {
        self.fsync = fsync;
        self
    }

    pub fn set_invariants(&mut self, journal_id: [u8; 32], schema_id: [u8; 32]) -> &mut Self {
        self.journal_id = journal_id;
        self.schema_id = schema_id;
        self
    }
}
