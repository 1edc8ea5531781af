//! Journal writer: segment creation, appends, commits, rotation and
//! self-healing recovery.

use log::{info, warn};
use xxhash_rust::xxh64::Xxh64;

use std::{ffi, fs, io::Read, path, time};

use crate::{
    journal::{
        files::{self, SegmentFileName},
        segment::{self, SegmentHeader},
        Config, HEADER_SIZE,
    },
    util, Error, Result,
};

/// One committed record, as replayed from disk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    /// Monotonic ordinal across the whole journal.
    pub ordinal: u64,
    /// Unix seconds, reconstructed from the per-record delta.
    pub timestamp: i64,
    pub payload: Vec<u8>,
}

/// Append-only journal over a directory of segment files. One writer;
/// a failed fdatasync latches the journal into a permanently failed
/// mode where every call returns the stored error.
pub struct Journal {
    config: Config,
    seq: u32,
    location: ffi::OsString,
    file: fs::File,
    size: usize,
    hash: Xxh64,
    last_ts: i64,
    next_ordinal: u64,
    pending: bool,
    failed: Option<Error>,
}

impl Journal {
    /// Open the journal under `config.dir`, creating the first segment
    /// when none exists. The last segment is recovered: items after the
    /// last valid commit are truncated away, and a segment that never
    /// committed is deleted, recovery then restarting on the file
    /// before it.
    pub fn open(config: Config) -> Result<Journal> {
        err_at!(IOError, fs::create_dir_all(path::Path::new(&config.dir)))?;
        loop {
            let (name, location) = match files::list_segments(&config)?.pop() {
                Some(seg) => seg,
                None => return Journal::create_segment(config, 1, 0, 0),
            };

            let bytes = {
                let mut fd = util::open_file_r(&location)?;
                let mut bytes = vec![];
                err_at!(IOError, fd.read_to_end(&mut bytes))?;
                bytes
            };

            if bytes.len() < HEADER_SIZE {
                warn!(target: "journl", "{:?} short header, deleting", location);
                err_at!(IOError, fs::remove_file(path::Path::new(&location)))?;
                continue;
            }
            let header = match SegmentHeader::decode(&bytes[..HEADER_SIZE], &config) {
                Ok(header) => header,
                Err(Error::DecodeFail(_, msg)) => {
                    warn!(
                        target: "journl",
                        "{:?} corrupt header ({}), deleting", location, msg
                    );
                    err_at!(IOError, fs::remove_file(path::Path::new(&location)))?;
                    continue;
                }
                Err(err) => return Err(err),
            };
            if header.seq != name.seq
                || header.timestamp != name.timestamp
                || header.first_record_ordinal != name.record_ordinal
            {
                return err_at!(
                    DecodeFail, msg: "segment header disagrees with file name {:?}", location
                );
            }

            let outcome = segment::scan_items(&bytes[HEADER_SIZE..], &header);
            if outcome.committed_len == 0 {
                // no records were ever committed here.
                warn!(target: "journl", "{:?} has no commits, deleting", location);
                err_at!(IOError, fs::remove_file(path::Path::new(&location)))?;
                continue;
            }

            let valid = HEADER_SIZE + outcome.committed_len;
            if !outcome.clean {
                warn!(
                    target: "journl",
                    "{:?} truncating {} -> {}", location, bytes.len(), valid
                );
                let fd = err_at!(
                    IOError,
                    fs::OpenOptions::new().write(true).open(path::Path::new(&location))
                )?;
                err_at!(IOError, fd.set_len(valid as u64))?;
                err_at!(IOError, fd.sync_data())?;
            }

            let file = util::open_file_a(&location)?;
            info!(
                target: "journl",
                "{:?} recovered, {} records committed", location, outcome.n_records
            );
            return Ok(Journal {
                config,
                seq: name.seq,
                location,
                file,
                size: valid,
                hash: outcome.hash,
                last_ts: outcome.last_timestamp,
                next_ordinal: header.first_record_ordinal + outcome.n_records,
                pending: false,
                failed: None,
            });
        }
    }

    fn create_segment(
        config: Config,
        seq: u32,
        next_ordinal: u64,
        prev_tail: u64,
    ) -> Result<Journal> {
        let timestamp = unix_seconds();
        let name = SegmentFileName { seq, timestamp, record_ordinal: next_ordinal };
        let location: ffi::OsString = {
            let loc: path::PathBuf =
                [config.dir.clone(), files::make_filename(&config, &name)]
                    .iter()
                    .collect();
            loc.into_os_string()
        };

        let mut file = util::create_file_a(&location)?;
        let header = SegmentHeader {
            seq,
            flags: 0,
            timestamp,
            first_record_ordinal: next_ordinal,
            prev_tail_checksum: prev_tail,
            journal_id: config.journal_id,
            schema_id: config.schema_id,
        };
        let buf = header.encode();
        write_to(&mut file, &location, &buf[..], "segment header")?;
        err_at!(IOError, file.sync_data())?;
        info!(target: "journl", "{:?} segment created", location);

        Ok(Journal {
            config,
            seq,
            location,
            file,
            size: HEADER_SIZE,
            hash: Xxh64::new(0),
            last_ts: timestamp,
            next_ordinal,
            pending: false,
            failed: None,
        })
    }

    /// Append a record stamped with the current wall clock. Returns the
    /// record's ordinal.
    pub fn add_record(&mut self, payload: &[u8]) -> Result<u64> {
        self.add_record_at(unix_seconds(), payload)
    }

    /// Append a record stamped with explicit unix seconds. Timestamps
    /// are stored as deltas and may not run backwards; an earlier stamp
    /// is clamped to the previous record's.
    pub fn add_record_at(&mut self, ts: i64, payload: &[u8]) -> Result<u64> {
        self.check_failed()?;
        if self.size > self.config.segment_limit {
            self.rotate()?;
        }

        let delta = if ts > self.last_ts { (ts - self.last_ts) as u64 } else { 0 };
        let mut buf = Vec::with_capacity(payload.len() + 2 * util::MAX_VARINT_LEN);
        segment::encode_record(&mut buf, delta, payload);

        if let Err(err) = write_to(&mut self.file, &self.location, &buf[..], "record") {
            return Err(self.fail(err));
        }
        self.hash.update(&buf);
        self.size += buf.len();
        self.last_ts += delta as i64;
        self.pending = true;

        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        Ok(ordinal)
    }

    /// Flush a commit marker carrying the running checksum. With fsync
    /// configured the segment is fdatasync'ed; an fsync failure is
    /// fatal and latches the journal.
    pub fn commit(&mut self) -> Result<()> {
        self.check_failed()?;
        if !self.pending {
            return Ok(());
        }

        let marker = segment::commit_marker(self.hash.digest());
        if let Err(err) = write_to(&mut self.file, &self.location, &marker[..], "commit") {
            return Err(self.fail(err));
        }
        self.hash.update(&marker);
        self.size += marker.len();
        self.pending = false;

        if self.config.fsync {
            if let Err(err) = self.file.sync_data() {
                let res: Result<()> = err_at!(IOError, Err(err));
                return Err(self.fail(res.unwrap_err()));
            }
        }
        Ok(())
    }

    // close the current segment and open the next, carrying the tail
    // checksum into the new header.
    fn rotate(&mut self) -> Result<()> {
        if self.pending {
            self.commit()?;
        }
        if let Err(err) = self.file.sync_data() {
            let res: Result<()> = err_at!(IOError, Err(err));
            return Err(self.fail(res.unwrap_err()));
        }

        let next = Journal::create_segment(
            self.config.clone(),
            self.seq + 1,
            self.next_ordinal,
            self.hash.digest(),
        )?;
        info!(
            target: "journl",
            "{:?} rotated to seq {}", self.location, self.seq + 1
        );
        *self = next;
        Ok(())
    }

    /// Commit pending records and close.
    pub fn close(mut self) -> Result<()> {
        self.check_failed()?;
        self.commit()
    }

    /// Remove every segment file of this journal.
    pub fn purge(self) -> Result<()> {
        for (_, location) in files::list_segments(&self.config)? {
            err_at!(IOError, fs::remove_file(path::Path::new(&location)))?;
        }
        Ok(())
    }

    /// Replay all committed records across segments, oldest first.
    pub fn iter_committed(&self) -> Result<std::vec::IntoIter<Record>> {
        let mut out = vec![];
        for (_, location) in files::list_segments(&self.config)? {
            let bytes = {
                let mut fd = util::open_file_r(&location)?;
                let mut bytes = vec![];
                err_at!(IOError, fd.read_to_end(&mut bytes))?;
                bytes
            };
            if bytes.len() < HEADER_SIZE {
                continue;
            }
            let header = SegmentHeader::decode(&bytes[..HEADER_SIZE], &self.config)?;
            let outcome = segment::scan_items(&bytes[HEADER_SIZE..], &header);
            out.extend(outcome.committed);
        }
        Ok(out.into_iter())
    }

    pub fn to_seq(&self) -> u32 {
        self.seq
    }

    pub fn to_location(&self) -> ffi::OsString {
        self.location.clone()
    }

    /// Current segment file size in bytes.
    pub fn file_size(&self) -> usize {
        self.size
    }

    fn check_failed(&self) -> Result<()> {
        match &self.failed {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        let stored = match err {
            Error::JournalFail(p, m) => Error::JournalFail(p, m),
            Error::IOError(p, m) => Error::JournalFail(p, m),
            Error::Fatal(p, m) => Error::JournalFail(p, m),
            err => err,
        };
        self.failed = Some(stored.clone());
        stored
    }
}

fn write_to(
    file: &mut fs::File,
    location: &ffi::OsString,
    buf: &[u8],
    msg: &str,
) -> Result<usize> {
    write_file!(file, buf, location, msg)
}

fn unix_seconds() -> i64 {
    match time::SystemTime::now().duration_since(time::UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(_) => 0,
    }
}

#[cfg(test)]
#[path = "journal_test.rs"]
mod journal_test;
