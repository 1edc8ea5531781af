//! Segment header and item codec.
//!
//! Integers are little-endian. An item is either a record, leading with
//! an even byte since its size is stored left-shifted by one, or an
//! 8-byte commit marker leading with an odd byte.

use xxhash_rust::xxh64::{xxh64, Xxh64};

use std::convert::TryInto;

use crate::{
    journal::{Config, Record, FLAG_ALIGNED, HEADER_SIZE, MAGIC, VERSION},
    util, Error, Result,
};

/// Fixed 128-byte segment header.
///
/// Layout: magic u64, version u8, flags u8, reserved u16, seq u32,
/// timestamp i64, first-record ordinal u64, previous-segment tail
/// checksum u64, journal invariant `[u8;32]`, schema invariant
/// `[u8;32]`, zero padding, trailing checksum u64 over bytes 0..120.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentHeader {
    pub seq: u32,
    pub flags: u8,
    pub timestamp: i64,
    pub first_record_ordinal: u64,
    pub prev_tail_checksum: u64,
    pub journal_id: [u8; 32],
    pub schema_id: [u8; 32],
}

impl SegmentHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0_u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&MAGIC.to_le_bytes());
        buf[8] = VERSION;
        buf[9] = self.flags;
        buf[12..16].copy_from_slice(&self.seq.to_le_bytes());
        buf[16..24].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[24..32].copy_from_slice(&self.first_record_ordinal.to_le_bytes());
        buf[32..40].copy_from_slice(&self.prev_tail_checksum.to_le_bytes());
        buf[40..72].copy_from_slice(&self.journal_id);
        buf[72..104].copy_from_slice(&self.schema_id);
        let sum = xxh64(&buf[..120], 0);
        buf[120..128].copy_from_slice(&sum.to_le_bytes());
        buf
    }

    /// Decode and validate a header against `config`. Structural
    /// damage reports `DecodeFail`; an invariant mismatch, a segment
    /// belonging to some other journal, reports `Invalid`.
    pub fn decode(buf: &[u8], config: &Config) -> Result<SegmentHeader> {
        check_remaining!(buf, HEADER_SIZE, "segment header")?;
        let buf = &buf[..HEADER_SIZE];

        let magic = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        if magic != MAGIC {
            return err_at!(DecodeFail, msg: "segment magic {:x}", magic);
        }
        let version = buf[8];
        if version != VERSION {
            return err_at!(DecodeFail, msg: "segment version {}", version);
        }
        let flags = buf[9];
        if flags & FLAG_ALIGNED != 0 {
            return err_at!(DecodeFail, msg: "aligned flag is reserved");
        }
        if flags & !FLAG_ALIGNED != 0 {
            return err_at!(DecodeFail, msg: "segment flags {:x}", flags);
        }

        let sum = u64::from_le_bytes(buf[120..128].try_into().unwrap());
        if sum != xxh64(&buf[..120], 0) {
            return err_at!(DecodeFail, msg: "segment header checksum");
        }

        let header = SegmentHeader {
            seq: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            flags,
            timestamp: i64::from_le_bytes(buf[16..24].try_into().unwrap()),
            first_record_ordinal: u64::from_le_bytes(buf[24..32].try_into().unwrap()),
            prev_tail_checksum: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
            journal_id: buf[40..72].try_into().unwrap(),
            schema_id: buf[72..104].try_into().unwrap(),
        };

        if header.journal_id != config.journal_id {
            return err_at!(Invalid, msg: "segment belongs to another journal");
        }
        if header.schema_id != config.schema_id {
            return err_at!(Invalid, msg: "segment carries another schema");
        }
        Ok(header)
    }
}

/// Append a record item, `(size << 1)` and the timestamp delta as
/// varints, then the payload.
pub fn encode_record(buf: &mut Vec<u8>, ts_delta: u64, payload: &[u8]) {
    util::put_uvarint(buf, (payload.len() as u64) << 1);
    util::put_uvarint(buf, ts_delta);
    buf.extend_from_slice(payload);
}

/// A commit marker: the running checksum with the low bit forced on.
pub fn commit_marker(hash: u64) -> [u8; 8] {
    (hash | 1).to_le_bytes()
}

// Replay state at the last valid commit of a segment.
pub(crate) struct ScanOutcome {
    pub committed: Vec<Record>,
    // byte length of the item stream up to and including the last
    // valid commit marker.
    pub committed_len: usize,
    // no bytes follow the last valid commit.
    pub clean: bool,
    // rolling hash state at the committed boundary.
    pub hash: Xxh64,
    pub last_timestamp: i64,
    pub n_records: u64,
}

// Walk the item stream after a segment header. Stops at the first
// corruption: a size varint that fails to parse, a short payload, or a
// commit marker that does not match the running checksum.
pub(crate) fn scan_items(items: &[u8], header: &SegmentHeader) -> ScanOutcome {
    let mut hash = Xxh64::new(0);
    let mut off = 0;
    let mut last_ts = header.timestamp;
    let mut ordinal = header.first_record_ordinal;
    let mut pending: Vec<Record> = vec![];

    let mut out = ScanOutcome {
        committed: vec![],
        committed_len: 0,
        clean: false,
        hash: hash.clone(),
        last_timestamp: header.timestamp,
        n_records: 0,
    };

    while off < items.len() {
        if items[off] & 1 == 1 {
            // commit marker
            if off + 8 > items.len() {
                break;
            }
            let marker = u64::from_le_bytes(items[off..off + 8].try_into().unwrap());
            if (hash.digest() | 1) != marker {
                break;
            }
            hash.update(&items[off..off + 8]);
            off += 8;

            out.committed.append(&mut pending);
            out.committed_len = off;
            out.hash = hash.clone();
            out.last_timestamp = last_ts;
            out.n_records = ordinal - header.first_record_ordinal;
        } else {
            let start = off;
            let (size2, rem) = match util::take_uvarint(&items[off..]) {
                Ok(pair) => pair,
                Err(_) => break,
            };
            let (delta, rem) = match util::take_uvarint(rem) {
                Ok(pair) => pair,
                Err(_) => break,
            };
            let size = (size2 >> 1) as usize;
            let data_start = items.len() - rem.len();
            if data_start + size > items.len() {
                break; // payload short-read
            }
            let end = data_start + size;

            last_ts += delta as i64;
            pending.push(Record {
                ordinal,
                timestamp: last_ts,
                payload: items[data_start..end].to_vec(),
            });
            ordinal += 1;
            hash.update(&items[start..end]);
            off = end;
        }
    }

    out.clean = out.committed_len == items.len();
    out
}

#[cfg(test)]
#[path = "segment_test.rs"]
mod segment_test;
