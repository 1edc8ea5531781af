//! Module implement the row value codec.
//!
//! A stored row is `header + data + index-list`. The header is five
//! unsigned varints, flags, schema version, mod count, data size and
//! index size. The writer reserves the maximum header width, appends
//! data and index list, then back-fills the header shifted right so the
//! encoded value carries no padding. The index list is the authoritative
//! record of the index entries this row contributed, and drives the
//! deletion side of incremental index maintenance.

use std::convert::TryFrom;

use crate::{util, Error, Result};

/// Required version flag, bit 0.
pub const FLAG_VERSION1: u64 = 0x1;
/// Reserved flag for gzip compressed data, bit 1. Never written.
pub const FLAG_GZIP: u64 = 0x2;

const FLAG_MASK: u64 = FLAG_VERSION1 | FLAG_GZIP;

/// Sanity cap on decoded schema versions.
pub const MAX_SCHEMA_VERSION: u64 = 10_000;

const MIN_ENCODED_LEN: usize = 5;
const HEADER_RESERVE: usize = 5 * util::MAX_VARINT_LEN;

/// One entry of a row's embedded index-key list.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexKey {
    pub ordinal: u32,
    pub key: Vec<u8>,
}

/// Decoded row value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Value {
    pub flags: u64,
    pub schema_version: u32,
    pub mod_count: u64,
    pub data: Vec<u8>,
    pub index_keys: Vec<IndexKey>,
}

impl Value {
    pub fn new(schema_version: u32, mod_count: u64, data: Vec<u8>) -> Value {
        Value {
            flags: FLAG_VERSION1,
            schema_version,
            mod_count,
            data,
            index_keys: Vec::new(),
        }
    }

    /// Append the encoded value to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let base = buf.len();
        buf.resize(base + HEADER_RESERVE, 0);
        buf.extend_from_slice(&self.data);
        let data_end = buf.len();
        encode_index_keys(&self.index_keys, buf);
        let index_size = buf.len() - data_end;

        let mut hdr: Vec<u8> = Vec::with_capacity(HEADER_RESERVE);
        util::put_uvarint(&mut hdr, self.flags);
        util::put_uvarint(&mut hdr, self.schema_version as u64);
        util::put_uvarint(&mut hdr, self.mod_count);
        util::put_uvarint(&mut hdr, self.data.len() as u64);
        util::put_uvarint(&mut hdr, index_size as u64);

        // back-fill the header so its end meets the data start, then
        // drop the unused reserve.
        let start = base + HEADER_RESERVE - hdr.len();
        buf[start..base + HEADER_RESERVE].copy_from_slice(&hdr);
        buf.drain(base..start);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_RESERVE + self.data.len());
        self.encode(&mut buf);
        buf
    }

    /// Decode a full row value, header, data and index list.
    pub fn decode(buf: &[u8]) -> Result<Value> {
        let (val, data_size, index_size, rem) = Self::decode_header(buf)?;
        if rem.len() != data_size + index_size {
            return err_at!(
                DecodeFail, msg: "value size {}+{} != {}", data_size, index_size, rem.len()
            );
        }
        let mut val = val;
        val.data = rem[..data_size].to_vec();
        val.index_keys = decode_index_keys(&rem[data_size..])?;
        Ok(val)
    }

    /// Decode a memento, a value whose index-list tail has been
    /// stripped by the caller. Only the data portion is recovered.
    pub fn decode_memento(buf: &[u8]) -> Result<Value> {
        let (val, data_size, _index_size, rem) = Self::decode_header(buf)?;
        if rem.len() != data_size {
            return err_at!(
                DecodeFail, msg: "memento size {} != {}", data_size, rem.len()
            );
        }
        let mut val = val;
        val.data = rem.to_vec();
        Ok(val)
    }

    /// Strip the index-key tail off an encoded value, producing the
    /// memento form: header and data only, usable as an opaque
    /// snapshot of the row.
    pub fn to_memento(buf: &[u8]) -> Result<Vec<u8>> {
        let (_, data_size, index_size, rem) = Self::decode_header(buf)?;
        if rem.len() != data_size + index_size {
            return err_at!(
                DecodeFail, msg: "value size {}+{} != {}", data_size, index_size, rem.len()
            );
        }
        Ok(buf[..buf.len() - index_size].to_vec())
    }

    fn decode_header(buf: &[u8]) -> Result<(Value, usize, usize, &[u8])> {
        check_remaining!(buf, MIN_ENCODED_LEN, "value header")?;
        let (flags, rem) = util::take_uvarint(buf)?;
        if (flags & !FLAG_MASK) != 0 {
            return err_at!(DecodeFail, msg: "value flags {:x}", flags);
        }
        if (flags & FLAG_VERSION1) == 0 {
            return err_at!(DecodeFail, msg: "value missing version flag");
        }
        if (flags & FLAG_GZIP) != 0 {
            return err_at!(DecodeFail, msg: "gzip flag is reserved");
        }
        let (schema_version, rem) = util::take_uvarint(rem)?;
        if schema_version == 0 || schema_version > MAX_SCHEMA_VERSION {
            return err_at!(DecodeFail, msg: "schema version {}", schema_version);
        }
        let (mod_count, rem) = util::take_uvarint(rem)?;
        let (data_size, rem) = util::take_uvarint(rem)?;
        let (index_size, rem) = util::take_uvarint(rem)?;

        let val = Value {
            flags,
            schema_version: schema_version as u32,
            mod_count,
            data: Vec::new(),
            index_keys: Vec::new(),
        };
        Ok((val, data_size as usize, index_size as usize, rem))
    }
}

/// Append the index-key list, count followed by (ordinal, len, key)
/// entries.
pub fn encode_index_keys(keys: &[IndexKey], buf: &mut Vec<u8>) {
    util::put_uvarint(buf, keys.len() as u64);
    for ik in keys {
        util::put_uvarint(buf, ik.ordinal as u64);
        util::put_uvarint(buf, ik.key.len() as u64);
        buf.extend_from_slice(&ik.key);
    }
}

pub fn decode_index_keys(mut buf: &[u8]) -> Result<Vec<IndexKey>> {
    let (count, rem) = util::take_uvarint(buf)?;
    buf = rem;
    let mut keys = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (ordinal, rem) = util::take_uvarint(buf)?;
        let ordinal = err_at!(FailConvert, u32::try_from(ordinal))?;
        let (len, rem) = util::take_uvarint(rem)?;
        let len = len as usize;
        check_remaining!(rem, len, "index-key entry")?;
        keys.push(IndexKey { ordinal, key: rem[..len].to_vec() });
        buf = &rem[len..];
    }
    if !buf.is_empty() {
        return err_at!(DecodeFail, msg: "trailing {} bytes after index list", buf.len());
    }
    Ok(keys)
}

#[cfg(test)]
#[path = "value_test.rs"]
mod value_test;
