//! Module implement common utility functions and types.

use cbordata::{Cbor, FromCbor, IntoCbor};

use std::{
    ffi,
    fmt::Write,
    fs,
    ops::{Bound, RangeBounds},
    path,
};

use crate::{Error, Result};

/// Maximum byte-length for an unsigned varint.
pub const MAX_VARINT_LEN: usize = 10;

#[macro_export]
macro_rules! check_remaining {
    ($buf:expr, $want:expr, $msg:expr) => {
        if $buf.len() < $want {
            err_at!(
                DecodeFail, msg: "insufficient input {}/{} ({})", $msg, $buf.len(), $want
            )
        } else {
            Ok(())
        }
    };
}

#[macro_export]
macro_rules! write_file {
    ($fd:expr, $buffer:expr, $file:expr, $msg:expr) => {{
        use std::io::Write;

        match err_at!(IOError, $fd.write($buffer))? {
            n if $buffer.len() == n => Ok(n),
            n => err_at!(
                Fatal, msg: "partial-wr {}, {:?}, {}/{}", $msg, $file, $buffer.len(), n
            ),
        }
    }};
}

/// Append `val` as unsigned LEB128 varint.
pub fn put_uvarint(buf: &mut Vec<u8>, mut val: u64) {
    loop {
        let byt = (val & 0x7f) as u8;
        val >>= 7;
        if val == 0 {
            buf.push(byt);
            break;
        }
        buf.push(byt | 0x80);
    }
}

/// Decode an unsigned varint from the head of `buf`, return the value
/// and the remaining slice.
pub fn take_uvarint(buf: &[u8]) -> Result<(u64, &[u8])> {
    let mut val = 0_u64;
    let mut shift = 0_u32;
    for (i, byt) in buf.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return err_at!(DecodeFail, msg: "uvarint too long");
        }
        if *byt < 0x80 {
            if i == MAX_VARINT_LEN - 1 && *byt > 1 {
                return err_at!(DecodeFail, msg: "uvarint overflows u64");
            }
            val |= (*byt as u64) << shift;
            return Ok((val, &buf[i + 1..]));
        }
        val |= ((*byt & 0x7f) as u64) << shift;
        shift += 7;
    }
    err_at!(DecodeFail, msg: "truncated uvarint")
}

/// Append `val` as varint with its bytes laid out right-to-left, so it
/// can be decoded walking leftward from the end of a buffer.
pub fn put_reverse_uvarint(buf: &mut Vec<u8>, val: u64) {
    let start = buf.len();
    put_uvarint(buf, val);
    buf[start..].reverse();
}

/// Decode a reverse varint from the tail of `buf`, return the value and
/// the slice preceding it.
pub fn take_reverse_uvarint(buf: &[u8]) -> Result<(u64, &[u8])> {
    let mut val = 0_u64;
    let mut shift = 0_u32;
    let mut i = buf.len();
    loop {
        if i == 0 {
            return err_at!(DecodeFail, msg: "truncated reverse uvarint");
        }
        if shift as usize >= MAX_VARINT_LEN * 7 {
            return err_at!(DecodeFail, msg: "reverse uvarint too long");
        }
        i -= 1;
        let byt = buf[i];
        if byt < 0x80 {
            val |= (byt as u64) << shift;
            return Ok((val, &buf[..i]));
        }
        val |= ((byt & 0x7f) as u64) << shift;
        shift += 7;
    }
}

/// Render `key` as a hex snippet bounded to a 64-byte prefix and a
/// 32-byte suffix, for corruption messages.
pub fn key_snippet(key: &[u8]) -> String {
    if key.len() <= 96 {
        to_hex(key)
    } else {
        format!("{}..{}", to_hex(&key[..64]), to_hex(&key[key.len() - 32..]))
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for byt in bytes {
        write!(&mut s, "{:02x}", byt).ok();
    }
    s
}

/// Helper function to serialize value `T` implementing IntoCbor, into
/// byte-string.
pub fn into_cbor_bytes<T>(val: T) -> Result<Vec<u8>>
where
    T: IntoCbor,
{
    let mut data: Vec<u8> = vec![];
    let n = err_at!(
        FailCbor,
        err_at!(FailCbor, val.into_cbor())?.encode(&mut data)
    )?;
    if n != data.len() {
        err_at!(Fatal, msg: "cbor encoding len mistmatch {} {}", n, data.len())
    } else {
        Ok(data)
    }
}

/// Helper function to deserialize value `T` implementing FromCbor, from
/// byte-string. Return (value, bytes-consumed).
pub fn from_cbor_bytes<T>(mut data: &[u8]) -> Result<(T, usize)>
where
    T: FromCbor,
{
    let (val, n) = err_at!(FailCbor, Cbor::decode(&mut data))?;
    Ok((err_at!(FailCbor, T::from_cbor(val))?, n))
}

pub fn to_start_end<G, K>(within: G) -> (Bound<K>, Bound<K>)
where
    K: Clone,
    G: RangeBounds<K>,
{
    let start = match within.start_bound() {
        Bound::Included(val) => Bound::Included(val.clone()),
        Bound::Excluded(val) => Bound::Excluded(val.clone()),
        Bound::Unbounded => Bound::Unbounded,
    };
    let end = match within.end_bound() {
        Bound::Included(val) => Bound::Included(val.clone()),
        Bound::Excluded(val) => Bound::Excluded(val.clone()),
        Bound::Unbounded => Bound::Unbounded,
    };
    (start, end)
}

// create a file in append mode for writing.
pub fn create_file_a(file: &ffi::OsStr) -> Result<fs::File> {
    let os_file = {
        let os_file = path::Path::new(file);
        fs::remove_file(os_file).ok(); // NOTE: ignore remove errors.
        os_file
    };

    {
        let parent = match os_file.parent() {
            Some(parent) => Ok(parent),
            None => err_at!(Invalid, msg: "{:?}", file),
        }?;
        err_at!(IOError, fs::create_dir_all(parent))?;
    };

    let mut opts = fs::OpenOptions::new();
    Ok(err_at!(
        IOError,
        opts.append(true).create_new(true).open(os_file)
    )?)
}

// open existing file in append mode for writing.
pub fn open_file_a(file: &ffi::OsStr) -> Result<fs::File> {
    let os_file = path::Path::new(file);
    let mut opts = fs::OpenOptions::new();
    Ok(err_at!(IOError, opts.append(true).open(os_file))?)
}

// open file for reading.
pub fn open_file_r(file: &ffi::OsStr) -> Result<fs::File> {
    let os_file = path::Path::new(file);
    Ok(err_at!(
        IOError,
        fs::OpenOptions::new().read(true).open(os_file)
    )?)
}
