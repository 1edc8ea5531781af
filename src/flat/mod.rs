//! Module implement the schema driven flat codec.
//!
//! A [Flat] value is described by an ordered list of leaf components,
//! each with a byte codec and a text codec. Struct-like values flatten
//! their fields left-to-right; the resulting components are placed into
//! a [tuple](crate::tuple) so element lengths are preserved. Integers
//! are encoded big-endian fixed-width so that their lexicographic byte
//! order matches their numeric order, which is what makes flat values
//! usable as bucket keys.

use std::convert::TryInto;

use crate::{tuple, Error, Result};

/// Types encodable as ordered, fixed-schema key components.
pub trait Flat: Sized {
    /// Number of leaf components this type flattens into.
    const COMPONENTS: usize;

    /// Append this value's components to `enc`.
    fn encode(&self, enc: &mut tuple::Encoder);

    /// Consume this value's components from `dec`.
    fn decode(dec: &mut tuple::Decoder<'_>) -> Result<Self>;

    /// Human readable rendering, composite values join components
    /// with `/`.
    fn format_text(&self) -> String;

    /// Reverse of [Flat::format_text].
    fn parse_text(text: &str) -> Result<Self>;

    /// Whether this value is the zero sentinel for its type. Zero
    /// primary keys are rejected on writes.
    fn is_zero(&self) -> bool;
}

impl Flat for u64 {
    const COMPONENTS: usize = 1;

    fn encode(&self, enc: &mut tuple::Encoder) {
        enc.push(&self.to_be_bytes());
    }

    fn decode(dec: &mut tuple::Decoder<'_>) -> Result<Self> {
        let el = dec.next_element()?;
        let bytes: [u8; 8] = match el.try_into() {
            Ok(bytes) => bytes,
            Err(_) => return err_at!(DecodeFail, msg: "u64 component {} bytes", el.len()),
        };
        Ok(u64::from_be_bytes(bytes))
    }

    fn format_text(&self) -> String {
        self.to_string()
    }

    fn parse_text(text: &str) -> Result<Self> {
        err_at!(Invalid, text.parse::<u64>())
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }
}

impl Flat for u32 {
    const COMPONENTS: usize = 1;

    fn encode(&self, enc: &mut tuple::Encoder) {
        (*self as u64).encode(enc)
    }

    fn decode(dec: &mut tuple::Decoder<'_>) -> Result<Self> {
        let val = u64::decode(dec)?;
        err_at!(FailConvert, val.try_into())
    }

    fn format_text(&self) -> String {
        self.to_string()
    }

    fn parse_text(text: &str) -> Result<Self> {
        err_at!(Invalid, text.parse::<u32>())
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }
}

impl Flat for i64 {
    const COMPONENTS: usize = 1;

    fn encode(&self, enc: &mut tuple::Encoder) {
        // flip the sign bit so lexicographic order matches numeric
        // order across negative values.
        enc.push(&((*self as u64) ^ (1 << 63)).to_be_bytes());
    }

    fn decode(dec: &mut tuple::Decoder<'_>) -> Result<Self> {
        let el = dec.next_element()?;
        let bytes: [u8; 8] = match el.try_into() {
            Ok(bytes) => bytes,
            Err(_) => return err_at!(DecodeFail, msg: "i64 component {} bytes", el.len()),
        };
        Ok((u64::from_be_bytes(bytes) ^ (1 << 63)) as i64)
    }

    fn format_text(&self) -> String {
        self.to_string()
    }

    fn parse_text(text: &str) -> Result<Self> {
        err_at!(Invalid, text.parse::<i64>())
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }
}

impl Flat for String {
    const COMPONENTS: usize = 1;

    fn encode(&self, enc: &mut tuple::Encoder) {
        enc.push(self.as_bytes());
    }

    fn decode(dec: &mut tuple::Decoder<'_>) -> Result<Self> {
        let el = dec.next_element()?;
        err_at!(DecodeFail, std::str::from_utf8(el)).map(str::to_string)
    }

    fn format_text(&self) -> String {
        self.clone()
    }

    fn parse_text(text: &str) -> Result<Self> {
        Ok(text.to_string())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Flat for Vec<u8> {
    const COMPONENTS: usize = 1;

    fn encode(&self, enc: &mut tuple::Encoder) {
        enc.push(self);
    }

    fn decode(dec: &mut tuple::Decoder<'_>) -> Result<Self> {
        Ok(dec.next_element()?.to_vec())
    }

    fn format_text(&self) -> String {
        self.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn parse_text(text: &str) -> Result<Self> {
        if text.len() % 2 != 0 {
            return err_at!(Invalid, msg: "odd hex length {}", text.len());
        }
        let mut out = Vec::with_capacity(text.len() / 2);
        for i in (0..text.len()).step_by(2) {
            out.push(err_at!(Invalid, u8::from_str_radix(&text[i..i + 2], 16))?);
        }
        Ok(out)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<const N: usize> Flat for [u8; N] {
    const COMPONENTS: usize = 1;

    fn encode(&self, enc: &mut tuple::Encoder) {
        enc.push(self);
    }

    fn decode(dec: &mut tuple::Decoder<'_>) -> Result<Self> {
        let el = dec.next_element()?;
        match el.try_into() {
            Ok(arr) => Ok(arr),
            Err(_) => err_at!(DecodeFail, msg: "array component {}/{} bytes", el.len(), N),
        }
    }

    fn format_text(&self) -> String {
        self.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn parse_text(text: &str) -> Result<Self> {
        let bytes = <Vec<u8> as Flat>::parse_text(text)?;
        match bytes.as_slice().try_into() {
            Ok(arr) => Ok(arr),
            Err(_) => err_at!(Invalid, msg: "array text {}/{} bytes", bytes.len(), N),
        }
    }

    fn is_zero(&self) -> bool {
        self.iter().all(|b| *b == 0)
    }
}

/// A point in time carried as signed unix seconds, encoded big-endian
/// 64-bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixTime(pub i64);

impl Flat for UnixTime {
    const COMPONENTS: usize = 1;

    fn encode(&self, enc: &mut tuple::Encoder) {
        enc.push(&self.0.to_be_bytes());
    }

    fn decode(dec: &mut tuple::Decoder<'_>) -> Result<Self> {
        let el = dec.next_element()?;
        let bytes: [u8; 8] = match el.try_into() {
            Ok(bytes) => bytes,
            Err(_) => return err_at!(DecodeFail, msg: "time component {} bytes", el.len()),
        };
        Ok(UnixTime(i64::from_be_bytes(bytes)))
    }

    fn format_text(&self) -> String {
        self.0.to_string()
    }

    fn parse_text(text: &str) -> Result<Self> {
        Ok(UnixTime(err_at!(Invalid, text.parse::<i64>())?))
    }

    fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl<T> Flat for Box<T>
where
    T: Flat,
{
    const COMPONENTS: usize = T::COMPONENTS;

    fn encode(&self, enc: &mut tuple::Encoder) {
        self.as_ref().encode(enc)
    }

    fn decode(dec: &mut tuple::Decoder<'_>) -> Result<Self> {
        Ok(Box::new(T::decode(dec)?))
    }

    fn format_text(&self) -> String {
        self.as_ref().format_text()
    }

    fn parse_text(text: &str) -> Result<Self> {
        Ok(Box::new(T::parse_text(text)?))
    }

    fn is_zero(&self) -> bool {
        self.as_ref().is_zero()
    }
}

impl<A, B> Flat for (A, B)
where
    A: Flat,
    B: Flat,
{
    const COMPONENTS: usize = A::COMPONENTS + B::COMPONENTS;

    fn encode(&self, enc: &mut tuple::Encoder) {
        self.0.encode(enc);
        self.1.encode(enc);
    }

    fn decode(dec: &mut tuple::Decoder<'_>) -> Result<Self> {
        Ok((A::decode(dec)?, B::decode(dec)?))
    }

    fn format_text(&self) -> String {
        format!("{}/{}", self.0.format_text(), self.1.format_text())
    }

    fn parse_text(text: &str) -> Result<Self> {
        match text.split_once('/') {
            Some((a, b)) => Ok((A::parse_text(a)?, B::parse_text(b)?)),
            None => err_at!(Invalid, msg: "composite text {:?}", text),
        }
    }

    fn is_zero(&self) -> bool {
        self.0.is_zero() && self.1.is_zero()
    }
}

impl<A, B, C> Flat for (A, B, C)
where
    A: Flat,
    B: Flat,
    C: Flat,
{
    const COMPONENTS: usize = A::COMPONENTS + B::COMPONENTS + C::COMPONENTS;

    fn encode(&self, enc: &mut tuple::Encoder) {
        self.0.encode(enc);
        self.1.encode(enc);
        self.2.encode(enc);
    }

    fn decode(dec: &mut tuple::Decoder<'_>) -> Result<Self> {
        Ok((A::decode(dec)?, B::decode(dec)?, C::decode(dec)?))
    }

    fn format_text(&self) -> String {
        format!(
            "{}/{}/{}",
            self.0.format_text(),
            self.1.format_text(),
            self.2.format_text()
        )
    }

    fn parse_text(text: &str) -> Result<Self> {
        let (a, rest) = match text.split_once('/') {
            Some(parts) => parts,
            None => return err_at!(Invalid, msg: "composite text {:?}", text),
        };
        let (b, c) = match rest.split_once('/') {
            Some(parts) => parts,
            None => return err_at!(Invalid, msg: "composite text {:?}", text),
        };
        Ok((A::parse_text(a)?, B::parse_text(b)?, C::parse_text(c)?))
    }

    fn is_zero(&self) -> bool {
        self.0.is_zero() && self.1.is_zero() && self.2.is_zero()
    }
}

/// Tuple-encode `key`'s components, the stored form of a key.
pub fn to_key_bytes<K>(key: &K) -> Vec<u8>
where
    K: Flat,
{
    let mut enc = tuple::Encoder::new();
    key.encode(&mut enc);
    enc.finish()
}

/// Decode a key from its stored tuple form, verifying the component
/// count against the schema.
pub fn from_key_bytes<K>(buf: &[u8]) -> Result<K>
where
    K: Flat,
{
    let mut dec = tuple::Decoder::from_bytes(buf)?;
    if dec.len() != K::COMPONENTS {
        return err_at!(
            DecodeFail, msg: "key components {}/{}", dec.len(), K::COMPONENTS
        );
    }
    K::decode(&mut dec)
}

/// The concatenation of `key`'s component bytes, without the tuple
/// footer. This is the raw prefix form used by scans.
pub fn to_raw_components<K>(key: &K) -> Vec<u8>
where
    K: Flat,
{
    let mut enc = tuple::Encoder::new();
    key.encode(&mut enc);
    enc.into_raw()
}

/// Tuple-encode `key` into a recycled buffer.
pub fn encode_key_into<K>(key: &K, buf: Vec<u8>) -> Vec<u8>
where
    K: Flat,
{
    let mut enc = tuple::Encoder::with_buffer(buf);
    key.encode(&mut enc);
    enc.finish()
}

/// `key`'s individual component byte-strings.
pub fn key_components<K>(key: &K) -> Vec<Vec<u8>>
where
    K: Flat,
{
    let mut enc = tuple::Encoder::new();
    key.encode(&mut enc);
    enc.components()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
