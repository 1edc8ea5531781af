//! Module implement the scan engine.
//!
//! Scans reduce to a [Strategy] describing how a cursor walks a
//! bucket: full order, exact on a set of leading components, bounded
//! between encoded keys, or exact leading components with a bounded
//! trailing primary-key slot. [PrimaryIter] walks a table's data
//! bucket; [IndexIter] walks a secondary index, recovering the primary
//! key per entry and fetching rows from the data bucket on demand.

use log::debug;

use std::sync::Arc;

use crate::{
    index,
    store::{prefix_successor, Bucket, Cursor, Range},
    table::{IndexMeta, Row, Table},
    tuple, util,
    value::Value,
    Error, Result,
};

/// How a scan walks a bucket.
#[derive(Clone, Debug)]
pub enum Strategy {
    /// Every entry in order.
    Full { reverse: bool },
    /// Entries whose leading elements equal `components`. With fewer
    /// components than the key carries this is a prefix-exact scan.
    Exact { components: Vec<Vec<u8>>, reverse: bool },
    /// Entries between encoded key bounds.
    Bounded {
        lo: Option<Vec<u8>>,
        lo_inclusive: bool,
        hi: Option<Vec<u8>>,
        hi_inclusive: bool,
        reverse: bool,
    },
    /// Leading elements pinned, trailing primary-key slot bounded.
    /// Only meaningful on non-unique indices, whose entries carry the
    /// primary key as their last element.
    ExactWithKeyRange {
        components: Vec<Vec<u8>>,
        pk_lo: Option<Vec<u8>>,
        pk_lo_inclusive: bool,
        pk_hi: Option<Vec<u8>>,
        pk_hi_inclusive: bool,
        reverse: bool,
    },
}

impl Strategy {
    pub(crate) fn to_range(&self) -> Range {
        match self {
            Strategy::Full { reverse } => Range::full().set_reverse(*reverse),
            Strategy::Exact { components, reverse } => {
                Range::with_prefix(concat(components)).set_reverse(*reverse)
            }
            Strategy::Bounded { lo, lo_inclusive, hi, hi_inclusive, reverse } => {
                let mut range = Range::full().set_reverse(*reverse);
                if let Some(lo) = lo {
                    range = range.set_lo(lo.clone(), *lo_inclusive);
                }
                if let Some(hi) = hi {
                    range = range.set_hi(hi.clone(), *hi_inclusive);
                }
                range
            }
            Strategy::ExactWithKeyRange {
                components,
                pk_lo,
                pk_lo_inclusive,
                pk_hi,
                pk_hi_inclusive,
                reverse,
            } => {
                let prefix = concat(components);
                let mut range = Range::with_prefix(prefix.clone()).set_reverse(*reverse);
                // entry keys extend `prefix + pk` with the tuple
                // footer, so the pk bounds translate through the
                // prefix successor.
                if let Some(pk) = pk_lo {
                    let mut bound = prefix.clone();
                    bound.extend_from_slice(pk);
                    range = if *pk_lo_inclusive {
                        range.set_lo(bound, true)
                    } else {
                        match prefix_successor(&bound) {
                            Some(succ) => range.set_lo(succ, true),
                            None => range,
                        }
                    };
                }
                if let Some(pk) = pk_hi {
                    let mut bound = prefix.clone();
                    bound.extend_from_slice(pk);
                    range = if *pk_hi_inclusive {
                        match prefix_successor(&bound) {
                            Some(succ) => range.set_hi(succ, false),
                            None => range,
                        }
                    } else {
                        range.set_hi(bound, false)
                    };
                }
                range
            }
        }
    }

    // leading element values an entry must match exactly, if any.
    pub(crate) fn exact_components(&self) -> Option<&[Vec<u8>]> {
        match self {
            Strategy::Exact { components, .. } => Some(components),
            Strategy::ExactWithKeyRange { components, .. } => Some(components),
            _ => None,
        }
    }
}

fn concat(components: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(components.iter().map(Vec::len).sum());
    for c in components {
        out.extend_from_slice(c);
    }
    out
}

#[derive(Clone, Copy)]
enum IterState {
    Fresh,
    Live,
    Done,
}

/// Iterator over a table's data bucket, yielding decoded rows.
pub struct PrimaryIter<'a, R>
where
    R: Row,
{
    table: Table<R>,
    cursor: Cursor<'a>,
    range: Range,
    state: IterState,
}

impl<'a, R> PrimaryIter<'a, R>
where
    R: Row,
{
    pub(crate) fn new(table: Table<R>, cursor: Cursor<'a>, range: Range) -> Self {
        PrimaryIter { table, cursor, range, state: IterState::Fresh }
    }
}

impl<'a, R> Iterator for PrimaryIter<'a, R>
where
    R: Row,
{
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        let live = match self.state {
            IterState::Fresh => self.range.start(&mut self.cursor),
            IterState::Live => self.range.step(&mut self.cursor),
            IterState::Done => return None,
        };
        self.state = IterState::Live;
        match live {
            Ok(true) => (),
            Ok(false) => {
                self.state = IterState::Done;
                return None;
            }
            Err(err) => {
                self.state = IterState::Done;
                return Some(Err(err));
            }
        }

        let (key, bytes) = {
            let (k, v) = self.cursor.peek().unwrap();
            (k.to_vec(), v.to_vec())
        };
        match decode_stored_row(&self.table, &key, &bytes) {
            Ok(row) => Some(Ok(row)),
            Err(err) => {
                self.state = IterState::Done;
                Some(Err(err))
            }
        }
    }
}

/// Iterator over a secondary index, yielding decoded rows fetched from
/// the data bucket. The primary key is decoded lazily, per visited
/// entry.
pub struct IndexIter<'a, R>
where
    R: Row,
{
    table: Table<R>,
    meta: Arc<IndexMeta>,
    data: Bucket<'a>,
    cursor: Cursor<'a>,
    range: Range,
    exact: Option<Vec<Vec<u8>>>,
    expect_elements: usize,
    state: IterState,
}

impl<'a, R> IndexIter<'a, R>
where
    R: Row,
{
    pub(crate) fn new(
        table: Table<R>,
        meta: Arc<IndexMeta>,
        data: Bucket<'a>,
        cursor: Cursor<'a>,
        strategy: &Strategy,
    ) -> Self {
        let range = strategy.to_range();
        let exact = strategy.exact_components().map(<[Vec<u8>]>::to_vec);
        let expect_elements = match meta.unique {
            true => meta.key_components,
            false => meta.key_components + 1,
        };
        IndexIter { table, meta, data, cursor, range, exact, expect_elements, state: IterState::Fresh }
    }

    // decode the entry under the cursor; Ok(None) means skip.
    fn visit(&self) -> Result<Option<R>> {
        let (key, value) = match self.cursor.peek() {
            Some((k, v)) => (k, v),
            None => return Ok(None),
        };

        if self.meta.debug_scans {
            debug!(
                target: "scan  ",
                "{}.{} visit {}",
                self.table.to_name(),
                self.meta.name,
                util::key_snippet(key)
            );
        }

        let dec = match tuple::Decoder::from_bytes(key) {
            Ok(dec) => dec,
            Err(err) => return Err(self.corrupt(key, err)),
        };
        if dec.len() != self.expect_elements {
            let res: Result<()> = err_at!(
                DecodeFail, msg: "index entry has {}/{} elements", dec.len(), self.expect_elements
            );
            return Err(self.corrupt(key, res.unwrap_err()));
        }

        // exact scans over variable-width components can collide on
        // the byte prefix without matching element-wise; skip those.
        if let Some(exact) = &self.exact {
            for (i, want) in exact.iter().enumerate() {
                if dec.element(i) != Some(want.as_slice()) {
                    return Ok(None);
                }
            }
        }

        let pk = match index::entry_primary_key(key, value) {
            Ok(pk) => pk,
            Err(err) => return Err(self.corrupt(key, err)),
        };
        let bytes = match self.data.get(&pk)? {
            Some(bytes) => bytes,
            None => {
                let res: Result<()> =
                    err_at!(DecodeFail, msg: "index entry references missing row");
                return Err(self.corrupt(key, res.unwrap_err()));
            }
        };
        decode_stored_row(&self.table, &pk, &bytes).map(Some)
    }

    fn corrupt(&self, key: &[u8], err: Error) -> Error {
        wrap_corruption(
            &self.table.to_name(),
            Some(&self.meta.name),
            key,
            err,
        )
    }
}

impl<'a, R> Iterator for IndexIter<'a, R>
where
    R: Row,
{
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let live = match self.state {
                IterState::Fresh => self.range.start(&mut self.cursor),
                IterState::Live => self.range.step(&mut self.cursor),
                IterState::Done => return None,
            };
            self.state = IterState::Live;
            match live {
                Ok(true) => (),
                Ok(false) => {
                    self.state = IterState::Done;
                    return None;
                }
                Err(err) => {
                    self.state = IterState::Done;
                    return Some(Err(err));
                }
            }

            match self.visit() {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue, // exact mismatch, skip
                Err(err) => {
                    self.state = IterState::Done;
                    return Some(Err(err));
                }
            }
        }
    }
}

// decode a stored row, running the migrator when the stored schema
// version lags the table's.
pub(crate) fn decode_stored_row<R>(table: &Table<R>, key: &[u8], bytes: &[u8]) -> Result<R>
where
    R: Row,
{
    let def = &table.core.def;
    let val = match Value::decode(bytes) {
        Ok(val) => val,
        Err(err) => return Err(wrap_corruption(&def.name, None, key, err)),
    };
    let row = match R::decode_row(&val.data) {
        Ok(row) => row,
        Err(err) => return Err(wrap_corruption(&def.name, None, key, err)),
    };
    match &def.migrator {
        Some(migrator) if val.schema_version < def.schema_version => {
            migrator(val.schema_version, row)
        }
        _ => Ok(row),
    }
}

// attach table / index / key context to a corruption error.
pub(crate) fn wrap_corruption(
    table: &str,
    index: Option<&str>,
    key: &[u8],
    err: Error,
) -> Error {
    let ctx = match index {
        Some(index) => format!("table {} index {} key {}", table, index, util::key_snippet(key)),
        None => format!("table {} key {}", table, util::key_snippet(key)),
    };
    match err {
        Error::DecodeFail(p, m) => Error::DecodeFail(p, format!("{}: {}", ctx, m)),
        Error::FailCbor(p, m) => Error::DecodeFail(p, format!("{}: {}", ctx, m)),
        err => err,
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
