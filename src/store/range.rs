//! Range primitive over cursors.
//!
//! A range couples an optional byte prefix, optional lower and upper
//! bounds with independent inclusivity, and a direction. Scan
//! strategies position a cursor through [Range::start] and advance it
//! through [Range::step]; both report whether the cursor sits on an
//! entry inside the range.

use std::cmp::Ordering;

use crate::{store::Cursor, Result};

/// Bounded, optionally reversed window over a bucket's key space.
///
/// Lower and upper bounds, when present, must share the declared
/// prefix; passing bounds outside the prefix is a programmer error.
#[derive(Clone, Debug)]
pub struct Range {
    pub prefix: Option<Vec<u8>>,
    pub lo: Option<Vec<u8>>,
    pub hi: Option<Vec<u8>>,
    pub lo_inclusive: bool,
    pub hi_inclusive: bool,
    pub reverse: bool,
}

impl Default for Range {
    fn default() -> Range {
        Range {
            prefix: None,
            lo: None,
            hi: None,
            lo_inclusive: true,
            hi_inclusive: true,
            reverse: false,
        }
    }
}

impl Range {
    pub fn full() -> Range {
        Range::default()
    }

    pub fn with_prefix(prefix: Vec<u8>) -> Range {
        Range { prefix: Some(prefix), ..Range::default() }
    }

    pub fn set_lo(mut self, lo: Vec<u8>, inclusive: bool) -> Range {
        if let Some(prefix) = &self.prefix {
            debug_assert!(lo.starts_with(prefix), "lower bound outside prefix");
        }
        self.lo = Some(lo);
        self.lo_inclusive = inclusive;
        self
    }

    pub fn set_hi(mut self, hi: Vec<u8>, inclusive: bool) -> Range {
        if let Some(prefix) = &self.prefix {
            debug_assert!(hi.starts_with(prefix), "upper bound outside prefix");
        }
        self.hi = Some(hi);
        self.hi_inclusive = inclusive;
        self
    }

    pub fn set_reverse(mut self, reverse: bool) -> Range {
        self.reverse = reverse;
        self
    }

    /// Position `cur` on the first entry of the range in iteration
    /// order. Return whether such an entry exists.
    pub fn start(&self, cur: &mut Cursor) -> Result<bool> {
        if self.reverse {
            match (&self.hi, &self.prefix) {
                (Some(hi), _) => cur.seek_last_with_prefix(hi)?,
                (None, Some(prefix)) => cur.seek_last_with_prefix(prefix)?,
                (None, None) => cur.last()?,
            };
            // walk below an exclusive bound, or below keys extending
            // the upper bound.
            loop {
                let beyond = match cur.key() {
                    Some(key) => self.beyond_hi(key),
                    None => false,
                };
                if !beyond {
                    break;
                }
                cur.prev()?;
            }
        } else {
            match (&self.lo, &self.prefix) {
                (Some(lo), _) => cur.seek_ge(lo)?,
                (None, Some(prefix)) => cur.seek_ge(prefix)?,
                (None, None) => cur.first()?,
            };
            // an exclusive lower bound admits at most one skip here.
            loop {
                let below = match cur.key() {
                    Some(key) => self.below_lo(key),
                    None => false,
                };
                if !below {
                    break;
                }
                cur.next()?;
            }
        }
        Ok(self.on_entry(cur))
    }

    /// Advance `cur` one entry in iteration order. Return whether it
    /// still sits inside the range.
    pub fn step(&self, cur: &mut Cursor) -> Result<bool> {
        if self.reverse {
            cur.prev()?;
        } else {
            cur.next()?;
        }
        Ok(self.on_entry(cur))
    }

    /// Whether `key` falls inside the range.
    pub fn contains(&self, key: &[u8]) -> bool {
        if let Some(prefix) = &self.prefix {
            if !key.starts_with(prefix) {
                return false;
            }
        }
        !self.below_lo(key) && !self.beyond_hi(key)
    }

    fn on_entry(&self, cur: &Cursor) -> bool {
        match cur.key() {
            Some(key) => self.contains(key),
            None => false,
        }
    }

    fn below_lo(&self, key: &[u8]) -> bool {
        match &self.lo {
            Some(lo) => match key.cmp(lo.as_slice()) {
                Ordering::Less => true,
                Ordering::Equal => !self.lo_inclusive,
                Ordering::Greater => false,
            },
            None => false,
        }
    }

    fn beyond_hi(&self, key: &[u8]) -> bool {
        match &self.hi {
            Some(hi) => match key.cmp(hi.as_slice()) {
                Ordering::Greater => true,
                Ordering::Equal => !self.hi_inclusive,
                Ordering::Less => false,
            },
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "range_test.rs"]
mod range_test;
