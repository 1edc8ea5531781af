//! Segment file naming.
//!
//! `{prefix}{seq:010}-{YYYYMMDDTHHMMSS}-{record_ordinal:012}{suffix}`,
//! zero-padded so lexicographic file-name order equals segment order.

use chrono::{DateTime, NaiveDateTime};

use std::{ffi, fs, path};

use crate::{journal::Config, Error, Result};

/// Parsed form of a segment file name.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentFileName {
    pub seq: u32,
    pub timestamp: i64,
    pub record_ordinal: u64,
}

pub fn make_filename(config: &Config, name: &SegmentFileName) -> ffi::OsString {
    let file = format!(
        "{}{:010}-{}-{:012}{}",
        config.prefix,
        name.seq,
        format_timestamp(name.timestamp),
        name.record_ordinal,
        config.suffix
    );
    AsRef::<ffi::OsStr>::as_ref(&file).to_os_string()
}

pub fn unwrap_filename(config: &Config, file: &ffi::OsStr) -> Option<SegmentFileName> {
    let name = file.to_str()?;
    let rest = name.strip_prefix(config.prefix.as_str())?;
    let rest = rest.strip_suffix(config.suffix.as_str())?;

    let mut parts = rest.splitn(3, '-');
    let seq = parts.next()?.parse::<u32>().ok()?;
    let timestamp = parse_timestamp(parts.next()?)?;
    let record_ordinal = parts.next()?.parse::<u64>().ok()?;
    Some(SegmentFileName { seq, timestamp, record_ordinal })
}

pub fn format_timestamp(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%Y%m%dT%H%M%S").to_string(),
        None => "19700101T000000".to_string(),
    }
}

pub fn parse_timestamp(text: &str) -> Option<i64> {
    let dt = NaiveDateTime::parse_from_str(text, "%Y%m%dT%H%M%S").ok()?;
    Some(dt.and_utc().timestamp())
}

/// Discover segment files under the journal directory, in segment
/// order.
pub fn list_segments(config: &Config) -> Result<Vec<(SegmentFileName, ffi::OsString)>> {
    let mut out = vec![];
    for item in err_at!(IOError, fs::read_dir(path::Path::new(&config.dir)))? {
        let file_name = err_at!(IOError, item)?.file_name();
        if let Some(name) = unwrap_filename(config, &file_name) {
            let location: path::PathBuf =
                [config.dir.clone(), file_name].iter().collect();
            out.push((name, location.into_os_string()));
        }
    }
    out.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(out)
}

#[cfg(test)]
#[path = "files_test.rs"]
mod files_test;
