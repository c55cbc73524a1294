//! Enumerating the files a writer has produced.

use crate::rotation::parse_file_name;
use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One `{date}.{index}.{ext}` file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub date: NaiveDate,
    pub index: u32,
    /// Size in bytes when the directory was listed.
    pub len: u64,
}

/// Every rotation file in `dir`, ordered by date then index.
///
/// Files that do not follow the naming pattern are ignored. A missing
/// directory yields an empty list.
pub fn list_files(dir: &Path, ext: &str) -> io::Result<Vec<LogFile>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some((date, index)) = name.to_str().and_then(|n| parse_file_name(n, ext)) else {
            continue;
        };
        files.push(LogFile {
            path: entry.path(),
            date,
            index,
            len: meta.len(),
        });
    }
    files.sort_by_key(|f| (f.date, f.index));
    Ok(files)
}

/// The files written on `date`, across all rotation indices, in index order.
pub fn list_day(dir: &Path, ext: &str, date: NaiveDate) -> io::Result<Vec<LogFile>> {
    let mut files = list_files(dir, ext)?;
    files.retain(|f| f.date == date);
    Ok(files)
}

/// The distinct days that have at least one file, oldest first.
pub fn list_dates(dir: &Path, ext: &str) -> io::Result<Vec<NaiveDate>> {
    let mut dates: Vec<NaiveDate> = list_files(dir, ext)?.into_iter().map(|f| f.date).collect();
    dates.dedup();
    Ok(dates)
}

/// Number of regular files directly inside `dir`, whatever their names.
/// A missing directory holds none.
pub(crate) fn count_files(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut count = 0;
    for entry in entries {
        if entry?.file_type()?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}
