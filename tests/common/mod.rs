#![allow(dead_code)]

use chrono::NaiveDate;
use daylog::{ManualClock, RotatingWriter, RotatingWriterBuilder};
use std::fs;
use std::path::{Path, PathBuf};

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The date every test writer starts on.
pub fn start_day() -> NaiveDate {
    day(2024, 6, 1)
}

pub fn fixed_clock() -> ManualClock {
    ManualClock::new(start_day())
}

/// A builder pinned to [`start_day`] so tests never straddle midnight.
pub fn writer_in(dir: &Path) -> RotatingWriterBuilder {
    RotatingWriter::builder(dir).clock(fixed_clock())
}

pub fn log_path(dir: &Path, date: NaiveDate, index: u32) -> PathBuf {
    dir.join(daylog::file_name(date, index, "log"))
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
}

/// Every line written for `date`, files taken in rotation order.
pub fn lines_for_day(dir: &Path, date: NaiveDate) -> Vec<String> {
    daylog::list_day(dir, "log", date)
        .unwrap()
        .iter()
        .flat_map(|f| read(&f.path).lines().map(str::to_string).collect::<Vec<_>>())
        .collect()
}
