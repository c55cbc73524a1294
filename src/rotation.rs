//! Rotation decisions and file naming.
//!
//! Output files are named `{YYYY-MM-DD}.{index}.{ext}`. The index starts at 0
//! each calendar day and grows by one every time the current file reaches the
//! size ceiling. Everything here is pure: the writer feeds in the clock and the
//! byte counts it observed.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Where the next write lands and how full that file already is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationState {
    pub date: NaiveDate,
    pub index: u32,
    pub bytes_written: u64,
}

impl RotationState {
    /// A fresh state for the first file of `date`.
    pub fn new(date: NaiveDate) -> Self {
        RotationState {
            date,
            index: 0,
            bytes_written: 0,
        }
    }

    /// Path of the file this state points at.
    pub fn path(&self, dir: &Path, ext: &str) -> PathBuf {
        dir.join(file_name(self.date, self.index, ext))
    }
}

/// Decides when the writer must move on to a new file.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use daylog::{RotationPolicy, RotationState};
///
/// let policy = RotationPolicy::new(6);
/// let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
/// let tuesday = monday.succ_opt().unwrap();
///
/// let full = RotationState { date: monday, index: 2, bytes_written: 7 };
/// assert_eq!(policy.advance(full, monday).index, 3);
///
/// // A new day always starts over at index 0.
/// let next = policy.advance(full, tuesday);
/// assert_eq!((next.date, next.index, next.bytes_written), (tuesday, 0, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    max_file_size: u64,
}

impl RotationPolicy {
    pub fn new(max_file_size: u64) -> Self {
        RotationPolicy { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn needs_new_file_for_date(&self, state: &RotationState, today: NaiveDate) -> bool {
        state.date != today
    }

    pub fn needs_new_file_for_size(&self, state: &RotationState) -> bool {
        state.bytes_written >= self.max_file_size
    }

    pub fn needs_rotation(&self, state: &RotationState, today: NaiveDate) -> bool {
        self.needs_new_file_for_date(state, today) || self.needs_new_file_for_size(state)
    }

    /// The state the next write should use.
    ///
    /// A date change wins over size: the first file of a new day is index 0
    /// even if yesterday's last file still had room.
    pub fn advance(&self, state: RotationState, today: NaiveDate) -> RotationState {
        if self.needs_new_file_for_date(&state, today) {
            RotationState::new(today)
        } else if self.needs_new_file_for_size(&state) {
            RotationState {
                date: state.date,
                index: state.index + 1,
                bytes_written: 0,
            }
        } else {
            state
        }
    }
}

/// File name for the given day and rotation index.
///
/// ```
/// use chrono::NaiveDate;
///
/// let day = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
/// assert_eq!(daylog::file_name(day, 3, "log"), "2024-01-09.3.log");
/// ```
pub fn file_name(date: NaiveDate, index: u32, ext: &str) -> String {
    format!("{}.{index}.{ext}", date.format(DATE_FORMAT))
}

/// Parse a name produced by [`file_name`] back into its date and index.
///
/// Returns `None` for anything that does not follow the pattern exactly,
/// including names with a different extension.
pub fn parse_file_name(name: &str, ext: &str) -> Option<(NaiveDate, u32)> {
    let stem = name.strip_suffix(ext)?.strip_suffix('.')?;
    let (date, index) = stem.rsplit_once('.')?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    let index = index.parse().ok()?;
    Some((date, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn unchanged_when_room_left() {
        let policy = RotationPolicy::new(100);
        let state = RotationState {
            date: day(2024, 5, 1),
            index: 1,
            bytes_written: 99,
        };
        assert!(!policy.needs_rotation(&state, day(2024, 5, 1)));
        assert_eq!(policy.advance(state, day(2024, 5, 1)), state);
    }

    #[test]
    fn size_ceiling_is_inclusive() {
        let policy = RotationPolicy::new(100);
        let state = RotationState {
            date: day(2024, 5, 1),
            index: 0,
            bytes_written: 100,
        };
        let next = policy.advance(state, day(2024, 5, 1));
        assert_eq!(next.index, 1);
        assert_eq!(next.bytes_written, 0);
    }

    #[test]
    fn date_change_resets_index_even_when_full() {
        let policy = RotationPolicy::new(10);
        let state = RotationState {
            date: day(2024, 5, 1),
            index: 7,
            bytes_written: 50,
        };
        assert_eq!(
            policy.advance(state, day(2024, 5, 2)),
            RotationState::new(day(2024, 5, 2))
        );
    }

    #[test]
    fn parse_round_trips_and_rejects_foreign_names() {
        let name = file_name(day(2023, 11, 30), 12, "log");
        assert_eq!(parse_file_name(&name, "log"), Some((day(2023, 11, 30), 12)));

        assert_eq!(parse_file_name("2023-11-30.12.txt", "log"), None);
        assert_eq!(parse_file_name("2023-11-30.log", "log"), None);
        assert_eq!(parse_file_name("2023-11-30.x.log", "log"), None);
        assert_eq!(parse_file_name("2023-13-30.0.log", "log"), None);
        assert_eq!(parse_file_name("notes.0.log", "log"), None);
    }

    #[test]
    fn path_joins_output_dir() {
        let state = RotationState::new(day(2024, 2, 29));
        assert_eq!(
            state.path(Path::new("/var/log/app"), "jsonl"),
            PathBuf::from("/var/log/app/2024-02-29.0.jsonl")
        );
    }
}
