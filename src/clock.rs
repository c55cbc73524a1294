use chrono::{Local, NaiveDate};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Source of the calendar day used for date rotation.
pub trait Clock: Send + Sync + fmt::Debug {
    fn today(&self) -> NaiveDate;
}

/// The local calendar day of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same date, so a test can keep one handle and give another
/// to the writer.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use daylog::{Clock, ManualClock};
///
/// let day = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
/// let clock = ManualClock::new(day);
/// let shared = clock.clone();
///
/// clock.advance_days(1);
/// assert_eq!(shared.today(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    date: Arc<Mutex<NaiveDate>>,
}

impl ManualClock {
    pub fn new(date: NaiveDate) -> Self {
        ManualClock {
            date: Arc::new(Mutex::new(date)),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.date.lock().unwrap_or_else(|e| e.into_inner()) = date;
    }

    pub fn advance_days(&self, days: u64) {
        let mut date = self.date.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = date.checked_add_days(chrono::Days::new(days)) {
            *date = next;
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.date.lock().unwrap_or_else(|e| e.into_inner())
    }
}
