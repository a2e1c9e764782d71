//! crates/club_schedule_core/src/clock.rs
//!
//! The time source used for every deadline comparison.

use std::sync::Mutex;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The current calendar date at the club.
    fn today(&self) -> NaiveDate;
}

/// Reads the system clock and derives dates in the club's UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// A settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// A clock pinned to noon UTC on `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(noon(date))
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(noon(date));
    }

    pub fn advance_days(&self, days: u64) {
        let current = self.now();
        self.set(current.checked_add_days(Days::new(days)).unwrap_or(current));
    }

    fn set(&self, value: DateTime<Utc>) {
        match self.now.lock() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

fn noon(date: NaiveDate) -> DateTime<Utc> {
    let naive = date
        .and_hms_opt(12, 0, 0)
        .unwrap_or_else(|| date.and_time(NaiveTime::default()));
    Utc.from_utc_datetime(&naive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_moves_forward() {
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());

        clock.advance_days(8);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 6, 9).unwrap());

        clock.set_date(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
    }
}
