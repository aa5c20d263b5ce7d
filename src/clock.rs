use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// Wall-clock source injected into anything that needs "now".
///
/// Attendance math keys sessions by calendar date and compares timestamps
/// against shift windows, so every component reads time through this trait
/// instead of calling `Utc::now()` directly. Tests swap in [`ManualClock`].
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day a session created "now" belongs to.
    fn work_date(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Parse "2024-03-11T09:07:00Z"-style timestamps; panics on bad input
    /// since this only runs in tests and fixtures.
    pub fn at(rfc3339: &str) -> Self {
        let ts = DateTime::parse_from_rfc3339(rfc3339)
            .unwrap_or_else(|e| panic!("bad manual clock timestamp {rfc3339}: {e}"))
            .with_timezone(&Utc);
        Self::new(ts)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.advance(Duration::minutes(minutes));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Combine a calendar date with a time-of-day into a UTC instant.
pub fn at_time(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

/// Whole minutes between two instants, truncated toward zero.
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at("2024-03-11T09:00:00Z");
        clock.advance_minutes(25);
        assert_eq!(clock.now().to_rfc3339(), "2024-03-11T09:25:00+00:00");
        assert_eq!(clock.work_date().to_string(), "2024-03-11");
    }

    #[test]
    fn minutes_truncate_toward_zero() {
        let a = DateTime::parse_from_rfc3339("2024-03-11T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = a + Duration::seconds(179);
        assert_eq!(minutes_between(a, b), 2);
    }
}
