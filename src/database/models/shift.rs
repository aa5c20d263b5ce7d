use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::clock::at_time;

/// A named working window agents are assigned to. Frozen from the session's
/// point of view: edits apply to future sessions only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Shift {
    pub id: Uuid,
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub grace_period_minutes: i32,
    pub overtime_allowed: bool,
    pub overtime_requires_approval: bool,
    pub break_policy_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shift {
    /// Shift start on the given work date.
    pub fn starts_at(&self, date: NaiveDate) -> DateTime<Utc> {
        at_time(date, self.start_time)
    }

    /// Shift end on the given work date. An end time at or before the start
    /// time means the shift runs past midnight into the next day.
    pub fn ends_at(&self, date: NaiveDate) -> DateTime<Utc> {
        if self.end_time > self.start_time {
            at_time(date, self.end_time)
        } else {
            let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
            at_time(next, self.end_time)
        }
    }

    /// Last instant a check-in still counts as on time.
    pub fn latest_on_time(&self, date: NaiveDate) -> DateTime<Utc> {
        self.starts_at(date) + chrono::Duration::minutes(self.grace_period_minutes as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(start: &str, end: &str, grace: i32) -> Shift {
        Shift {
            id: Uuid::new_v4(),
            name: "morning".to_string(),
            start_time: start.parse().unwrap(),
            end_time: end.parse().unwrap(),
            grace_period_minutes: grace,
            overtime_allowed: false,
            overtime_requires_approval: false,
            break_policy_id: Uuid::new_v4(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn grace_window_extends_start() {
        let s = shift("09:00:00", "17:00:00", 10);
        let date = "2024-03-11".parse().unwrap();
        assert_eq!(
            s.latest_on_time(date),
            at_time(date, "09:10:00".parse().unwrap())
        );
    }

    #[test]
    fn overnight_shift_ends_next_day() {
        let s = shift("22:00:00", "06:00:00", 0);
        let date: NaiveDate = "2024-03-11".parse().unwrap();
        assert_eq!(
            s.ends_at(date),
            at_time("2024-03-12".parse().unwrap(), "06:00:00".parse().unwrap())
        );
    }
}
