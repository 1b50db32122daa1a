//! Learning-day calendar
//!
//! A learning day starts at `day_boundary_hour` local time rather than at midnight,
//! so a review at 01:30 still belongs to the previous day. Every piece of interval
//! math that touches calendar days goes through [`LearningCalendar`].

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::config::SchedulerConfig;

const MS_PER_MINUTE: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearningCalendar {
    boundary_hour: u32,
    utc_offset_minutes: i32,
}

impl Default for LearningCalendar {
    fn default() -> Self {
        Self::new(4, 0)
    }
}

impl LearningCalendar {
    pub fn new(boundary_hour: u32, utc_offset_minutes: i32) -> Self {
        Self {
            boundary_hour: boundary_hour.min(23),
            utc_offset_minutes: utc_offset_minutes.clamp(-14 * 60, 14 * 60),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.day_boundary_hour, config.utc_offset_minutes)
    }

    pub fn boundary_hour(&self) -> u32 {
        self.boundary_hour
    }

    /// Local wall-clock time; timestamps outside chrono's range clamp to its bounds
    fn local_naive(&self, ts_ms: i64) -> NaiveDateTime {
        let utc = DateTime::<Utc>::from_timestamp_millis(ts_ms).unwrap_or(if ts_ms < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        });
        shift_saturating(
            utc.naive_utc(),
            Duration::minutes(self.utc_offset_minutes as i64),
        )
    }

    /// Logical date a timestamp belongs to
    pub fn learning_day(&self, ts_ms: i64) -> NaiveDate {
        shift_saturating(
            self.local_naive(ts_ms),
            -Duration::hours(self.boundary_hour as i64),
        )
        .date()
    }

    /// Epoch milliseconds at which `date` begins
    pub fn day_start_ms(&self, date: NaiveDate) -> i64 {
        let local = date
            .and_hms_opt(self.boundary_hour, 0, 0)
            .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));
        shift_saturating(local, -Duration::minutes(self.utc_offset_minutes as i64))
            .and_utc()
            .timestamp_millis()
    }

    /// Start of the learning day `days` after the one containing `now_ms`
    pub fn due_after_days(&self, now_ms: i64, days: i32) -> i64 {
        let today = self.learning_day(now_ms);
        let target = today
            .checked_add_days(Days::new(days.max(0) as u64))
            .unwrap_or(today);
        self.day_start_ms(target)
    }

    /// Sub-day offset used for lapses and same-session repeats
    pub fn due_after_minutes(&self, now_ms: i64, minutes: i64) -> i64 {
        now_ms.saturating_add(minutes.max(0).saturating_mul(MS_PER_MINUTE))
    }

    /// Whole learning days between two timestamps (0 when `to` is not later)
    pub fn days_between(&self, from_ms: i64, to_ms: i64) -> i64 {
        let from = self.learning_day(from_ms);
        let to = self.learning_day(to_ms);
        (to - from).num_days().max(0)
    }
}

fn shift_saturating(at: NaiveDateTime, by: Duration) -> NaiveDateTime {
    at.checked_add_signed(by).unwrap_or(if by < Duration::zero() {
        NaiveDateTime::MIN
    } else {
        NaiveDateTime::MAX
    })
}
