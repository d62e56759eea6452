use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Source of "now" in epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock for simulations and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::Relaxed);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::Relaxed)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

fn to_datetime(ts_ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts_ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Midnight (UTC) of the day containing `now_ms`.
pub fn start_of_day(now_ms: i64) -> i64 {
    let date = to_datetime(now_ms).date_naive();
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Monday 00:00 (UTC) of the week containing `now_ms`.
pub fn start_of_week(now_ms: i64) -> i64 {
    let date = to_datetime(now_ms).date_naive();
    let days_from_monday = i64::from(date.weekday().num_days_from_monday());
    let monday = date - Duration::days(days_from_monday);
    monday.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2026-10-14 is a Wednesday
    const WED_NOON: i64 = 1_791_979_200_000;

    #[test]
    fn day_and_week_boundaries() {
        let day = start_of_day(WED_NOON);
        assert_eq!(WED_NOON - day, 12 * 60 * 60 * 1000);
        let week = start_of_week(WED_NOON);
        assert_eq!(day - week, 2 * DAY_MS);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance(DAY_MS);
        assert_eq!(clock.now_ms(), 1_000 + DAY_MS);
    }
}
