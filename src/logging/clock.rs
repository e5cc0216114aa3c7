use chrono::{DateTime, Datelike, Local, TimeDelta, Timelike};
use parking_lot::Mutex;

/// Source of "now" for event stamping and rollover buckets.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

/// Day bucket, `100 * yyyymmdd`. The two trailing digits leave room for the hour.
pub fn day_bucket(time: &DateTime<Local>) -> i64 {
    let ymd = i64::from(time.year()) * 10_000 + i64::from(time.month()) * 100 + i64::from(time.day());
    100 * ymd
}

pub fn hour_bucket(time: &DateTime<Local>) -> i64 {
    day_bucket(time) + i64::from(time.hour())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, 30, 0).single().unwrap()
    }

    #[test]
    fn buckets() {
        let t = at(2024, 3, 9, 17);
        assert_eq!(day_bucket(&t), 2_024_030_900);
        assert_eq!(hour_bucket(&t), 2_024_030_917);
    }

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::new(at(2024, 3, 9, 10));
        assert_eq!(clock.now(), clock.now());

        clock.advance(TimeDelta::hours(2));
        assert_eq!(hour_bucket(&clock.now()), 2_024_030_912);

        clock.set(at(2024, 3, 10, 0));
        assert_eq!(day_bucket(&clock.now()), 2_024_031_000);
    }
}
