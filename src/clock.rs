use chrono::{Local, NaiveDate, NaiveDateTime};
use std::sync::Arc;

/// Source of "now" for every write path, so settlement and payroll runs can be
/// replayed deterministically in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

#[cfg(test)]
impl FixedClock {
    pub fn at(date: NaiveDate, hour: u32, minute: u32) -> Self {
        FixedClock(date.and_hms_opt(hour, minute, 0).unwrap_or_default())
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_its_date() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        let clock = FixedClock::at(day, 9, 30);
        assert_eq!(clock.today(), day);
        assert_eq!(clock.now().format("%H:%M").to_string(), "09:30");
    }
}
