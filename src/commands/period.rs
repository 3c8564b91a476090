use crate::error::{KebunError, KebunResult};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn month(year: i32, month: u32) -> Option<DateRange> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(DateRange {
            start,
            end: next - Duration::days(1),
        })
    }

    pub fn years(first: i32, last: i32) -> Option<DateRange> {
        Some(DateRange {
            start: NaiveDate::from_ymd_opt(first, 1, 1)?,
            end: NaiveDate::from_ymd_opt(last, 12, 31)?,
        })
    }
}

/// Time filter as sent by list and report screens. `time_period` defaults to
/// `this-month`; `all` (or `all-time`) disables the filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodQuery {
    pub time_period: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

impl PeriodQuery {
    #[cfg(test)]
    pub fn named(period: &str) -> Self {
        PeriodQuery {
            time_period: Some(period.to_string()),
            ..PeriodQuery::default()
        }
    }

    pub fn resolve(&self, today: NaiveDate) -> KebunResult<Option<DateRange>> {
        let period = self.time_period.as_deref().unwrap_or("this-month");
        let invalid = || KebunError::Validation(format!("Invalid date range for period '{}'", period));

        let range = match period {
            "all" | "all-time" => return Ok(None),
            "today" => DateRange {
                start: today,
                end: today,
            },
            "this-week" => {
                let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
                DateRange {
                    start,
                    end: start + Duration::days(6),
                }
            }
            "this-month" => DateRange::month(today.year(), today.month()).ok_or_else(invalid)?,
            "last-month" => {
                let (y, m) = if today.month() == 1 {
                    (today.year() - 1, 12)
                } else {
                    (today.year(), today.month() - 1)
                };
                DateRange::month(y, m).ok_or_else(invalid)?
            }
            "this-year" => DateRange::years(today.year(), today.year()).ok_or_else(invalid)?,
            "specific-month" => DateRange::month(
                self.year.unwrap_or(today.year()),
                self.month.unwrap_or(today.month()),
            )
            .ok_or_else(invalid)?,
            "periodic-years" => DateRange::years(
                self.start_year.unwrap_or(today.year()),
                self.end_year.unwrap_or(today.year()),
            )
            .ok_or_else(invalid)?,
            "custom" => match (self.start_date, self.end_date) {
                (Some(start), Some(end)) => DateRange { start, end },
                _ => {
                    return Err(KebunError::Validation(
                        "custom period needs start_date and end_date".into(),
                    ))
                }
            },
            other => {
                return Err(KebunError::Validation(format!(
                    "Unknown time period '{}'",
                    other
                )))
            }
        };

        if range.start > range.end {
            return Err(invalid());
        }
        Ok(Some(range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn default_is_current_month() {
        let range = PeriodQuery::default().resolve(d(2024, 2, 14)).unwrap().unwrap();
        assert_eq!(range.start, d(2024, 2, 1));
        assert_eq!(range.end, d(2024, 2, 29));
    }

    #[test]
    fn last_month_wraps_the_year() {
        let range = PeriodQuery::named("last-month")
            .resolve(d(2025, 1, 5))
            .unwrap()
            .unwrap();
        assert_eq!(range, DateRange::month(2024, 12).unwrap());
    }

    #[test]
    fn this_week_starts_monday() {
        // 2025-01-22 is a Wednesday
        let range = PeriodQuery::named("this-week")
            .resolve(d(2025, 1, 22))
            .unwrap()
            .unwrap();
        assert_eq!(range.start, d(2025, 1, 20));
        assert_eq!(range.end, d(2025, 1, 26));
    }

    #[test]
    fn periodic_years_spans_whole_years() {
        let q = PeriodQuery {
            time_period: Some("periodic-years".into()),
            start_year: Some(2022),
            end_year: Some(2024),
            ..PeriodQuery::default()
        };
        let range = q.resolve(d(2025, 6, 1)).unwrap().unwrap();
        assert_eq!(range.start, d(2022, 1, 1));
        assert_eq!(range.end, d(2024, 12, 31));
    }

    #[test]
    fn all_disables_filter_and_bad_input_is_rejected() {
        assert_eq!(PeriodQuery::named("all").resolve(d(2025, 1, 1)).unwrap(), None);
        assert!(PeriodQuery::named("custom").resolve(d(2025, 1, 1)).is_err());
        assert!(PeriodQuery::named("fortnight").resolve(d(2025, 1, 1)).is_err());

        let backwards = PeriodQuery {
            time_period: Some("custom".into()),
            start_date: Some(d(2025, 3, 1)),
            end_date: Some(d(2025, 2, 1)),
            ..PeriodQuery::default()
        };
        assert!(backwards.resolve(d(2025, 3, 10)).is_err());

        let bad_month = PeriodQuery {
            time_period: Some("specific-month".into()),
            month: Some(13),
            year: Some(2025),
            ..PeriodQuery::default()
        };
        assert!(bad_month.resolve(d(2025, 3, 10)).is_err());
    }
}
