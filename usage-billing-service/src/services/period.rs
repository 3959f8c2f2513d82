//! UTC calendar-month billing periods.

use crate::models::{BillingPeriodView, ListUsageFilter};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    /// First instant of the month.
    pub start: DateTime<Utc>,
    /// Last millisecond of the month, for display.
    pub end: DateTime<Utc>,
    /// First instant of the following month; the exclusive bound for queries.
    pub next_start: DateTime<Utc>,
    first_day: NaiveDate,
    next_first_day: NaiveDate,
}

impl BillingPeriod {
    /// The month containing `now`.
    pub fn containing(now: DateTime<Utc>) -> Self {
        let first = now.date_naive() - Duration::days(i64::from(now.day0()));
        Self::from_first_day(first)
    }

    /// A given calendar month, or `None` if the month is invalid.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self::from_first_day)
    }

    fn from_first_day(first_day: NaiveDate) -> Self {
        let next_first_day = first_day + Months::new(1);
        let start = first_day.and_time(NaiveTime::MIN).and_utc();
        let next_start = next_first_day.and_time(NaiveTime::MIN).and_utc();
        Self {
            start,
            end: next_start - Duration::milliseconds(1),
            next_start,
            first_day,
            next_first_day,
        }
    }

    /// Usage filter covering exactly this month.
    pub fn usage_filter(&self) -> ListUsageFilter {
        ListUsageFilter::within(self.start, self.next_start)
    }

    pub fn previous(&self) -> Self {
        Self::from_first_day(self.first_day - Months::new(1))
    }

    pub fn days(&self) -> i64 {
        (self.next_first_day - self.first_day).num_days()
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month_number(&self) -> u32 {
        self.first_day.month()
    }

    pub fn view(&self) -> BillingPeriodView {
        BillingPeriodView {
            start: self.start,
            end: self.end,
        }
    }
}
