use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

/// Month to report on; the current UTC month when omitted.
#[derive(Debug, Deserialize, Validate)]
pub struct MonthlyReportParams {
    #[validate(range(min = 2000, max = 9999))]
    pub year: Option<i32>,

    #[validate(range(min = 1, max = 12, message = "Month must be between 1 and 12"))]
    pub month: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DateRangeParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}
