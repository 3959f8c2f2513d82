//! Usage ledger records.

use super::Metric;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exclusive upper bound on any single usage amount (10^14).
pub const MAX_USAGE_VALUE: Decimal = Decimal::from_parts(0x107A_4000, 0x5AF3, 0, false, 0);

/// One metered event. Records are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub record_id: Uuid,
    pub brand_id: Uuid,
    pub metric: Metric,
    pub value: Decimal,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

impl UsageRecord {
    pub fn new(
        brand_id: Uuid,
        metric: Metric,
        value: Decimal,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            brand_id,
            metric,
            value,
            unit: metric.unit().to_string(),
            timestamp: Utc::now(),
            metadata,
        }
    }
}

/// Filter for listing usage records. `start` is inclusive; `end` is inclusive
/// unless the filter was built with [`ListUsageFilter::within`].
#[derive(Debug, Clone)]
pub struct ListUsageFilter {
    pub metric: Option<Metric>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub end_inclusive: bool,
}

impl ListUsageFilter {
    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            metric: None,
            start,
            end: None,
            end_inclusive: true,
        }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            metric: None,
            start,
            end: Some(end),
            end_inclusive: true,
        }
    }

    /// Half-open range `[start, end)`.
    pub fn within(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            metric: None,
            start,
            end: Some(end),
            end_inclusive: false,
        }
    }

    pub fn for_metric(mut self, metric: Metric) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn matches(&self, record: &UsageRecord) -> bool {
        self.metric.is_none_or(|m| m == record.metric)
            && record.timestamp >= self.start
            && self.end.is_none_or(|end| {
                record.timestamp < end || (self.end_inclusive && record.timestamp == end)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record_at(timestamp: DateTime<Utc>) -> UsageRecord {
        UsageRecord {
            timestamp,
            ..UsageRecord::new(Uuid::new_v4(), Metric::Renders2d, Decimal::ONE, None)
        }
    }

    #[test]
    fn within_excludes_the_end_instant() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let filter = ListUsageFilter::within(start, end);

        assert!(filter.matches(&record_at(start)));
        assert!(filter.matches(&record_at(end - Duration::microseconds(500))));
        assert!(!filter.matches(&record_at(end)));
    }

    #[test]
    fn between_includes_the_end_instant() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        let filter = ListUsageFilter::between(start, end).for_metric(Metric::Renders2d);

        assert!(filter.matches(&record_at(end)));
        assert!(!filter.matches(&record_at(end + Duration::milliseconds(1))));
    }

    #[test]
    fn max_usage_value_is_ten_to_the_fourteenth() {
        assert_eq!(MAX_USAGE_VALUE, Decimal::from(100_000_000_000_000_i64));
    }
}
