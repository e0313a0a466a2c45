//! Record filtering
//!
//! Restricts a record set to an inclusive date range or to billing months
//! before it is aggregated.
//!
//! # Examples
//!
//! ```
//! use meterbill::filters::RecordFilter;
//! use chrono::NaiveDate;
//!
//! // Readings of January 2024 only
//! let filter = RecordFilter::new()
//!     .with_since(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
//!     .with_until(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
//! ```

use chrono::{Datelike, NaiveDate};
use meterbill_core::types::MeterRecord;

/// Date filter for meter records
///
/// All bounds are optional and inclusive.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordFilter {
    /// Start date filter (inclusive)
    pub since_date: Option<NaiveDate>,
    /// End date filter (inclusive)
    pub until_date: Option<NaiveDate>,
    /// Month range filter
    pub months: Option<MonthFilter>,
}

impl RecordFilter {
    /// Create a new filter with no restrictions
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the start date filter
    pub fn with_since(mut self, date: NaiveDate) -> Self {
        self.since_date = Some(date);
        self
    }

    /// Set the end date filter
    pub fn with_until(mut self, date: NaiveDate) -> Self {
        self.until_date = Some(date);
        self
    }

    /// Keep a single billing month
    pub fn with_month(mut self, year: i32, month: u32) -> Self {
        self.months = Some(MonthFilter::new().with_since(year, month).with_until(year, month));
        self
    }

    /// Whether the filter restricts anything
    pub fn is_empty(&self) -> bool {
        self.since_date.is_none() && self.until_date.is_none() && self.months.is_none()
    }

    /// Check if a record passes the filter
    pub fn matches(&self, record: &MeterRecord) -> bool {
        let date = record.date.inner();

        if self.since_date.is_some_and(|since| *date < since) {
            return false;
        }
        if self.until_date.is_some_and(|until| *date > until) {
            return false;
        }
        if let Some(months) = &self.months {
            return months.matches_date(date);
        }

        true
    }

    /// Keep the records that pass, preserving their order
    pub fn apply(&self, records: Vec<MeterRecord>) -> Vec<MeterRecord> {
        if self.is_empty() {
            return records;
        }
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// Month range filter
///
/// # Example
///
/// ```
/// use meterbill::filters::MonthFilter;
///
/// // First quarter of 2024
/// let filter = MonthFilter::new()
///     .with_since(2024, 1)
///     .with_until(2024, 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthFilter {
    /// Start month (year and month)
    pub since: Option<(i32, u32)>,
    /// End month (year and month)
    pub until: Option<(i32, u32)>,
}

impl MonthFilter {
    /// Create a new month filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the start month
    pub fn with_since(mut self, year: i32, month: u32) -> Self {
        self.since = Some((year, month));
        self
    }

    /// Set the end month
    pub fn with_until(mut self, year: i32, month: u32) -> Self {
        self.until = Some((year, month));
        self
    }

    /// Check if a date falls within the month range
    pub fn matches_date(&self, date: &NaiveDate) -> bool {
        let key = (date.year(), date.month());

        if self.since.is_some_and(|since| key < since) {
            return false;
        }
        if self.until.is_some_and(|until| key > until) {
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterbill_core::types::DailyDate;

    fn record(y: i32, m: u32, d: u32) -> MeterRecord {
        MeterRecord::new(DailyDate::new(NaiveDate::from_ymd_opt(y, m, d).unwrap()))
            .with_value("usage", Some(1.0))
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let filter = RecordFilter::new()
            .with_since(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap())
            .with_until(NaiveDate::from_ymd_opt(2024, 1, 20).unwrap());

        assert!(!filter.matches(&record(2024, 1, 9)));
        assert!(filter.matches(&record(2024, 1, 10)));
        assert!(filter.matches(&record(2024, 1, 20)));
        assert!(!filter.matches(&record(2024, 1, 21)));
    }

    #[test]
    fn test_single_month() {
        let filter = RecordFilter::new().with_month(2024, 2);
        assert!(!filter.matches(&record(2024, 1, 31)));
        assert!(filter.matches(&record(2024, 2, 29)));
        assert!(!filter.matches(&record(2024, 3, 1)));
    }

    #[test]
    fn test_month_range_across_years() {
        let filter = MonthFilter::new().with_since(2023, 11).with_until(2024, 2);
        assert!(filter.matches_date(&NaiveDate::from_ymd_opt(2023, 12, 5).unwrap()));
        assert!(filter.matches_date(&NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()));
        assert!(!filter.matches_date(&NaiveDate::from_ymd_opt(2023, 10, 31).unwrap()));
        assert!(!filter.matches_date(&NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[test]
    fn test_apply_keeps_order() {
        let records = vec![record(2024, 1, 3), record(2024, 2, 1), record(2024, 1, 1)];
        let kept = RecordFilter::new().with_month(2024, 1).apply(records);
        let days: Vec<u32> = kept.iter().map(|r| r.date.inner().day()).collect();
        assert_eq!(days, vec![3, 1]);
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let filter = RecordFilter::new();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(vec![record(1999, 1, 1)]).len(), 1);
    }
}
