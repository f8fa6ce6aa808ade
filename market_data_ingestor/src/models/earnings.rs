//! Scheduled earnings announcements and the query used to list them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default number of announcements requested per date.
pub const DEFAULT_EARNINGS_LIMIT: u32 = 100;

/// Hard upper bound the calendar vendor accepts for `limit`.
pub const MAX_EARNINGS_LIMIT: u32 = 50_000;

/// Highest importance rank the calendar vendor assigns.
pub const MAX_IMPORTANCE: u8 = 5;

/// A single earnings announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsEvent {
    pub ticker: String,
    /// Announcement date.
    pub date: NaiveDate,
    /// Scheduled time of day as published by the vendor (e.g. "16:05:00").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_eps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_eps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_revenue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_revenue: Option<f64>,
    /// Vendor importance rank, 0 (lowest) to 5.
    #[serde(default)]
    pub importance: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

/// Parameters for listing the announcements of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsQuery {
    pub date: NaiveDate,
    pub ticker: Option<String>,
    pub importance: Option<u8>,
    pub limit: u32,
}

impl EarningsQuery {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            ticker: None,
            importance: None,
            limit: DEFAULT_EARNINGS_LIMIT,
        }
    }

    /// Sets the limit. Zero falls back to the default, anything above
    /// [`MAX_EARNINGS_LIMIT`] is capped.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = match limit {
            0 => DEFAULT_EARNINGS_LIMIT,
            n => n.min(MAX_EARNINGS_LIMIT),
        };
        self
    }

    pub fn with_ticker(mut self, ticker: Option<String>) -> Self {
        self.ticker = ticker.filter(|t| !t.trim().is_empty());
        self
    }

    /// Ranks outside `0..=5` are ignored rather than forwarded.
    pub fn with_importance(mut self, importance: Option<u8>) -> Self {
        self.importance = importance.filter(|i| *i <= MAX_IMPORTANCE);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 28).unwrap()
    }

    #[test]
    fn limit_is_defaulted_and_capped() {
        assert_eq!(EarningsQuery::new(day()).limit, 100);
        assert_eq!(EarningsQuery::new(day()).with_limit(0).limit, 100);
        assert_eq!(EarningsQuery::new(day()).with_limit(250).limit, 250);
        assert_eq!(EarningsQuery::new(day()).with_limit(80_000).limit, 50_000);
    }

    #[test]
    fn out_of_range_importance_is_dropped() {
        assert_eq!(EarningsQuery::new(day()).with_importance(Some(3)).importance, Some(3));
        assert_eq!(EarningsQuery::new(day()).with_importance(Some(9)).importance, None);
    }

    #[test]
    fn event_deserializes_with_missing_optionals() {
        let json = r#"{"ticker":"AAPL","date":"2025-01-30","importance":5}"#;
        let event: EarningsEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.ticker, "AAPL");
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 1, 30).unwrap());
        assert!(event.estimated_eps.is_none());
        assert_eq!(event.importance, 5);
    }
}
