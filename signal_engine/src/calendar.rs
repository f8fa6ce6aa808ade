//! Multi-day earnings calendar.

use std::{collections::HashSet, sync::Arc};

use chrono::NaiveDate;
use market_data_ingestor::{
    models::earnings::{EarningsEvent, EarningsQuery, MAX_IMPORTANCE},
    providers::EarningsProvider,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Longest span, in days between `start` and `end`, a single range fetch may cover.
pub const MAX_RANGE_DAYS: i64 = 90;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("end date {end} is before start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("date range cannot exceed {MAX_RANGE_DAYS} days, got {days}")]
    RangeTooLong { days: i64 },

    #[error("importance must be between 0 and {MAX_IMPORTANCE}, got {0}")]
    InvalidImportance(u8),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarRange {
    pub events: Vec<EarningsEvent>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Calendar days covered, both ends inclusive.
    pub range_days: i64,
}

pub struct EarningsCalendar {
    provider: Arc<dyn EarningsProvider>,
}

impl EarningsCalendar {
    pub fn new(provider: Arc<dyn EarningsProvider>) -> Self {
        Self { provider }
    }

    /// Fetches every date in `start..=end`. A failing date is logged and
    /// skipped; events repeated across dates are kept once per (ticker, date).
    pub async fn fetch_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        ticker: Option<&str>,
        importance: Option<u8>,
        limit: u32,
    ) -> Result<CalendarRange, CalendarError> {
        if end < start {
            return Err(CalendarError::InvalidRange { start, end });
        }
        let days = (end - start).num_days();
        if days > MAX_RANGE_DAYS {
            return Err(CalendarError::RangeTooLong { days });
        }
        if let Some(rank) = importance.filter(|rank| *rank > MAX_IMPORTANCE) {
            return Err(CalendarError::InvalidImportance(rank));
        }

        let mut events = Vec::new();
        let mut seen = HashSet::new();
        let mut failed_days = 0usize;

        for date in start.iter_days().take_while(|d| *d <= end) {
            let query = EarningsQuery::new(date)
                .with_limit(limit)
                .with_ticker(ticker.map(str::to_string))
                .with_importance(importance);

            match self.provider.fetch_earnings(&query).await {
                Ok(day) => {
                    debug!(date = %date, count = day.len(), "fetched earnings");
                    events.extend(
                        day.into_iter()
                            .filter(|e| seen.insert((e.ticker.clone(), e.date))),
                    );
                }
                Err(err) => {
                    failed_days += 1;
                    warn!(date = %date, error = %err, "skipping earnings date");
                }
            }
        }

        info!(
            start = %start,
            end = %end,
            events = events.len(),
            failed_days,
            "earnings range fetched"
        );

        Ok(CalendarRange {
            events,
            start,
            end,
            range_days: days + 1,
        })
    }
}
