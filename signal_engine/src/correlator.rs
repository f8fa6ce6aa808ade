//! Earnings / order-flow correlation.
//!
//! For one earnings date the correlator fetches the event list, then runs one
//! flow lookup per event. Lookups run as separate tasks behind a shared
//! [`Semaphore`], so at most `max_concurrency` are in flight. Each task
//! reports `(input index, result)` over an mpsc channel to a single collector,
//! which restores input order once every task has finished.
//!
//! A failed lookup never fails the batch: it becomes an `ERROR` row. Only the
//! initial events fetch is terminal.

use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;
use market_data_ingestor::{
    models::{
        earnings::{DEFAULT_EARNINGS_LIMIT, EarningsEvent, EarningsQuery},
        flow::{FlowAnalysis, FlowDirection, FlowQuery},
    },
    providers::{EarningsProvider, FlowProvider, ProviderError},
};
use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};

use crate::tz::session_before;

pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_LARGE_TRADE_THRESHOLD: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    #[error("failed to fetch earnings for {date}: {source}")]
    EventsFetch {
        date: NaiveDate,
        #[source]
        source: ProviderError,
    },
}

/// Why a single flow lookup failed. Recorded on the result row, never raised.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("flow lookup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("flow lookup for {ticker} timed out after {}s", .after.as_secs_f64())]
    TimedOut { ticker: String, after: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationRequest {
    pub event_date: NaiveDate,
    /// Session to analyse; defaults to the weekday before `event_date`.
    pub analysis_date: Option<NaiveDate>,
    pub large_trade_threshold: f64,
    pub limit: u32,
}

impl CorrelationRequest {
    pub fn new(event_date: NaiveDate) -> Self {
        Self {
            event_date,
            analysis_date: None,
            large_trade_threshold: DEFAULT_LARGE_TRADE_THRESHOLD,
            limit: DEFAULT_EARNINGS_LIMIT,
        }
    }

    pub fn with_analysis_date(mut self, date: Option<NaiveDate>) -> Self {
        self.analysis_date = date;
        self
    }

    /// Non-positive or non-finite thresholds fall back to the default.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.large_trade_threshold = if threshold.is_finite() && threshold > 0.0 {
            threshold
        } else {
            DEFAULT_LARGE_TRADE_THRESHOLD
        };
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn resolved_analysis_date(&self) -> NaiveDate {
        self.analysis_date
            .unwrap_or_else(|| session_before(self.event_date))
    }
}

/// One earnings event joined with the flow seen in the preceding session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowCorrelationResult {
    pub ticker: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_eps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_eps: Option<f64>,
    pub importance: u8,
    #[serde(rename = "big_money_direction")]
    pub direction: FlowDirection,
    #[serde(rename = "net_big_money_flow", skip_serializing_if = "Option::is_none")]
    pub net_flow: Option<f64>,
    #[serde(rename = "large_trades_count", skip_serializing_if = "Option::is_none")]
    pub large_trade_count: Option<u64>,
    #[serde(rename = "buyer_initiated_volume", skip_serializing_if = "Option::is_none")]
    pub buyer_volume: Option<f64>,
    #[serde(rename = "seller_initiated_volume", skip_serializing_if = "Option::is_none")]
    pub seller_volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FlowCorrelationResult {
    fn pending(event: &EarningsEvent) -> Self {
        Self {
            ticker: event.ticker.clone(),
            date: event.date,
            time: event.time.clone(),
            estimated_eps: event.estimated_eps,
            actual_eps: event.actual_eps,
            importance: event.importance,
            direction: FlowDirection::Error,
            net_flow: None,
            large_trade_count: None,
            buyer_volume: None,
            seller_volume: None,
            analysis_date: None,
            error: None,
        }
    }

    fn failed(event: &EarningsEvent, message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::pending(event)
        }
    }

    fn from_lookup(
        event: &EarningsEvent,
        analysis_date: NaiveDate,
        outcome: Result<FlowAnalysis, LookupError>,
    ) -> Self {
        match outcome {
            Ok(analysis) => {
                let metrics = &analysis.result;
                let direction = if analysis.is_empty() {
                    FlowDirection::NoData
                } else {
                    metrics.direction
                };
                Self {
                    direction,
                    net_flow: Some(metrics.net_big_money_flow),
                    large_trade_count: Some(metrics.large_trades_count),
                    buyer_volume: Some(metrics.buyer_initiated_volume),
                    seller_volume: Some(metrics.seller_initiated_volume),
                    analysis_date: Some(analysis.session_date().unwrap_or(analysis_date)),
                    ..Self::pending(event)
                }
            }
            Err(err) => Self::failed(event, err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorrelationSummary {
    pub bullish_count: usize,
    pub bearish_count: usize,
    pub neutral_count: usize,
    /// `ERROR` and `NO_DATA` rows together.
    pub error_count: usize,
    pub total_analyzed: usize,
}

impl CorrelationSummary {
    pub fn from_results(results: &[FlowCorrelationResult]) -> Self {
        let mut summary = Self {
            total_analyzed: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.direction {
                FlowDirection::BuyingPressure => summary.bullish_count += 1,
                FlowDirection::SellingPressure => summary.bearish_count += 1,
                FlowDirection::Neutral => summary.neutral_count += 1,
                FlowDirection::NoData | FlowDirection::Error => summary.error_count += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationReport {
    pub date: NaiveDate,
    pub total_tickers: usize,
    pub results: Vec<FlowCorrelationResult>,
    pub summary: CorrelationSummary,
}

impl CorrelationReport {
    fn new(date: NaiveDate, results: Vec<FlowCorrelationResult>) -> Self {
        Self {
            date,
            total_tickers: results.len(),
            summary: CorrelationSummary::from_results(&results),
            results,
        }
    }
}

pub struct BoundedCorrelator {
    events: Arc<dyn EarningsProvider>,
    flow: Arc<dyn FlowProvider>,
    max_concurrency: usize,
    lookup_timeout: Option<Duration>,
}

impl BoundedCorrelator {
    pub fn new(events: Arc<dyn EarningsProvider>, flow: Arc<dyn FlowProvider>) -> Self {
        Self {
            events,
            flow,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            lookup_timeout: None,
        }
    }

    /// Zero is treated as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub async fn correlate(
        &self,
        request: &CorrelationRequest,
    ) -> Result<CorrelationReport, CorrelationError> {
        let query = EarningsQuery::new(request.event_date).with_limit(request.limit);
        let events = self
            .events
            .fetch_earnings(&query)
            .await
            .map_err(|source| CorrelationError::EventsFetch {
                date: request.event_date,
                source,
            })?;

        if events.is_empty() {
            info!(date = %request.event_date, "no earnings events, nothing to correlate");
            return Ok(CorrelationReport::new(request.event_date, Vec::new()));
        }

        let analysis_date = request.resolved_analysis_date();
        info!(
            date = %request.event_date,
            analysis_date = %analysis_date,
            events = events.len(),
            max_concurrency = self.max_concurrency,
            "correlating earnings with order flow"
        );

        let results = self
            .fan_out(&events, analysis_date, request.large_trade_threshold)
            .await;
        let report = CorrelationReport::new(request.event_date, results);

        info!(
            date = %request.event_date,
            bullish = report.summary.bullish_count,
            bearish = report.summary.bearish_count,
            neutral = report.summary.neutral_count,
            errors = report.summary.error_count,
            "correlation complete"
        );
        Ok(report)
    }

    async fn fan_out(
        &self,
        events: &[EarningsEvent],
        analysis_date: NaiveDate,
        threshold: f64,
    ) -> Vec<FlowCorrelationResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        // Sized so no sender ever waits on the collector.
        let (tx, mut rx) = mpsc::channel::<(usize, FlowCorrelationResult)>(events.len());
        let mut handles = Vec::with_capacity(events.len());

        for (index, event) in events.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let flow = Arc::clone(&self.flow);
            let tx = tx.clone();
            let timeout = self.lookup_timeout;
            let query = FlowQuery {
                ticker: event.ticker.clone(),
                analysis_date,
                large_trade_threshold: threshold,
            };

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let outcome = lookup(flow.as_ref(), &query, timeout).await;
                if let Err(err) = &outcome {
                    warn!(ticker = %query.ticker, error = %err, "flow lookup failed");
                }
                let result = FlowCorrelationResult::from_lookup(&event, analysis_date, outcome);
                let _ = tx.send((index, result)).await;
            }));
        }
        drop(tx);

        let mut slots: Vec<Option<FlowCorrelationResult>> = vec![None; events.len()];
        while let Some((index, result)) = rx.recv().await {
            slots[index] = Some(result);
        }
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "flow lookup task did not complete");
            }
        }

        slots
            .into_iter()
            .zip(events)
            .map(|(slot, event)| {
                slot.unwrap_or_else(|| {
                    FlowCorrelationResult::failed(
                        event,
                        "flow lookup ended without reporting a result".to_string(),
                    )
                })
            })
            .collect()
    }
}

async fn lookup(
    flow: &dyn FlowProvider,
    query: &FlowQuery,
    timeout: Option<Duration>,
) -> Result<FlowAnalysis, LookupError> {
    debug!(ticker = %query.ticker, date = %query.analysis_date, "flow lookup");
    match timeout {
        Some(after) => tokio::time::timeout(after, flow.fetch_flow(query))
            .await
            .map_err(|_| LookupError::TimedOut {
                ticker: query.ticker.clone(),
                after,
            })?
            .map_err(LookupError::from),
        None => flow.fetch_flow(query).await.map_err(LookupError::from),
    }
}
