//! Orchestrates one analysis: fetch bars, enrich, raise signals, decide, persist.

use std::sync::Arc;

use chrono::NaiveDate;
use market_data_ingestor::{
    models::{
        request_params::{BarsRequestParams, ProviderParams},
        timeframe::TimeFrame,
    },
    providers::{DataProvider, ProviderError, polygon_rest::PolygonAggsParams},
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    decision::{Decision, decide},
    enrich::enrich,
    models::{NewAnalysisRecord, RequestParameters, TECHNICAL_ANALYSIS},
    signals::{Signal, SignalGenerator, win_rate},
    sink::{AnalysisSink, SinkError},
};

/// One (ticker, date range, bar interval) analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub timeframe: TimeFrame,
    pub requester_id: String,
}

impl AnalysisRequest {
    /// Adjusted aggregates in ascending order.
    pub fn bars_params(&self) -> BarsRequestParams {
        let mut params =
            BarsRequestParams::single(self.ticker.clone(), self.timeframe.clone(), self.start, self.end);
        params.provider_specific = ProviderParams::Polygon(PolygonAggsParams::default());
        params
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("failed to fetch bars for {ticker}: {source}")]
    DataFetch {
        ticker: String,
        #[source]
        source: ProviderError,
    },

    #[error("no bars returned for {ticker}")]
    NoData { ticker: String },

    /// A run without signals is not persisted.
    #[error("no signals generated for {ticker} over {bar_count} bars")]
    NoSignal { ticker: String, bar_count: usize },

    #[error("failed to persist analysis: {0}")]
    Persistence(#[source] SinkError),
}

/// Result of a successful run; `stored` is whatever the sink returns.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome<T> {
    pub decision: Decision,
    pub signals: Vec<Signal>,
    pub bar_count: usize,
    /// Present only when win-rate evaluation is enabled.
    pub win_rate: Option<f64>,
    pub stored: T,
}

pub struct AnalysisRunner<S> {
    provider: Arc<dyn DataProvider>,
    sink: S,
    generator: SignalGenerator,
    evaluate_win_rate: bool,
}

impl<S: AnalysisSink> AnalysisRunner<S> {
    pub fn new(provider: Arc<dyn DataProvider>, sink: S, generator: SignalGenerator) -> Self {
        Self {
            provider,
            sink,
            generator,
            evaluate_win_rate: false,
        }
    }

    pub fn with_win_rate(mut self, enabled: bool) -> Self {
        self.evaluate_win_rate = enabled;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome<S::Output>, AnalysisError> {
        let ticker = request.ticker.clone();
        info!(
            ticker = %ticker,
            start = %request.start,
            end = %request.end,
            timeframe = %request.timeframe,
            "starting analysis"
        );

        let series = self
            .provider
            .fetch_bars(request.bars_params())
            .await
            .map_err(|source| AnalysisError::DataFetch {
                ticker: ticker.clone(),
                source,
            })?;

        let bars = series
            .into_iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(&ticker))
            .map(|s| s.bars)
            .unwrap_or_default();

        let enriched = enrich(bars);
        let (Some(first), Some(last)) = (enriched.first(), enriched.last()) else {
            return Err(AnalysisError::NoData { ticker });
        };
        debug!(ticker = %ticker, bars = enriched.len(), "enriched bars");

        let signals = self.generator.generate(&enriched);
        if signals.is_empty() {
            return Err(AnalysisError::NoSignal {
                ticker,
                bar_count: enriched.len(),
            });
        }

        let decision = decide(&signals);
        let rate = self.evaluate_win_rate.then(|| win_rate(&enriched, &signals));
        if let Some(rate) = rate {
            info!(ticker = %ticker, win_rate = rate, "signal win rate");
        }

        let record = NewAnalysisRecord {
            ticker: ticker.clone(),
            start_timestamp: first.bar.timestamp,
            end_timestamp: last.bar.timestamp,
            interval_label: request.timeframe.unit.as_str().to_string(),
            bar_count: enriched.len(),
            analysis_type: TECHNICAL_ANALYSIS.to_string(),
            signals: signals.iter().map(|s| s.message.clone()).collect(),
            final_decision: decision,
            request: RequestParameters {
                start: request.start,
                end: request.end,
                timespan: request.timeframe.unit.as_str().to_string(),
                multiplier: request.timeframe.amount,
            },
            requester_id: request.requester_id.clone(),
        };

        let stored = self
            .sink
            .write(&record)
            .await
            .map_err(AnalysisError::Persistence)?;

        info!(
            ticker = %ticker,
            decision = %decision,
            signals = signals.len(),
            bars = enriched.len(),
            "analysis stored"
        );

        Ok(AnalysisOutcome {
            decision,
            signals,
            bar_count: enriched.len(),
            win_rate: rate,
            stored,
        })
    }
}
