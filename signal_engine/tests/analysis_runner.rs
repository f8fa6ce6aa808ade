mod common;
use common::{day, engulfing_session, quiet_session, setup_db};

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use market_data_ingestor::{
    models::{
        bar::Bar, bar_series::BarSeries, request_params::BarsRequestParams, timeframe::TimeFrame,
    },
    providers::{DataProvider, ProviderError, StatusSnafu},
};
use signal_engine::{
    decision::Decision,
    models::NewAnalysisRecord,
    runner::{AnalysisError, AnalysisRequest, AnalysisRunner},
    signals::{SignalGenerator, SignalKind},
    sink::{AnalysisSink, SinkError, StoreSnafu},
    store::{SqliteAnalysisStore, StoreError},
};
use snafu::ResultExt;

/// Serves a fixed set of bars for whatever symbol is asked for.
struct StaticBars {
    bars: Vec<Bar>,
    seen: Mutex<Vec<BarsRequestParams>>,
}

impl StaticBars {
    fn new(bars: Vec<Bar>) -> Arc<Self> {
        Arc::new(Self {
            bars,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DataProvider for StaticBars {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        self.seen.lock().unwrap().push(params.clone());
        Ok(params
            .symbols
            .iter()
            .map(|s| BarSeries {
                symbol: s.clone(),
                timeframe: params.timeframe.clone(),
                bars: self.bars.clone(),
            })
            .collect())
    }
}

struct Unreachable;

#[async_trait]
impl DataProvider for Unreachable {
    async fn fetch_bars(&self, _params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        StatusSnafu {
            status: 503u16,
            body: "maintenance",
        }
        .fail()
    }
}

#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<NewAnalysisRecord>>,
}

#[async_trait]
impl AnalysisSink for MemorySink {
    type Output = usize;

    async fn write(&self, record: &NewAnalysisRecord) -> Result<usize, SinkError> {
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(records.len() - 1)
    }
}

/// A store whose connection was poisoned by an earlier panic.
struct PoisonedStore;

#[async_trait]
impl AnalysisSink for PoisonedStore {
    type Output = ();

    async fn write(&self, _record: &NewAnalysisRecord) -> Result<(), SinkError> {
        Err(StoreError::Poisoned).context(StoreSnafu)
    }
}

fn request(ticker: &str) -> AnalysisRequest {
    AnalysisRequest {
        ticker: ticker.to_string(),
        start: day(2025, 1, 27),
        end: day(2025, 1, 27),
        timeframe: TimeFrame::minutes(1),
        requester_id: "orchestrator".to_string(),
    }
}

fn utc_generator() -> SignalGenerator {
    SignalGenerator::new(chrono_tz::UTC)
}

#[tokio::test]
async fn successful_run_is_persisted_and_readable() {
    let (db, _conn) = setup_db();
    let store = SqliteAnalysisStore::open(&db.path).unwrap();
    let provider = StaticBars::new(engulfing_session());
    let runner = AnalysisRunner::new(provider.clone(), store, utc_generator());

    let outcome = runner.run(&request("SPY")).await.expect("run");
    assert_eq!(outcome.decision, Decision::Buy);
    assert_eq!(outcome.bar_count, 5);
    assert_eq!(outcome.win_rate, None);
    assert_eq!(outcome.signals.len(), 1);
    assert_eq!(outcome.signals[0].kind, SignalKind::Call);
    assert_eq!(
        outcome.signals[0].message,
        "14:33 CALL: Bullish Engulfing - Reversal Likely Closing price (11.00)"
    );

    let stored = outcome.stored;
    assert_eq!(stored.ticker, "SPY");
    assert_eq!(stored.bar_count, 5);
    assert_eq!(stored.interval_label, "minute");
    assert_eq!(stored.request.timespan, "minute");
    assert_eq!(stored.request.multiplier, 1);
    assert_eq!(stored.start_timestamp, engulfing_session()[0].timestamp);
    assert_eq!(stored.end_timestamp, engulfing_session()[4].timestamp);

    let latest = runner
        .sink()
        .latest_for("SPY", day(2025, 1, 27))
        .unwrap()
        .expect("stored record");
    assert_eq!(latest.id, stored.id);
    assert_eq!(latest.final_decision, Decision::Buy);

    let seen = provider.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].symbols, vec!["SPY".to_string()]);
}

#[tokio::test]
async fn win_rate_is_reported_when_enabled() {
    let runner = AnalysisRunner::new(
        StaticBars::new(engulfing_session()),
        MemorySink::default(),
        utc_generator(),
    )
    .with_win_rate(true);

    let outcome = runner.run(&request("SPY")).await.unwrap();
    assert_eq!(outcome.win_rate, Some(1.0));
    assert_eq!(outcome.stored, 0);
}

#[tokio::test]
async fn empty_bars_are_no_data() {
    let sink = MemorySink::default();
    let runner = AnalysisRunner::new(StaticBars::new(Vec::new()), sink, utc_generator());

    let err = runner.run(&request("SPY")).await.unwrap_err();
    assert!(matches!(err, AnalysisError::NoData { ref ticker } if ticker == "SPY"));
    assert!(runner.sink().records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn signal_free_run_is_not_persisted() {
    let runner = AnalysisRunner::new(
        StaticBars::new(quiet_session()),
        MemorySink::default(),
        utc_generator(),
    );

    let err = runner.run(&request("QQQ")).await.unwrap_err();
    match err {
        AnalysisError::NoSignal { ticker, bar_count } => {
            assert_eq!(ticker, "QQQ");
            assert_eq!(bar_count, 4);
        }
        other => panic!("expected NoSignal, got {other:?}"),
    }
    assert!(runner.sink().records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn provider_failure_is_data_fetch() {
    let runner = AnalysisRunner::new(Arc::new(Unreachable), MemorySink::default(), utc_generator());

    let err = runner.run(&request("SPY")).await.unwrap_err();
    assert!(matches!(err, AnalysisError::DataFetch { .. }));
    assert!(err.to_string().contains("API returned status 503: maintenance"), "{err}");
}

#[tokio::test]
async fn sink_failure_is_reported_verbatim() {
    let runner =
        AnalysisRunner::new(StaticBars::new(engulfing_session()), PoisonedStore, utc_generator());

    let err = runner.run(&request("SPY")).await.unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Persistence(SinkError::Store {
            source: StoreError::Poisoned,
            ..
        })
    ));
    assert_eq!(
        err.to_string(),
        "failed to persist analysis: Storage error: connection mutex poisoned"
    );
}
