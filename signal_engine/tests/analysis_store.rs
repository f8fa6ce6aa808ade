mod common;
use common::{assert_sqlite_pragmas, day, setup_db};

use chrono::{TimeZone, Utc};
use diesel::connection::SimpleConnection;
use signal_engine::{
    decision::Decision,
    models::{NewAnalysisRecord, NewAnalysisRequest, RequestParameters, TECHNICAL_ANALYSIS},
    sink::AnalysisSink,
    store::{SqliteAnalysisStore, StoreError},
};

fn record(ticker: &str, end: chrono::NaiveDate, decision: Decision) -> NewAnalysisRecord {
    NewAnalysisRecord {
        ticker: ticker.to_string(),
        start_timestamp: Utc.with_ymd_and_hms(2025, 1, 27, 14, 30, 0).unwrap(),
        end_timestamp: Utc.with_ymd_and_hms(2025, 1, 27, 20, 55, 0).unwrap(),
        interval_label: "minute".to_string(),
        bar_count: 78,
        analysis_type: TECHNICAL_ANALYSIS.to_string(),
        signals: vec![
            "09:45 CALL: Bullish Engulfing - Reversal Likely Closing price (601.20)".to_string(),
            "10:05 STRADDLE: Doji Pattern - Indecision Closing price (600.95)".to_string(),
        ],
        final_decision: decision,
        request: RequestParameters {
            start: day(2025, 1, 27),
            end,
            timespan: "minute".to_string(),
            multiplier: 5,
        },
        requester_id: "orchestrator".to_string(),
    }
}

#[test]
fn connection_is_tuned() {
    let (_db, mut conn) = setup_db();
    assert_sqlite_pragmas(&mut conn);
}

#[tokio::test]
async fn written_record_reads_back_through_latest() {
    let (db, _conn) = setup_db();
    let store = SqliteAnalysisStore::open(&db.path).expect("open store");

    let new = record("SPY", day(2025, 1, 27), Decision::Buy);
    let stored = store.write(&new).await.expect("write");
    assert!(stored.id > 0);
    assert_eq!(stored.signals, new.signals);
    assert_eq!(stored.final_decision, Decision::Buy);

    let latest = store
        .latest_for("SPY", day(2025, 1, 27))
        .expect("query")
        .expect("record present");
    assert_eq!(latest, stored);
    assert_eq!(latest.start_timestamp, new.start_timestamp);
    assert_eq!(latest.request, new.request);
    assert_eq!(latest.analysis_type, "technical");

    assert!(store.latest_for("SPY", day(2025, 1, 28)).unwrap().is_none());
    assert!(store.latest_for("QQQ", day(2025, 1, 27)).unwrap().is_none());
}

#[test]
fn latest_prefers_the_newest_record() {
    let (db, _conn) = setup_db();
    let store = SqliteAnalysisStore::open(&db.path).unwrap();

    let first = store.insert(&record("AAPL", day(2025, 1, 27), Decision::Sell)).unwrap();
    let second = store.insert(&record("AAPL", day(2025, 1, 27), Decision::Hold)).unwrap();
    assert!(second.id > first.id);

    let latest = store.latest_for("AAPL", day(2025, 1, 27)).unwrap().unwrap();
    assert_eq!(latest.id, second.id);
    assert_eq!(latest.final_decision, Decision::Hold);

    let history = store.history("AAPL", 10).unwrap();
    assert_eq!(
        history.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
}

#[test]
fn stored_records_are_immutable() {
    let (db, mut conn) = setup_db();
    let store = SqliteAnalysisStore::open(&db.path).unwrap();
    let stored = store.insert(&record("SPY", day(2025, 1, 27), Decision::Buy)).unwrap();

    let err = conn
        .batch_execute(&format!(
            "UPDATE technical_signals SET final_decision = 'SELL' WHERE id = {}",
            stored.id
        ))
        .unwrap_err();
    assert!(err.to_string().contains("immutable"), "{err}");

    let latest = store.latest_for("SPY", day(2025, 1, 27)).unwrap().unwrap();
    assert_eq!(latest.final_decision, Decision::Buy);
}

#[test]
fn unknown_decision_is_rejected_by_the_schema() {
    let (_db, mut conn) = setup_db();
    let err = conn
        .batch_execute(
            "INSERT INTO technical_signals (ticker, start_timestamp, end_timestamp, interval_label,
                bar_count, signals, final_decision, request_start, request_end, request_timespan,
                request_multiplier, requester_id, created_at)
             VALUES ('SPY', '2025-01-27T14:30:00.000Z', '2025-01-27T20:55:00.000Z', 'minute',
                1, '[]', 'MAYBE', '2025-01-27', '2025-01-27', 'minute', 5, 'x',
                '2025-01-27T21:00:00.000Z')",
        )
        .unwrap_err();
    assert!(err.to_string().contains("CHECK"), "{err}");
}

#[test]
fn corrupt_signals_column_surfaces_as_column_error() {
    let (db, mut conn) = setup_db();
    conn.batch_execute(
        "INSERT INTO technical_signals (ticker, start_timestamp, end_timestamp, interval_label,
            bar_count, signals, final_decision, request_start, request_end, request_timespan,
            request_multiplier, requester_id, created_at)
         VALUES ('SPY', '2025-01-27T14:30:00.000Z', '2025-01-27T20:55:00.000Z', 'minute',
            1, 'not json', 'HOLD', '2025-01-27', '2025-01-27', 'minute', 5, 'x',
            '2025-01-27T21:00:00.000Z')",
    )
    .unwrap();

    let store = SqliteAnalysisStore::open(&db.path).unwrap();
    let err = store.latest_for("SPY", day(2025, 1, 27)).unwrap_err();
    assert!(matches!(err, StoreError::Column { column: "signals", .. }), "{err}");
}

#[test]
fn request_log_rows_are_recorded() {
    let (db, _conn) = setup_db();
    let store = SqliteAnalysisStore::open(&db.path).unwrap();

    let logged = store
        .record_request(&NewAnalysisRequest {
            ticker: "NVDA".to_string(),
            start_date: day(2025, 1, 24),
            end_date: day(2025, 1, 27),
            requester_id: "orchestrator".to_string(),
        })
        .unwrap();
    assert!(logged.id > 0);
    assert_eq!(logged.ticker, "NVDA");
    assert_eq!(logged.start_date, day(2025, 1, 24));
    assert_eq!(logged.end_date, day(2025, 1, 27));

    let again = store
        .record_request(&NewAnalysisRequest {
            ticker: "NVDA".to_string(),
            start_date: day(2025, 1, 24),
            end_date: day(2025, 1, 27),
            requester_id: "cron".to_string(),
        })
        .unwrap();
    assert!(again.id > logged.id);
}
