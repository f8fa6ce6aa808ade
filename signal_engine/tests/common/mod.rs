#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use market_data_ingestor::models::{bar::Bar, earnings::EarningsEvent};
use signal_engine::db::{connection, migrate};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_sqlite(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal");

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Minute bar `i` minutes after 14:30 UTC on 2025-01-27.
pub fn bar(i: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    Bar {
        timestamp: Utc.with_ymd_and_hms(2025, 1, 27, 14, 30, 0).unwrap() + Duration::minutes(i),
        open,
        high,
        low,
        close,
        volume,
        trade_count: None,
        vwap: None,
    }
}

/// Five bars whose only signal is a bullish engulfing CALL on bar 3,
/// which the next bar confirms.
pub fn engulfing_session() -> Vec<Bar> {
    vec![
        bar(0, 10.0, 10.6, 9.9, 10.5, 1_000.0),
        bar(1, 10.5, 11.0, 10.4, 10.9, 1_100.0),
        bar(2, 10.9, 11.0, 10.3, 10.4, 1_200.0),
        bar(3, 10.3, 11.2, 10.2, 11.0, 1_300.0),
        bar(4, 11.0, 11.3, 10.9, 11.2, 1_000.0),
    ]
}

/// Four trending bars that never trigger any rule.
pub fn quiet_session() -> Vec<Bar> {
    (0..4)
        .map(|i| {
            let open = 10.0 + i as f64;
            bar(i, open, open + 1.2, open - 0.1, open + 1.0, 1_000.0)
        })
        .collect()
}

pub fn earnings_event(ticker: &str, date: NaiveDate) -> EarningsEvent {
    EarningsEvent {
        ticker: ticker.to_string(),
        date,
        time: None,
        estimated_eps: Some(1.0),
        actual_eps: None,
        estimated_revenue: None,
        actual_revenue: None,
        importance: 2,
        updated: None,
    }
}
