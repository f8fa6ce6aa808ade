//! SQLite-backed analysis store.
//!
//! Records are insert-only: a database trigger rejects updates to
//! `technical_signals`, so a stored analysis can be audited later exactly as
//! it was produced.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use snafu::ResultExt;

use crate::{
    db::{connection::connect_sqlite, migrate},
    decision::Decision,
    models::{
        AnalysisRecord, AnalysisRequestLog, NewAnalysisRecord, NewAnalysisRequest,
        RequestParameters,
    },
    schema::{analysis_requests, technical_signals},
    sink::{AnalysisSink, SinkError, StoreSnafu},
    tz,
};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Diesel(#[from] diesel::result::Error),

    #[error("failed to encode signals: {0}")]
    Encode(#[from] serde_json::Error),

    /// A stored value could not be mapped back to the domain type, or a
    /// domain value does not fit its column.
    #[error("bad value in column {column}: {message}")]
    Column { column: &'static str, message: String },

    #[error("connection mutex poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Insertable, Debug)]
#[diesel(table_name = technical_signals)]
struct NewSignalRow<'a> {
    ticker: &'a str,
    start_timestamp: String, // RFC3339 UTC
    end_timestamp: String,   // RFC3339 UTC
    interval_label: &'a str,
    bar_count: i32,
    analysis_type: &'a str,
    signals: String, // JSON array of messages
    final_decision: &'a str,
    request_start: String,
    request_end: String,
    request_timespan: &'a str,
    request_multiplier: i32,
    requester_id: &'a str,
    created_at: String,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = technical_signals)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct SignalRow {
    id: i32,
    ticker: String,
    start_timestamp: String,
    end_timestamp: String,
    interval_label: String,
    bar_count: i32,
    analysis_type: String,
    signals: String,
    final_decision: String,
    request_start: String,
    request_end: String,
    request_timespan: String,
    request_multiplier: i32,
    requester_id: String,
    created_at: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = analysis_requests)]
struct NewRequestRow<'a> {
    ticker: &'a str,
    start_date: String,
    end_date: String,
    requester_id: &'a str,
    created_at: String,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = analysis_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct RequestRow {
    id: i32,
    ticker: String,
    start_date: String,
    end_date: String,
    requester_id: String,
    created_at: String,
}

fn column_err(column: &'static str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Column {
        column,
        message: err.to_string(),
    }
}

fn date_str(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn parse_date(column: &'static str, s: &str) -> StoreResult<NaiveDate> {
    tz::parse_date(s).map_err(|e| column_err(column, e))
}

fn parse_ts(column: &'static str, s: &str) -> StoreResult<chrono::DateTime<Utc>> {
    tz::parse_ts_to_utc(s).map_err(|e| column_err(column, e))
}

impl TryFrom<SignalRow> for AnalysisRecord {
    type Error = StoreError;

    fn try_from(row: SignalRow) -> Result<Self, Self::Error> {
        Ok(AnalysisRecord {
            id: i64::from(row.id),
            start_timestamp: parse_ts("start_timestamp", &row.start_timestamp)?,
            end_timestamp: parse_ts("end_timestamp", &row.end_timestamp)?,
            bar_count: usize::try_from(row.bar_count).map_err(|e| column_err("bar_count", e))?,
            signals: serde_json::from_str(&row.signals).map_err(|e| column_err("signals", e))?,
            final_decision: row
                .final_decision
                .parse::<Decision>()
                .map_err(|e| column_err("final_decision", e))?,
            request: RequestParameters {
                start: parse_date("request_start", &row.request_start)?,
                end: parse_date("request_end", &row.request_end)?,
                timespan: row.request_timespan,
                multiplier: u32::try_from(row.request_multiplier)
                    .map_err(|e| column_err("request_multiplier", e))?,
            },
            created_at: parse_ts("created_at", &row.created_at)?,
            ticker: row.ticker,
            interval_label: row.interval_label,
            analysis_type: row.analysis_type,
            requester_id: row.requester_id,
        })
    }
}

impl TryFrom<RequestRow> for AnalysisRequestLog {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(AnalysisRequestLog {
            id: i64::from(row.id),
            start_date: parse_date("start_date", &row.start_date)?,
            end_date: parse_date("end_date", &row.end_date)?,
            created_at: parse_ts("created_at", &row.created_at)?,
            ticker: row.ticker,
            requester_id: row.requester_id,
        })
    }
}

/// Analysis store over a single SQLite connection.
pub struct SqliteAnalysisStore {
    conn: Mutex<SqliteConnection>,
}

impl SqliteAnalysisStore {
    /// Applies pending migrations, then opens a tuned connection.
    pub fn open(database_url: &str) -> anyhow::Result<Self> {
        migrate::run_sqlite(database_url)?;
        Ok(Self::from_connection(connect_sqlite(database_url)?))
    }

    /// Wraps an existing connection whose schema is already migrated.
    pub fn from_connection(conn: SqliteConnection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, SqliteConnection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn insert(&self, record: &NewAnalysisRecord) -> StoreResult<AnalysisRecord> {
        let row = NewSignalRow {
            ticker: &record.ticker,
            start_timestamp: tz::to_rfc3339_millis(record.start_timestamp),
            end_timestamp: tz::to_rfc3339_millis(record.end_timestamp),
            interval_label: &record.interval_label,
            bar_count: i32::try_from(record.bar_count).map_err(|e| column_err("bar_count", e))?,
            analysis_type: &record.analysis_type,
            signals: serde_json::to_string(&record.signals)?,
            final_decision: record.final_decision.as_str(),
            request_start: date_str(record.request.start),
            request_end: date_str(record.request.end),
            request_timespan: &record.request.timespan,
            request_multiplier: i32::try_from(record.request.multiplier)
                .map_err(|e| column_err("request_multiplier", e))?,
            requester_id: &record.requester_id,
            created_at: tz::to_rfc3339_millis(Utc::now()),
        };

        let mut conn = self.conn()?;
        let stored: SignalRow = diesel::insert_into(technical_signals::table)
            .values(&row)
            .returning(SignalRow::as_returning())
            .get_result(&mut *conn)?;
        stored.try_into()
    }

    /// Most recent record for `ticker` whose request ended on `request_end`.
    pub fn latest_for(
        &self,
        ticker: &str,
        request_end: NaiveDate,
    ) -> StoreResult<Option<AnalysisRecord>> {
        use crate::schema::technical_signals::dsl as ts;

        let mut conn = self.conn()?;
        let row = ts::technical_signals
            .filter(ts::ticker.eq(ticker))
            .filter(ts::request_end.eq(date_str(request_end)))
            .order((ts::created_at.desc(), ts::id.desc()))
            .select(SignalRow::as_select())
            .first(&mut *conn)
            .optional()?;
        row.map(AnalysisRecord::try_from).transpose()
    }

    /// All records for `ticker`, newest first.
    pub fn history(&self, ticker: &str, limit: i64) -> StoreResult<Vec<AnalysisRecord>> {
        use crate::schema::technical_signals::dsl as ts;

        let mut conn = self.conn()?;
        let rows: Vec<SignalRow> = ts::technical_signals
            .filter(ts::ticker.eq(ticker))
            .order((ts::created_at.desc(), ts::id.desc()))
            .limit(limit)
            .select(SignalRow::as_select())
            .load(&mut *conn)?;
        rows.into_iter().map(AnalysisRecord::try_from).collect()
    }

    pub fn record_request(&self, request: &NewAnalysisRequest) -> StoreResult<AnalysisRequestLog> {
        let row = NewRequestRow {
            ticker: &request.ticker,
            start_date: date_str(request.start_date),
            end_date: date_str(request.end_date),
            requester_id: &request.requester_id,
            created_at: tz::to_rfc3339_millis(Utc::now()),
        };

        let mut conn = self.conn()?;
        let stored: RequestRow = diesel::insert_into(analysis_requests::table)
            .values(&row)
            .returning(RequestRow::as_returning())
            .get_result(&mut *conn)?;
        stored.try_into()
    }
}

#[async_trait]
impl AnalysisSink for SqliteAnalysisStore {
    type Output = AnalysisRecord;

    async fn write(&self, record: &NewAnalysisRecord) -> Result<Self::Output, SinkError> {
        self.insert(record).context(StoreSnafu)
    }
}
