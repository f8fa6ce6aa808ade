//! Persisted analysis records and request audit entries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::Decision;

/// Default `analysis_type` for records produced by the technical pipeline.
pub const TECHNICAL_ANALYSIS: &str = "technical";

/// The parameters the bars were fetched with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParameters {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Vendor timespan, e.g. `minute`.
    pub timespan: String,
    pub multiplier: u32,
}

/// A record ready to be written. Ids and `created_at` are assigned on insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAnalysisRecord {
    pub ticker: String,
    /// Timestamp of the first analysed bar.
    pub start_timestamp: DateTime<Utc>,
    /// Timestamp of the last analysed bar.
    pub end_timestamp: DateTime<Utc>,
    pub interval_label: String,
    pub bar_count: usize,
    pub analysis_type: String,
    /// Signal messages in generation order.
    pub signals: Vec<String>,
    pub final_decision: Decision,
    pub request: RequestParameters,
    pub requester_id: String,
}

/// A stored, immutable analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub ticker: String,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub interval_label: String,
    pub bar_count: usize,
    pub analysis_type: String,
    pub signals: Vec<String>,
    pub final_decision: Decision,
    pub request: RequestParameters,
    pub requester_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAnalysisRequest {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub requester_id: String,
}

/// Audit row written each time an analysis is triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequestLog {
    pub id: i64,
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub requester_id: String,
    pub created_at: DateTime<Utc>,
}
