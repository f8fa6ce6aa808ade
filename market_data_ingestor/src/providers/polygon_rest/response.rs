use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{bar::Bar, earnings::EarningsEvent};

#[derive(Deserialize, Debug)]
pub struct PolygonAgg {
    #[serde(rename = "t")]
    pub timestamp_ms: i64,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
    #[serde(rename = "n", default)]
    pub trade_count: Option<u64>,
    #[serde(rename = "vw", default)]
    pub vwap: Option<f64>,
}

impl PolygonAgg {
    /// `None` when the millisecond timestamp is out of chrono's range.
    pub fn into_bar(self) -> Option<Bar> {
        let timestamp: DateTime<Utc> = DateTime::from_timestamp_millis(self.timestamp_ms)?;
        Some(Bar {
            timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            trade_count: self.trade_count,
            vwap: self.vwap,
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct PolygonAggsResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub results: Option<Vec<PolygonAgg>>,
    #[serde(default)]
    pub next_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct PolygonEarningsResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub results: Vec<EarningsEvent>,
}
