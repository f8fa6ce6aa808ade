//! Order-flow ("big money") analysis as returned by the trade analysis service.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Direction of net institutional flow for one ticker.
///
/// `NoData` and `Error` are never produced by the service itself; they are
/// assigned by callers when a lookup yields no trades or fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowDirection {
    BuyingPressure,
    SellingPressure,
    Neutral,
    #[default]
    NoData,
    Error,
}

impl FlowDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowDirection::BuyingPressure => "BUYING_PRESSURE",
            FlowDirection::SellingPressure => "SELLING_PRESSURE",
            FlowDirection::Neutral => "NEUTRAL",
            FlowDirection::NoData => "NO_DATA",
            FlowDirection::Error => "ERROR",
        }
    }
}

impl FromStr for FlowDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUYING_PRESSURE" => Ok(FlowDirection::BuyingPressure),
            "SELLING_PRESSURE" => Ok(FlowDirection::SellingPressure),
            "NEUTRAL" => Ok(FlowDirection::Neutral),
            "NO_DATA" => Ok(FlowDirection::NoData),
            "ERROR" => Ok(FlowDirection::Error),
            other => Err(format!("unknown flow direction: {other:?}")),
        }
    }
}

/// Missing, empty or unrecognised directions decode as `NoData`, so a
/// zero-trade session is never rejected over its direction label.
fn lenient_direction<'de, D>(deserializer: D) -> Result<FlowDirection, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()).unwrap_or_default())
}

impl fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for a single flow lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowQuery {
    pub ticker: String,
    pub analysis_date: NaiveDate,
    /// Minimum trade size (in shares) that counts as "large".
    pub large_trade_threshold: f64,
}

/// Aggregated trade metrics for the analysed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMetrics {
    #[serde(default)]
    pub total_trades: u64,
    #[serde(default)]
    pub avg_trade_size: f64,
    #[serde(default)]
    pub large_trades_count: u64,
    #[serde(default)]
    pub net_big_money_flow: f64,
    #[serde(default)]
    pub buyer_initiated_volume: f64,
    #[serde(default)]
    pub seller_initiated_volume: f64,
    #[serde(default, deserialize_with = "lenient_direction")]
    pub direction: FlowDirection,
}

/// Full response body of the trade analysis endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowAnalysis {
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub analysis_date: String,
    #[serde(default)]
    pub large_trade_threshold: f64,
    pub result: FlowMetrics,
}

impl FlowAnalysis {
    /// True when the service saw no trades for the session.
    pub fn is_empty(&self) -> bool {
        self.result.total_trades == 0
    }

    /// The session the service reports on. Accepts a bare date or any
    /// RFC-3339 timestamp; `None` when neither parses.
    pub fn session_date(&self) -> Option<NaiveDate> {
        let raw = self.analysis_date.trim();
        raw.get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
    }
}
