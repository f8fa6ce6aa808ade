use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{models::timeframe::TimeFrame, providers::polygon_rest::PolygonAggsParams};

/// Universal parameters for requesting time-series bar data from any market data provider.
///
/// This struct is vendor-agnostic. It is the standard input for all
/// [`DataProvider`](crate::providers::DataProvider) implementations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BarsRequestParams {
    /// List of symbols to request (e.g., `["SPY"]`).
    pub symbols: Vec<String>,

    /// The time interval for each bar (e.g., 5 minute, 1 day).
    ///
    /// **Validation of allowed values is performed by each data provider
    /// implementation, according to their own API rules.**
    pub timeframe: TimeFrame,

    /// First calendar day of the requested range (inclusive).
    pub start: NaiveDate,

    /// Last calendar day of the requested range (inclusive).
    pub end: NaiveDate,

    /// Optional, provider-specific parameters.
    #[serde(default)]
    pub provider_specific: ProviderParams,
}

impl BarsRequestParams {
    /// Request for a single symbol with default provider parameters.
    pub fn single(
        symbol: impl Into<String>,
        timeframe: TimeFrame,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            symbols: vec![symbol.into()],
            timeframe,
            start,
            end,
            provider_specific: ProviderParams::None,
        }
    }
}

/// An enum to hold provider-specific request parameters.
///
/// This allows callers to specify detailed, per-request options for a
/// particular provider without cluttering the universal `BarsRequestParams`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum ProviderParams {
    #[default]
    None,
    Polygon(PolygonAggsParams),
}
