use serde::{Deserialize, Serialize};

use crate::{
    models::{request_params::BarsRequestParams, timeframe::TimeFrame},
    providers::{ProviderError, ValidationSnafu},
};

/// Largest page size the aggregates endpoint accepts.
pub const MAX_AGGS_LIMIT: u32 = 50_000;

/// Specifies the sort order for the bars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    #[default]
    Asc,
    Desc,
}

impl Sort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sort::Asc => "asc",
            Sort::Desc => "desc",
        }
    }
}

/// Polygon-specific parameters for an aggregates request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolygonAggsParams {
    /// Split-adjusted prices.
    pub adjusted: bool,
    pub sort: Sort,
    /// Page size; pagination follows `next_url` until exhausted.
    pub limit: u32,
}

impl Default for PolygonAggsParams {
    fn default() -> Self {
        Self {
            adjusted: true,
            sort: Sort::Asc,
            limit: 120,
        }
    }
}

pub fn validate_timeframe(timeframe: &TimeFrame) -> Result<(), ProviderError> {
    if timeframe.amount == 0 {
        return ValidationSnafu {
            message: "timeframe multiplier must be at least 1",
        }
        .fail();
    }
    Ok(())
}

pub fn validate_request(params: &BarsRequestParams, aggs: &PolygonAggsParams) -> Result<(), ProviderError> {
    validate_timeframe(&params.timeframe)?;
    if params.symbols.is_empty() {
        return ValidationSnafu {
            message: "at least one symbol is required",
        }
        .fail();
    }
    if params.end < params.start {
        return ValidationSnafu {
            message: format!("end {} is before start {}", params.end, params.start),
        }
        .fail();
    }
    if aggs.limit == 0 || aggs.limit > MAX_AGGS_LIMIT {
        return ValidationSnafu {
            message: format!("limit must be within 1..={MAX_AGGS_LIMIT}"),
        }
        .fail();
    }
    Ok(())
}

/// Query pairs for the first page of an aggregates request.
pub fn construct_params(aggs: &PolygonAggsParams) -> Vec<(String, String)> {
    vec![
        ("adjusted".to_string(), aggs.adjusted.to_string()),
        ("sort".to_string(), aggs.sort.as_str().to_string()),
        ("limit".to_string(), aggs.limit.to_string()),
    ]
}

/// Path of the aggregates endpoint for one ticker.
pub fn aggs_path(symbol: &str, params: &BarsRequestParams) -> String {
    format!(
        "/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
        symbol,
        params.timeframe.amount,
        params.timeframe.unit.as_str(),
        params.start.format("%Y-%m-%d"),
        params.end.format("%Y-%m-%d"),
    )
}
