//! Client for the internal trade analysis service, which classifies a
//! ticker's session as institutional buying or selling pressure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::flow::{FlowAnalysis, FlowQuery},
    providers::{
        ClientBuildSnafu, DecodeSnafu, FlowProvider, ProviderError, ProviderInitError,
        ReqwestSnafu, StatusSnafu,
    },
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8082";

pub struct TradeAnalysisProvider {
    client: Client,
    base_url: String,
}

impl TradeAnalysisProvider {
    /// `timeout` bounds the whole HTTP exchange when set.
    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderInitError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, query: &FlowQuery) -> String {
        format!(
            "{}/api/v1/trade-analysis/{}?start_date={}&large_trade_threshold={:.2}",
            self.base_url,
            query.ticker,
            query.analysis_date.format("%Y-%m-%d"),
            query.large_trade_threshold,
        )
    }
}

#[async_trait]
impl FlowProvider for TradeAnalysisProvider {
    async fn fetch_flow(&self, query: &FlowQuery) -> Result<FlowAnalysis, ProviderError> {
        let url = self.url_for(query);
        debug!(ticker = %query.ticker, date = %query.analysis_date, "requesting trade analysis");

        let response = self.client.get(&url).send().await.context(ReqwestSnafu)?;
        let status = response.status();
        let body = response.text().await.context(ReqwestSnafu)?;
        if !status.is_success() {
            return StatusSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }
        serde_json::from_str(&body).context(DecodeSnafu)
    }
}
