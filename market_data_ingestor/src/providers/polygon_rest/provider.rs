use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use shared_utils::env::{env_var_or, get_env_var};
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::{
    models::{
        bar_series::BarSeries,
        earnings::{EarningsEvent, EarningsQuery},
        request_params::{BarsRequestParams, ProviderParams},
    },
    providers::{
        ApiSnafu, ClientBuildSnafu, DataProvider, DecodeSnafu, EarningsProvider,
        MissingEnvVarSnafu, ProviderError, ProviderInitError, ReqwestSnafu, StatusSnafu,
        polygon_rest::{
            DEFAULT_BASE_URL,
            params::{PolygonAggsParams, aggs_path, construct_params, validate_request},
            response::{PolygonAggsResponse, PolygonEarningsResponse},
        },
    },
};

pub struct PolygonProvider {
    client: Client,
    api_key: SecretString,
    base_url: String,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl PolygonProvider {
    /// Creates a new Polygon provider.
    ///
    /// Reads the API key from `POLYGON_API_KEY` and the endpoint from
    /// `POLYGON_BASE_URL` (defaults to the public API).
    pub fn new() -> Result<Self, ProviderInitError> {
        let api_key = get_env_var("POLYGON_API_KEY").context(MissingEnvVarSnafu)?;
        let base_url = env_var_or("POLYGON_BASE_URL", DEFAULT_BASE_URL);
        Self::with_base_url(SecretString::from(api_key), base_url)
    }

    pub fn with_base_url(
        api_key: SecretString,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderInitError> {
        let client = Client::builder().build().context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limiter: None,
        })
    }

    /// Spaces requests evenly so no more than `per_minute` are sent each minute.
    /// Zero disables throttling.
    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.limiter = NonZeroU32::new(per_minute).map(|rpm| {
            RateLimiter::direct(Quota::per_minute(rpm).allow_burst(nonzero!(1u32)))
        });
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, ProviderError> {
        self.throttle().await;
        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("apiKey", self.api_key.expose_secret())])
            .send()
            .await
            .context(ReqwestSnafu)?;
        decode_body(response).await
    }
}

async fn decode_body<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
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

#[async_trait]
impl DataProvider for PolygonProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        let aggs = match &params.provider_specific {
            ProviderParams::Polygon(p) => p.clone(),
            ProviderParams::None => PolygonAggsParams::default(),
        };
        validate_request(&params, &aggs)?;

        let mut result = Vec::with_capacity(params.symbols.len());
        for symbol in &params.symbols {
            let mut series = BarSeries::new(symbol.clone(), params.timeframe.clone());
            let mut url = format!("{}{}", self.base_url, aggs_path(symbol, &params));
            let mut query = construct_params(&aggs);

            loop {
                let page: PolygonAggsResponse = self.get_json(&url, &query).await?;
                if page.status == "ERROR" {
                    return ApiSnafu {
                        message: page.error.unwrap_or_else(|| "Unknown API error".to_string()),
                    }
                    .fail();
                }

                let rows = page.results.unwrap_or_default();
                debug!(symbol = %symbol, rows = rows.len(), "fetched aggregates page");
                for agg in rows {
                    match agg.into_bar() {
                        Some(bar) => series.bars.push(bar),
                        None => warn!(symbol = %symbol, "dropping aggregate with invalid timestamp"),
                    }
                }

                // `next_url` already carries the cursor and original filters.
                match page.next_url {
                    Some(next) if !next.is_empty() => {
                        url = next;
                        query.clear();
                    }
                    _ => break,
                }
            }

            result.push(series);
        }

        Ok(result)
    }
}

#[async_trait]
impl EarningsProvider for PolygonProvider {
    async fn fetch_earnings(
        &self,
        query: &EarningsQuery,
    ) -> Result<Vec<EarningsEvent>, ProviderError> {
        let url = format!("{}/benzinga/v1/earnings", self.base_url);
        let mut pairs = vec![
            ("date".to_string(), query.date.format("%Y-%m-%d").to_string()),
            ("limit".to_string(), query.limit.to_string()),
        ];
        if let Some(ticker) = &query.ticker {
            pairs.push(("ticker".to_string(), ticker.clone()));
        }
        if let Some(importance) = query.importance {
            pairs.push(("importance".to_string(), importance.to_string()));
        }

        let response: PolygonEarningsResponse = self.get_json(&url, &pairs).await?;
        if response.status != "OK" {
            return ApiSnafu {
                message: format!("non-OK status: {}", response.status),
            }
            .fail();
        }
        debug!(date = %query.date, count = response.results.len(), "fetched earnings");
        Ok(response.results)
    }
}
