//! Provider abstraction for market data sources.
//!
//! This module defines the collaborator traits the analysis pipeline depends on:
//!
//! * [`DataProvider`] fetches time-series bars (Polygon aggregates).
//! * [`EarningsProvider`] lists scheduled earnings announcements for a day.
//! * [`FlowProvider`] fetches the order-flow analysis of one ticker.
//!
//! Each concrete vendor implements the traits it can serve. All traits are
//! async and object safe, so callers hold them as `Arc<dyn ...>` and tests
//! substitute in-memory fakes.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_ingestor::models::{
//!     bar_series::BarSeries,
//!     request_params::BarsRequestParams,
//! };
//! use market_data_ingestor::providers::{DataProvider, ProviderError};
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl DataProvider for MyProvider {
//!     async fn fetch_bars(
//!         &self,
//!         _params: BarsRequestParams,
//!     ) -> Result<Vec<BarSeries>, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod polygon_rest;
pub mod trade_analysis;

use async_trait::async_trait;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{
    bar_series::BarSeries,
    earnings::{EarningsEvent, EarningsQuery},
    flow::{FlowAnalysis, FlowQuery},
    request_params::BarsRequestParams,
};

/// Trait for fetching time-series bar data from a market data provider.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches time-series bar data for the given request parameters.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<BarSeries>)` - One series per requested symbol, bars ascending.
    /// * `Err(ProviderError)` - Transport, status or payload failure.
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError>;
}

/// Trait for listing the earnings announcements scheduled on a calendar day.
#[async_trait]
pub trait EarningsProvider: Send + Sync {
    async fn fetch_earnings(&self, query: &EarningsQuery)
    -> Result<Vec<EarningsEvent>, ProviderError>;
}

/// Trait for fetching the institutional order-flow analysis of one ticker.
#[async_trait]
pub trait FlowProvider: Send + Sync {
    async fn fetch_flow(&self, query: &FlowQuery) -> Result<FlowAnalysis, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a provider implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider's API returned a specific error message (e.g., invalid API key).
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The provider answered with a non-success HTTP status.
    #[snafu(display("API returned status {status}: {body}"))]
    Status {
        status: u16,
        body: String,
        backtrace: Backtrace,
    },

    /// The response body could not be decoded.
    #[snafu(display("Failed to parse response: {source}"))]
    Decode {
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during provider configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}
