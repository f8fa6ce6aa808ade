use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use market_data_ingestor::{
    models::timeframe::TimeFrame,
    providers::{polygon_rest::PolygonProvider, trade_analysis::TradeAnalysisProvider},
};
use secrecy::SecretString;
use serde::Serialize;
use signal_engine::{
    calendar::EarningsCalendar,
    config::{EngineConfig, load_config},
    correlator::{BoundedCorrelator, CorrelationRequest},
    models::NewAnalysisRequest,
    runner::{AnalysisRequest, AnalysisRunner},
    signals::SignalGenerator,
    store::SqliteAnalysisStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Technical signal engine CLI")]
struct Cli {
    /// Path to the engine config (TOML). Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run a technical analysis for one ticker and store the result
    Analyse {
        #[arg(long)]
        ticker: String,
        /// First session (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last session (YYYY-MM-DD), defaults to today
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Bar unit, e.g. minute, hour, day
        #[arg(long)]
        timespan: Option<String>,
        #[arg(long)]
        multiplier: Option<u32>,
        #[arg(long)]
        requester: Option<String>,
    },

    /// Print the most recent stored analysis for a ticker and request end date
    Latest {
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        end: NaiveDate,
    },

    /// List earnings announcements over a date range
    Earnings {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        ticker: Option<String>,
        #[arg(long)]
        importance: Option<u8>,
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Correlate one day's earnings with order flow of the preceding session
    Correlate {
        /// Earnings date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        analysis_date: Option<NaiveDate>,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        limit: Option<u32>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn polygon(cfg: &EngineConfig) -> Result<PolygonProvider> {
    let api_key = shared_utils::get_env_var("POLYGON_API_KEY")
        .context("POLYGON_API_KEY must be set to reach Polygon")?;
    let provider = PolygonProvider::with_base_url(SecretString::from(api_key), &cfg.polygon.base_url)
        .context("build Polygon client")?;
    Ok(provider.with_rate_limit(cfg.polygon.requests_per_minute))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;

    match cli.cmd {
        Cmd::Analyse {
            ticker,
            start,
            end,
            timespan,
            multiplier,
            requester,
        } => {
            let end = end.unwrap_or_else(|| Utc::now().date_naive());
            if end < start {
                bail!("end date {end} is before start date {start}");
            }
            let timespan = timespan.unwrap_or_else(|| cfg.analysis.default_timespan.clone());
            let multiplier = multiplier.unwrap_or(cfg.analysis.default_multiplier);
            let timeframe = TimeFrame::parse(multiplier, &timespan)?;
            let requester_id = requester.unwrap_or_else(|| cfg.analysis.default_requester.clone());
            let ticker = ticker.trim().to_uppercase();

            let store = SqliteAnalysisStore::open(&cfg.database_url)?;
            let logged = store.record_request(&NewAnalysisRequest {
                ticker: ticker.clone(),
                start_date: start,
                end_date: end,
                requester_id: requester_id.clone(),
            })?;
            info!(request_id = logged.id, ticker = %ticker, "analysis requested");

            let generator = SignalGenerator::new(cfg.display_tz()?);
            let runner = AnalysisRunner::new(Arc::new(polygon(&cfg)?), store, generator)
                .with_win_rate(cfg.analysis.evaluate_win_rate);
            let outcome = runner
                .run(&AnalysisRequest {
                    ticker,
                    start,
                    end,
                    timeframe,
                    requester_id,
                })
                .await?;
            print_json(&outcome)?;
        }

        Cmd::Latest { ticker, end } => {
            let store = SqliteAnalysisStore::open(&cfg.database_url)?;
            let ticker = ticker.trim().to_uppercase();
            match store.latest_for(&ticker, end)? {
                Some(record) => print_json(&record)?,
                None => bail!("no analysis stored for {ticker} ending {end}"),
            }
        }

        Cmd::Earnings {
            start,
            end,
            ticker,
            importance,
            limit,
        } => {
            let calendar = EarningsCalendar::new(Arc::new(polygon(&cfg)?));
            let range = calendar
                .fetch_range(
                    start,
                    end,
                    ticker.as_deref(),
                    importance,
                    limit.unwrap_or(cfg.correlator.default_limit),
                )
                .await?;
            print_json(&range)?;
        }

        Cmd::Correlate {
            date,
            analysis_date,
            threshold,
            limit,
        } => {
            let flow = TradeAnalysisProvider::with_base_url(&cfg.trade_analysis.base_url, None)
                .context("build trade analysis client")?;
            let correlator = BoundedCorrelator::new(Arc::new(polygon(&cfg)?), Arc::new(flow))
                .with_max_concurrency(cfg.correlator.max_concurrency)
                .with_lookup_timeout(cfg.correlator.lookup_timeout());
            let request = CorrelationRequest::new(date)
                .with_analysis_date(analysis_date)
                .with_threshold(threshold.unwrap_or(cfg.correlator.default_large_trade_threshold))
                .with_limit(limit.unwrap_or(cfg.correlator.default_limit));
            let report = correlator.correlate(&request).await?;
            print_json(&report)?;
        }
    }

    Ok(())
}
