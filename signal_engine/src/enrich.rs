//! Single-pass bar enrichment: rolling indicators and candlestick patterns.
//!
//! Each [`EnrichedBar`] depends only on its own bar and the bars before it,
//! so enrichment works on any ordered stream without look-ahead. Input order
//! is trusted; bars are never re-sorted.

use std::collections::VecDeque;

use market_data_ingestor::models::bar::Bar;
use serde::Serialize;

/// Trailing window length for ATR and the volume z-score.
pub const INDICATOR_WINDOW: usize = 14;

/// A bar is a doji when its body is strictly less than this share of its range.
pub const DOJI_BODY_RATIO: f64 = 0.1;

/// Volume-per-trade percentile above which a bar counts as institutional flow.
pub const FLOW_PERCENTILE: f64 = 0.9;

/// A raw bar plus the indicators and pattern flags derived from its prefix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedBar {
    pub bar: Bar,
    pub cumulative_vwap: f64,
    /// Mean high-low range of the trailing window, 0 until the window fills.
    pub atr: f64,
    pub volume_zscore: f64,
    pub is_doji: bool,
    pub is_bearish_engulfing: bool,
    pub is_bullish_engulfing: bool,
    pub institutional_flow: bool,
}

impl EnrichedBar {
    pub fn close(&self) -> f64 {
        self.bar.close
    }

    pub fn open(&self) -> f64 {
        self.bar.open
    }
}

/// Fixed-capacity trailing window.
#[derive(Debug, Clone)]
struct RollingWindow {
    period: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    fn new(period: usize) -> Self {
        Self {
            period,
            values: VecDeque::with_capacity(period),
        }
    }

    fn push(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.period {
            self.values.pop_front();
        }
    }

    fn is_ready(&self) -> bool {
        self.period > 0 && self.values.len() == self.period
    }

    /// Mean of the full window, `None` while warming up.
    fn mean(&self) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.period as f64)
    }

    /// Population z-score of the most recent value. 0 while warming up or
    /// when the window has no dispersion.
    fn zscore_of_latest(&self) -> f64 {
        let (Some(mean), Some(latest)) = (self.mean(), self.values.back()) else {
            return 0.0;
        };
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / self.period as f64;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            0.0
        } else {
            (latest - mean) / std_dev
        }
    }
}

/// Full-run history kept sorted on insert, so percentile lookups are O(1)
/// reads instead of a sort per bar.
#[derive(Debug, Clone, Default)]
struct SortedHistory {
    values: Vec<f64>,
}

impl SortedHistory {
    fn insert(&mut self, value: f64) {
        let at = self
            .values
            .partition_point(|probe| probe.total_cmp(&value).is_le());
        self.values.insert(at, value);
    }

    fn percentile(&self, q: f64) -> Option<f64> {
        nearest_rank(&self.values, q)
    }
}

/// Nearest-rank percentile of an ascending slice: the value at index
/// `floor(q * (n - 1))`. No interpolation.
pub fn nearest_rank(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let index = (q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64) as usize;
    sorted.get(index).copied()
}

/// Streaming enricher. Feed bars in chronological order with [`Enricher::push`].
#[derive(Debug, Clone)]
pub struct Enricher {
    running_volume: f64,
    running_notional: f64,
    cumulative_vwap: f64,
    ranges: RollingWindow,
    volumes: RollingWindow,
    volume_per_trade: SortedHistory,
    previous: Option<Bar>,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}

impl Enricher {
    pub fn new() -> Self {
        Self {
            running_volume: 0.0,
            running_notional: 0.0,
            cumulative_vwap: 0.0,
            ranges: RollingWindow::new(INDICATOR_WINDOW),
            volumes: RollingWindow::new(INDICATOR_WINDOW),
            volume_per_trade: SortedHistory::default(),
            previous: None,
        }
    }

    pub fn push(&mut self, bar: Bar) -> EnrichedBar {
        // Bars without a vendor VWAP contribute at their close.
        let price = bar.vwap.unwrap_or(bar.close);
        self.running_volume += bar.volume;
        self.running_notional += bar.volume * price;
        if self.running_volume > 0.0 {
            self.cumulative_vwap = self.running_notional / self.running_volume;
        }

        let range = bar.range();
        self.ranges.push(range);
        let atr = self.ranges.mean().unwrap_or(0.0);

        self.volumes.push(bar.volume);
        let volume_zscore = self.volumes.zscore_of_latest();

        let is_doji = range > 0.0 && bar.body() / range < DOJI_BODY_RATIO;

        let (is_bearish_engulfing, is_bullish_engulfing) = match &self.previous {
            Some(prev) => (
                bar.close < bar.open && bar.open > prev.close && bar.close < prev.open,
                bar.close > bar.open && bar.open < prev.close && bar.close > prev.open,
            ),
            None => (false, false),
        };

        let institutional_flow = match bar.trade_count {
            Some(trades) if trades > 0 => {
                let vpt = bar.volume / trades as f64;
                self.volume_per_trade.insert(vpt);
                self.volume_per_trade
                    .percentile(FLOW_PERCENTILE)
                    .is_some_and(|threshold| vpt > threshold)
            }
            _ => false,
        };

        self.previous = Some(bar.clone());

        EnrichedBar {
            bar,
            cumulative_vwap: self.cumulative_vwap,
            atr,
            volume_zscore,
            is_doji,
            is_bearish_engulfing,
            is_bullish_engulfing,
            institutional_flow,
        }
    }
}

/// Iterator adapter returned by [`enrich_iter`].
pub struct Enriched<I> {
    inner: I,
    state: Enricher,
}

impl<I: Iterator<Item = Bar>> Iterator for Enriched<I> {
    type Item = EnrichedBar;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|bar| self.state.push(bar))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Lazily enriches a chronologically ordered bar stream.
pub fn enrich_iter<I>(bars: I) -> Enriched<I::IntoIter>
where
    I: IntoIterator<Item = Bar>,
{
    Enriched {
        inner: bars.into_iter(),
        state: Enricher::new(),
    }
}

pub fn enrich<I>(bars: I) -> Vec<EnrichedBar>
where
    I: IntoIterator<Item = Bar>,
{
    enrich_iter(bars).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, TimeZone, Utc};
    use market_data_ingestor::models::bar::Bar;

    /// Minute bar `i` minutes after 14:30 UTC on 2025-01-27.
    pub fn bar(i: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 27, 14, 30, 0).unwrap() + Duration::minutes(i),
            open,
            high,
            low,
            close,
            volume,
            trade_count: None,
            vwap: None,
        }
    }
}
