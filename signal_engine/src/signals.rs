//! Rule-based signal generation over enriched bars.

use std::fmt;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::enrich::EnrichedBar;

/// Leading bars skipped so the indicators have some history behind them.
pub const WARMUP_BARS: usize = 3;

/// Volume z-score above which a bar is a volume spike.
pub const VOLUME_SPIKE_Z: f64 = 2.0;

/// Volume z-score required alongside an institutional-flow bar.
pub const FLOW_CONFIRM_Z: f64 = 1.0;

/// ATR growth factor over the previous bar that counts as volatility expansion.
pub const ATR_EXPANSION: f64 = 1.5;

/// Trade bias carried by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Call,
    Put,
    Straddle,
    /// Directional flow, buy side.
    Up,
    /// Directional flow, sell side.
    Down,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Call => "CALL",
            SignalKind::Put => "PUT",
            SignalKind::Straddle => "STRADDLE",
            SignalKind::Up => "UP",
            SignalKind::Down => "DOWN",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, SignalKind::Call | SignalKind::Up)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, SignalKind::Put | SignalKind::Down)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The rule that produced a signal, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalRule {
    Doji,
    BearishEngulfing,
    BullishEngulfing,
    VolumeSpikeSelling,
    VolumeSpikeBuying,
    VolatilityExpansion,
    InstitutionalBuying,
    InstitutionalSelling,
}

impl SignalRule {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalRule::Doji | SignalRule::VolatilityExpansion => SignalKind::Straddle,
            SignalRule::BearishEngulfing | SignalRule::VolumeSpikeSelling => SignalKind::Put,
            SignalRule::BullishEngulfing | SignalRule::VolumeSpikeBuying => SignalKind::Call,
            SignalRule::InstitutionalBuying => SignalKind::Up,
            SignalRule::InstitutionalSelling => SignalKind::Down,
        }
    }
}

/// One trading signal raised on one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: DateTime<Utc>,
    /// Index of the triggering bar in the enriched sequence.
    pub bar_index: usize,
    pub close: f64,
    pub kind: SignalKind,
    pub rule: SignalRule,
    /// Human readable line, `"HH:MM KIND: description ... Closing price (x.xx)"`.
    pub message: String,
}

/// Evaluates the trigger rules against each enriched bar.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    display_tz: Tz,
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self::new(chrono_tz::America::New_York)
    }
}

impl SignalGenerator {
    /// `display_tz` only affects the time of day rendered in messages.
    pub fn new(display_tz: Tz) -> Self {
        Self { display_tz }
    }

    pub fn display_tz(&self) -> Tz {
        self.display_tz
    }

    /// Signals for all bars past the warm-up, bar order first then rule order.
    pub fn generate(&self, bars: &[EnrichedBar]) -> Vec<Signal> {
        let mut signals = Vec::new();
        for (i, bar) in bars.iter().enumerate().skip(WARMUP_BARS) {
            let previous = i.checked_sub(1).and_then(|p| bars.get(p));
            for (rule, description) in triggered_rules(bar, previous) {
                signals.push(self.signal(i, bar, rule, &description));
            }
        }
        signals
    }

    fn signal(&self, index: usize, bar: &EnrichedBar, rule: SignalRule, description: &str) -> Signal {
        let kind = rule.kind();
        let time = bar.bar.timestamp.with_timezone(&self.display_tz).format("%H:%M");
        Signal {
            timestamp: bar.bar.timestamp,
            bar_index: index,
            close: bar.close(),
            kind,
            rule,
            message: format!("{time} {kind}: {description}"),
        }
    }
}

fn triggered_rules(bar: &EnrichedBar, previous: Option<&EnrichedBar>) -> Vec<(SignalRule, String)> {
    let close = bar.close();
    let volume = bar.bar.volume;
    let rising = bar.bar.is_up();
    let falling = bar.bar.is_down();
    let mut out = Vec::new();

    if bar.is_doji {
        out.push((
            SignalRule::Doji,
            format!("Doji Pattern - Indecision Closing price ({close:.2})"),
        ));
    }
    if bar.is_bearish_engulfing {
        out.push((
            SignalRule::BearishEngulfing,
            format!("Bearish Engulfing - Reversal Likely Closing price ({close:.2})"),
        ));
    }
    if bar.is_bullish_engulfing {
        out.push((
            SignalRule::BullishEngulfing,
            format!("Bullish Engulfing - Reversal Likely Closing price ({close:.2})"),
        ));
    }
    if bar.volume_zscore > VOLUME_SPIKE_Z && falling {
        out.push((
            SignalRule::VolumeSpikeSelling,
            format!(
                "Volume Spike + Price Drop ({volume:.2}) - Institutional Selling Likely Closing price ({close:.2})"
            ),
        ));
    }
    if bar.volume_zscore > VOLUME_SPIKE_Z && rising {
        out.push((
            SignalRule::VolumeSpikeBuying,
            format!(
                "Volume Spike + Institutional Flow ({volume:.2}) - Institutional Buying Likely Closing price ({close:.2})"
            ),
        ));
    }
    if let Some(prev) = previous {
        if bar.atr > prev.atr * ATR_EXPANSION {
            out.push((
                SignalRule::VolatilityExpansion,
                format!(
                    "Volatility Expansion (ATR {:.2}) - Institutional Activity Likely Closing price ({close:.2})",
                    bar.atr
                ),
            ));
        }
    }
    if bar.institutional_flow && bar.volume_zscore > FLOW_CONFIRM_Z {
        if rising {
            out.push((
                SignalRule::InstitutionalBuying,
                format!("Institutional Buying Detected (Volume {volume:.0}) - Closing price ({close:.2})"),
            ));
        } else if falling {
            out.push((
                SignalRule::InstitutionalSelling,
                format!("Institutional Selling Detected (Volume {volume:.0}) - Closing price ({close:.2})"),
            ));
        }
    }
    out
}

/// Share of CALL/PUT signals whose next bar moved in the signalled direction.
///
/// A CALL wins when the next close is higher, a PUT when it is lower. Other
/// kinds, and signals on the final bar, are not counted. 0.0 when nothing
/// qualifies.
pub fn win_rate(bars: &[EnrichedBar], signals: &[Signal]) -> f64 {
    let mut wins = 0usize;
    let mut total = 0usize;
    for signal in signals {
        let Some(next) = bars.get(signal.bar_index + 1) else {
            continue;
        };
        let won = match signal.kind {
            SignalKind::Call => next.close() > signal.close,
            SignalKind::Put => next.close() < signal.close,
            _ => continue,
        };
        total += 1;
        if won {
            wins += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        wins as f64 / total as f64
    }
}
