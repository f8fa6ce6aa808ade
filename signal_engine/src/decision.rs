//! Collapses a run's signals into one categorical decision.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::signals::{Signal, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Buy,
    Sell,
    Straddle,
    Hold,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Buy => "BUY",
            Decision::Sell => "SELL",
            Decision::Straddle => "STRADDLE",
            Decision::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Decision::Buy),
            "SELL" => Ok(Decision::Sell),
            "STRADDLE" => Ok(Decision::Straddle),
            "HOLD" => Ok(Decision::Hold),
            other => Err(format!("unknown decision: {other}")),
        }
    }
}

impl From<SignalKind> for Decision {
    fn from(kind: SignalKind) -> Self {
        if kind.is_bullish() {
            Decision::Buy
        } else if kind.is_bearish() {
            Decision::Sell
        } else {
            Decision::Straddle
        }
    }
}

/// Per-bucket signal counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecisionTally {
    pub buy: usize,
    pub sell: usize,
    pub straddle: usize,
    pub hold: usize,
}

impl DecisionTally {
    pub fn add(&mut self, decision: Decision) {
        match decision {
            Decision::Buy => self.buy += 1,
            Decision::Sell => self.sell += 1,
            Decision::Straddle => self.straddle += 1,
            Decision::Hold => self.hold += 1,
        }
    }

    /// HOLD is the incumbent; BUY, SELL and STRADDLE are then scanned in that
    /// order and only a strictly larger count replaces the incumbent. Ties
    /// therefore resolve BUY > SELL > STRADDLE > HOLD.
    pub fn winner(&self) -> Decision {
        let mut best = (Decision::Hold, self.hold);
        for candidate in [
            (Decision::Buy, self.buy),
            (Decision::Sell, self.sell),
            (Decision::Straddle, self.straddle),
        ] {
            if candidate.1 > best.1 {
                best = candidate;
            }
        }
        best.0
    }
}

/// Decides from typed signals.
pub fn decide(signals: &[Signal]) -> Decision {
    tally(signals.iter().map(|s| Decision::from(s.kind))).winner()
}

/// Decides from stored message lines such as `"10:01 CALL: ..."`.
pub fn decide_from_messages<S: AsRef<str>>(messages: &[S]) -> Decision {
    tally(messages.iter().map(|m| classify_message(m.as_ref()))).winner()
}

fn tally(decisions: impl Iterator<Item = Decision>) -> DecisionTally {
    let mut t = DecisionTally::default();
    for d in decisions {
        t.add(d);
    }
    t
}

/// Case-insensitive keyword classification of a message line. Keywords are
/// plain substrings, checked bullish first, then bearish, then STRADDLE.
pub fn classify_message(message: &str) -> Decision {
    let upper = message.to_uppercase();
    let has = |keys: &[&str]| keys.iter().any(|k| upper.contains(k));

    if has(&["CALL", "UP", "BUY"]) {
        Decision::Buy
    } else if has(&["PUT", "DOWN", "SELL"]) {
        Decision::Sell
    } else if has(&["STRADDLE"]) {
        Decision::Straddle
    } else {
        Decision::Hold
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::signals::SignalRule;

    fn signal(kind: SignalKind) -> Signal {
        Signal {
            timestamp: Utc::now(),
            bar_index: 3,
            close: 1.0,
            kind,
            rule: SignalRule::Doji,
            message: String::new(),
        }
    }

    #[test]
    fn majority_wins() {
        let messages = [
            "10:01 CALL: Bullish Engulfing - Reversal Likely Closing price (1.00)",
            "10:02 CALL: Bullish Engulfing - Reversal Likely Closing price (1.00)",
            "10:03 PUT: Bearish Engulfing - Reversal Likely Closing price (1.00)",
        ];
        assert_eq!(decide_from_messages(&messages), Decision::Buy);
    }

    #[test]
    fn ties_follow_fixed_priority() {
        let kinds = |ks: &[SignalKind]| ks.iter().copied().map(signal).collect::<Vec<_>>();
        assert_eq!(
            decide(&kinds(&[SignalKind::Put, SignalKind::Call])),
            Decision::Buy
        );
        assert_eq!(
            decide(&kinds(&[SignalKind::Straddle, SignalKind::Down])),
            Decision::Sell
        );
        assert_eq!(
            decide(&kinds(&[SignalKind::Straddle, SignalKind::Up, SignalKind::Down])),
            Decision::Buy
        );
    }

    #[test]
    fn hold_is_the_floor() {
        assert_eq!(decide(&[]), Decision::Hold);
        let messages = ["noise", "10:00 STRADDLE: Doji Pattern - Indecision"];
        // one HOLD, one STRADDLE: STRADDLE must strictly exceed to win
        assert_eq!(decide_from_messages(&messages), Decision::Hold);
    }

    #[test]
    fn keyword_buckets_follow_priority() {
        assert_eq!(
            classify_message("10:03 put: Volume Spike + Price Drop (10.00) - Institutional Selling Likely"),
            Decision::Sell
        );
        assert_eq!(classify_message("10:04 UP: Institutional Buying Detected"), Decision::Buy);
        assert_eq!(classify_message("10:05 DOWN: Institutional Selling Detected"), Decision::Sell);
        assert_eq!(classify_message("10:06 STRADDLE: Doji Pattern - Indecision"), Decision::Straddle);
        assert_eq!(classify_message("10:07 nothing to see"), Decision::Hold);
    }

    #[test]
    fn keywords_match_inside_words() {
        // "SETUP" carries "UP", which outranks STRADDLE.
        assert_eq!(classify_message("10:00 STRADDLE: breakout setup forming"), Decision::Buy);
        assert_eq!(classify_message("uptrend intact"), Decision::Buy);
        assert_eq!(classify_message("markdown in progress"), Decision::Sell);
        assert_eq!(classify_message("sellers in control"), Decision::Sell);
    }

    #[test]
    fn typed_and_message_paths_agree_on_generated_lines() {
        let signals = vec![signal(SignalKind::Down), signal(SignalKind::Down), signal(SignalKind::Up)];
        let messages: Vec<String> = signals
            .iter()
            .map(|s| format!("10:00 {}: Closing price (1.00)", s.kind))
            .collect();
        assert_eq!(decide(&signals), decide_from_messages(&messages));
    }
}
