use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TimeFrameError {
    #[error("Invalid amount for {:?}: {}", unit, message)]
    InvalidAmount {
        unit: TimeFrameUnit,
        message: String,
    },

    #[error("Invalid input: {}", message)]
    InvalidInput { message: String },
}

/// Bar interval unit. The lowercase name doubles as the vendor "timespan"
/// path segment (`minute`, `day`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrameUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeFrameUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrameUnit::Second => "second",
            TimeFrameUnit::Minute => "minute",
            TimeFrameUnit::Hour => "hour",
            TimeFrameUnit::Day => "day",
            TimeFrameUnit::Week => "week",
            TimeFrameUnit::Month => "month",
            TimeFrameUnit::Quarter => "quarter",
            TimeFrameUnit::Year => "year",
        }
    }
}

impl fmt::Display for TimeFrameUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFrameUnit {
    type Err = TimeFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unit = match s.trim().to_lowercase().as_str() {
            "s" | "sec" | "second" => TimeFrameUnit::Second,
            "m" | "min" | "minute" => TimeFrameUnit::Minute,
            "h" | "hr" | "hour" => TimeFrameUnit::Hour,
            "d" | "day" => TimeFrameUnit::Day,
            "w" | "wk" | "week" => TimeFrameUnit::Week,
            "mo" | "month" => TimeFrameUnit::Month,
            "q" | "quarter" => TimeFrameUnit::Quarter,
            "y" | "year" => TimeFrameUnit::Year,
            other => {
                return Err(TimeFrameError::InvalidInput {
                    message: format!("Invalid timeframe unit: {other}"),
                });
            }
        };
        Ok(unit)
    }
}

/// A bar interval: `amount` multiples of `unit` (e.g. 5 minute bars).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFrame {
    pub amount: u32,
    pub unit: TimeFrameUnit,
}

impl TimeFrame {
    pub fn new(amount: u32, unit: TimeFrameUnit) -> Self {
        Self { amount, unit }
    }

    /// Builds a timeframe, rejecting a zero multiplier.
    pub fn try_new(amount: u32, unit: TimeFrameUnit) -> Result<Self, TimeFrameError> {
        Self::validate(amount, unit)?;
        Ok(Self { amount, unit })
    }

    /// Parses a unit string (`m`, `minute`, `day`, ...) together with an amount.
    pub fn parse(amount: u32, unit: &str) -> Result<Self, TimeFrameError> {
        Self::try_new(amount, unit.parse()?)
    }

    pub fn minutes(amount: u32) -> Self {
        Self::new(amount, TimeFrameUnit::Minute)
    }

    pub fn day() -> Self {
        Self::new(1, TimeFrameUnit::Day)
    }

    fn validate(amount: u32, unit: TimeFrameUnit) -> Result<(), TimeFrameError> {
        if amount == 0 {
            return Err(TimeFrameError::InvalidAmount {
                unit,
                message: "multiplier must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}
