//! Core data types shared across the engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar representing a single time period of market data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Create a new bar.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Validate that bar data is consistent.
    pub fn validate(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }

    /// Calculate the typical price (HLC average).
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// One period of single-asset backtest input: the model's predicted
/// probability of an up move and the return actually realized that period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySignal {
    pub date: NaiveDate,
    pub predicted_prob: f64,
    pub actual_return: f64,
}

impl DailySignal {
    pub fn new(date: NaiveDate, predicted_prob: f64, actual_return: f64) -> Self {
        Self {
            date,
            predicted_prob,
            actual_return,
        }
    }
}

/// One row of multi-asset backtest input: a ticker's predicted probability
/// and realized return for a given date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSignal {
    pub date: NaiveDate,
    pub ticker: String,
    pub predicted_prob: f64,
    pub actual_return: f64,
}

impl TickerSignal {
    pub fn new(
        date: NaiveDate,
        ticker: impl Into<String>,
        predicted_prob: f64,
        actual_return: f64,
    ) -> Self {
        Self {
            date,
            ticker: ticker.into(),
            predicted_prob,
            actual_return,
        }
    }
}

/// Equity snapshot at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

impl EquityPoint {
    pub fn new(date: NaiveDate, equity: f64) -> Self {
        Self { date, equity }
    }
}
