//! Feature engineering for price forecasting.
//!
//! Builds the indicator table consumed by forecast providers: one-period
//! return, short and long moving averages, MACD with its signal line, RSI,
//! and the lagged close (the lag avoids target leakage). Rows containing
//! NaN are dropped, so the table is NaN-free over everything the engine
//! reads.

use crate::error::{ForecastError, Result};
use crate::types::Bar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Feature column names, in table order.
pub const FEATURE_COLUMNS: [&str; 9] = [
    "return",
    "sma_5",
    "sma_20",
    "ema_12",
    "ema_26",
    "macd",
    "macd_signal",
    "rsi_14",
    "close_lag",
];

/// Simple moving average series. NaN until the window is full.
pub fn sma_series(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    let mut sum: f64 = values[..window].iter().sum();
    out[window - 1] = sum / window as f64;
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out[i] = sum / window as f64;
    }
    out
}

/// Exponential moving average series, seeded from the first value with
/// `alpha = 2 / (span + 1)`.
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() || span == 0 {
        return out;
    }
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut ema = values[0];
    out.push(ema);
    for &v in &values[1..] {
        ema = alpha * v + (1.0 - alpha) * ema;
        out.push(ema);
    }
    out
}

/// Relative Strength Index over a rolling window.
///
/// Windows without any losses (or without enough history) read as a neutral
/// 50.
pub fn rsi_series(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![50.0; values.len()];
    if window == 0 || values.len() < window + 1 {
        return out;
    }
    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    for i in window..values.len() {
        let recent = &deltas[i - window..i];
        let avg_gain: f64 =
            recent.iter().filter(|&&d| d > 0.0).sum::<f64>() / window as f64;
        let avg_loss: f64 =
            -recent.iter().filter(|&&d| d < 0.0).sum::<f64>() / window as f64;
        if avg_loss > 0.0 {
            let rs = avg_gain / avg_loss;
            out[i] = 100.0 - 100.0 / (1.0 + rs);
        }
    }
    out
}

/// MACD line and its signal line: EMA(fast) − EMA(slow), signalled with
/// EMA(signal) of the MACD itself.
pub fn macd_series(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<f64>, Vec<f64>) {
    let fast_ema = ema_series(values, fast);
    let slow_ema = ema_series(values, slow);
    let macd: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_series(&macd, signal);
    (macd, signal_line)
}

/// Backfill leading NaN values with the first finite value.
fn backfill(mut values: Vec<f64>) -> Vec<f64> {
    if let Some(first_valid) = values.iter().copied().find(|v| v.is_finite()) {
        for v in values.iter_mut() {
            if v.is_nan() {
                *v = first_valid;
            } else {
                break;
            }
        }
    }
    values
}

/// NaN-free indicator table with next-close targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTable {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<String>,
    /// One feature vector per kept period, ordered as [`FEATURE_COLUMNS`].
    pub rows: Vec<Vec<f64>>,
    /// Next-period close aligned with `rows`.
    pub targets: Vec<f64>,
    /// Close price at each kept period, for baseline construction.
    pub closes: Vec<f64>,
}

impl FeatureTable {
    /// Build the table from a dated close series.
    pub fn from_closes(dates: &[NaiveDate], closes: &[f64]) -> Result<Self> {
        if closes.len() != dates.len() {
            return Err(ForecastError::InvalidInput(
                "dates and closes must be the same length".to_string(),
            ));
        }
        if closes.len() < 3 {
            return Err(ForecastError::InsufficientData {
                needed: 3,
                actual: closes.len(),
            });
        }

        let matrix = feature_matrix(closes);
        let mut kept_dates = Vec::new();
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        let mut kept_closes = Vec::new();

        for i in 0..closes.len() {
            let row: Vec<f64> = matrix.iter().map(|col| col[i]).collect();
            let target = if i + 1 < closes.len() {
                closes[i + 1]
            } else {
                f64::NAN
            };
            if row.iter().all(|v| v.is_finite()) && target.is_finite() {
                kept_dates.push(dates[i]);
                rows.push(row);
                targets.push(target);
                kept_closes.push(closes[i]);
            }
        }

        Ok(Self {
            dates: kept_dates,
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
            targets,
            closes: kept_closes,
        })
    }

    /// Build the table from OHLCV bars.
    pub fn from_bars(bars: &[Bar]) -> Result<Self> {
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.timestamp.date_naive()).collect();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        Self::from_closes(&dates, &closes)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Feature vector for the most recent point of a close series, in
/// [`FEATURE_COLUMNS`] order. No target is required, which makes this
/// usable for autoregressive stepping past the end of real data.
pub fn latest_row(closes: &[f64]) -> Result<Vec<f64>> {
    if closes.is_empty() {
        return Err(ForecastError::InsufficientData {
            needed: 1,
            actual: 0,
        });
    }
    let matrix = feature_matrix(closes);
    let last = closes.len() - 1;
    Ok(matrix.iter().map(|col| col[last]).collect())
}

/// Compute all feature columns over a close series.
fn feature_matrix(closes: &[f64]) -> Vec<Vec<f64>> {
    let n = closes.len();

    let mut returns = vec![0.0; n];
    for i in 1..n {
        let prev = closes[i - 1];
        returns[i] = if prev != 0.0 {
            (closes[i] - prev) / prev
        } else {
            0.0
        };
    }

    let sma5 = backfill(sma_series(closes, 5));
    let sma20 = backfill(sma_series(closes, 20));
    let ema12 = ema_series(closes, 12);
    let ema26 = ema_series(closes, 26);
    let (macd, macd_signal) = macd_series(closes, 12, 26, 9);
    let rsi14 = rsi_series(closes, 14);

    let mut close_lag = vec![f64::NAN; n];
    for i in 1..n {
        close_lag[i] = closes[i - 1];
    }
    // A single-point series has no previous close to lag to.
    if n == 1 {
        close_lag[0] = closes[0];
    }

    vec![
        returns, sma5, sma20, ema12, ema26, macd, macd_signal, rsi14, close_lag,
    ]
}
