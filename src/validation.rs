//! Input validation for backtest signal series.
//!
//! Both backtesters validate their input before simulating. NaN or infinite
//! values are always fatal; suspicious patterns (constant probabilities,
//! out-of-range probabilities) are warnings by default and errors in strict
//! mode.

use crate::error::{ForecastError, Result};
use crate::types::{DailySignal, TickerSignal};
use tracing::warn;

/// Configuration for signal validation.
#[derive(Debug, Clone)]
pub struct SignalValidationConfig {
    /// Whether to check for NaN and infinite values.
    pub check_finite: bool,
    /// Whether to check that probabilities stay in [0, 1].
    pub check_probability_range: bool,
    /// Whether to flag a constant probability series.
    pub check_constant: bool,
    /// Treat warnings as errors.
    pub strict: bool,
}

impl Default for SignalValidationConfig {
    fn default() -> Self {
        Self {
            check_finite: true,
            check_probability_range: true,
            check_constant: true,
            strict: false,
        }
    }
}

impl SignalValidationConfig {
    /// Strict validation: warnings become errors.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    /// Lenient validation: only fatal issues are checked.
    pub fn lenient() -> Self {
        Self {
            check_finite: true,
            check_probability_range: false,
            check_constant: false,
            strict: false,
        }
    }
}

/// Validation outcome with any warnings encountered.
#[derive(Debug, Clone, Default)]
pub struct SignalValidationResult {
    pub warnings: Vec<String>,
}

/// Validate a single-asset signal series.
///
/// NaN/infinite probabilities or returns fail immediately. Out-of-range
/// probabilities and constant series warn (or fail in strict mode).
pub fn validate_signals(
    signals: &[DailySignal],
    config: &SignalValidationConfig,
) -> Result<SignalValidationResult> {
    let mut result = SignalValidationResult::default();

    if config.check_finite {
        for (i, signal) in signals.iter().enumerate() {
            if !signal.predicted_prob.is_finite() {
                return Err(ForecastError::InvalidInput(format!(
                    "non-finite predicted probability at index {} ({})",
                    i, signal.date
                )));
            }
            if !signal.actual_return.is_finite() {
                return Err(ForecastError::InvalidInput(format!(
                    "non-finite realized return at index {} ({})",
                    i, signal.date
                )));
            }
        }
    }

    if config.check_probability_range {
        let out_of_range = signals
            .iter()
            .filter(|s| s.predicted_prob < 0.0 || s.predicted_prob > 1.0)
            .count();
        if out_of_range > 0 {
            push_issue(
                &mut result,
                config,
                format!("{} probabilities outside [0, 1]", out_of_range),
            )?;
        }
    }

    if config.check_constant && signals.len() > 1 {
        let first = signals[0].predicted_prob;
        if signals.iter().all(|s| s.predicted_prob == first) {
            push_issue(
                &mut result,
                config,
                format!("constant probability series ({})", first),
            )?;
        }
    }

    Ok(result)
}

/// Validate multi-asset signal rows: finiteness plus non-empty tickers.
pub fn validate_ticker_signals(signals: &[TickerSignal]) -> Result<()> {
    for (i, signal) in signals.iter().enumerate() {
        if signal.ticker.is_empty() {
            return Err(ForecastError::InvalidInput(format!(
                "empty ticker at index {}",
                i
            )));
        }
        if !signal.predicted_prob.is_finite() || !signal.actual_return.is_finite() {
            return Err(ForecastError::InvalidInput(format!(
                "non-finite signal for {} at index {}",
                signal.ticker, i
            )));
        }
    }
    Ok(())
}

fn push_issue(
    result: &mut SignalValidationResult,
    config: &SignalValidationConfig,
    message: String,
) -> Result<()> {
    if config.strict {
        return Err(ForecastError::InvalidInput(message));
    }
    warn!("{}", message);
    result.warnings.push(message);
    Ok(())
}
