//! Single-asset backtest simulation.
//!
//! Converts a predicted-probability series into long/flat positions, charges
//! transaction costs and slippage on position changes, and derives the
//! equity curve and risk-adjusted performance metrics. A buy-and-hold
//! benchmark curve is computed in parallel from the raw realized returns.

use crate::error::{ForecastError, Result};
use crate::metadata::{compute_config_hash, generate_experiment_id};
use crate::metrics::{cagr, max_drawdown, mean, sharpe_ratio, sortino_ratio};
use crate::types::{DailySignal, EquityPoint};
use crate::validation::{validate_signals, SignalValidationConfig};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Configuration for a single-asset backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Starting capital.
    pub initial_capital: f64,
    /// Long when predicted probability exceeds this threshold, flat
    /// otherwise.
    pub threshold: f64,
    /// Transaction cost charged per position change, as a return fraction.
    pub cost: f64,
    /// Slippage charged per position change, as a return fraction.
    pub slippage: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            threshold: 0.5,
            cost: 0.0005,
            slippage: 0.0002,
        }
    }
}

/// Risk and performance metrics for a single-asset backtest.
///
/// Degenerate statistics (zero variance, no losing periods, zero elapsed
/// time) are NaN; consumers must handle them explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    /// Periods from the running peak preceding the deepest trough to the
    /// trough itself.
    pub drawdown_duration: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub n_trades: usize,
    /// Trades per period.
    pub turnover: f64,
    /// Buy-and-hold total return over the same span.
    pub benchmark_total_return: f64,
}

/// Results of a single-asset backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub config: BacktestConfig,
    pub metrics: StrategyMetrics,
    /// Strategy equity, starting at `initial_capital`.
    pub equity_curve: Vec<EquityPoint>,
    /// Buy-and-hold equity computed from raw returns, no costs.
    pub benchmark_curve: Vec<EquityPoint>,
    /// Unique identifier for this run.
    pub experiment_id: Uuid,
    /// SHA256 hash of the configuration for change detection.
    pub config_hash: String,
}

/// Long/flat strategy simulator driven by predicted probabilities.
pub struct Backtester {
    config: BacktestConfig,
}

impl Backtester {
    /// Create a new backtester.
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(BacktestConfig::default())
    }

    /// Run the simulation over a chronological signal series.
    pub fn run(&self, signals: &[DailySignal]) -> Result<BacktestReport> {
        if signals.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: 1,
                actual: 0,
            });
        }
        validate_signals(signals, &SignalValidationConfig::default())?;

        let cfg = &self.config;
        let per_trade_drag = cfg.cost + cfg.slippage;

        let mut pnl = Vec::with_capacity(signals.len());
        let mut n_trades = 0usize;
        let mut prev_position = 0u8;

        for signal in signals {
            let position: u8 = if signal.predicted_prob > cfg.threshold {
                1
            } else {
                0
            };
            let trade = position != prev_position;
            if trade {
                n_trades += 1;
            }
            let drag = if trade { per_trade_drag } else { 0.0 };
            pnl.push(position as f64 * signal.actual_return - drag);
            prev_position = position;
        }

        // Equity curves start at initial capital the period before the first
        // signal.
        let start_date = signals[0]
            .date
            .pred_opt()
            .ok_or_else(|| ForecastError::DataError("signal date out of range".to_string()))?;

        let mut equity_curve = Vec::with_capacity(signals.len() + 1);
        equity_curve.push(EquityPoint::new(start_date, cfg.initial_capital));
        let mut equity = cfg.initial_capital;
        for (signal, &p) in signals.iter().zip(pnl.iter()) {
            equity *= 1.0 + p;
            equity_curve.push(EquityPoint::new(signal.date, equity));
        }

        let mut benchmark_curve = Vec::with_capacity(signals.len() + 1);
        benchmark_curve.push(EquityPoint::new(start_date, cfg.initial_capital));
        let mut bh_equity = cfg.initial_capital;
        for signal in signals {
            bh_equity *= 1.0 + signal.actual_return;
            benchmark_curve.push(EquityPoint::new(signal.date, bh_equity));
        }

        let metrics = self.compute_metrics(signals, &pnl, &equity_curve, bh_equity, n_trades);

        info!(
            total_return = metrics.total_return,
            sharpe = metrics.sharpe,
            max_drawdown = metrics.max_drawdown,
            n_trades,
            "backtest complete"
        );

        Ok(BacktestReport {
            config: cfg.clone(),
            metrics,
            equity_curve,
            benchmark_curve,
            experiment_id: generate_experiment_id(),
            config_hash: compute_config_hash(cfg),
        })
    }

    fn compute_metrics(
        &self,
        signals: &[DailySignal],
        pnl: &[f64],
        equity_curve: &[EquityPoint],
        bh_equity: f64,
        n_trades: usize,
    ) -> StrategyMetrics {
        let initial = self.config.initial_capital;
        let final_equity = equity_curve.last().map(|p| p.equity).unwrap_or(initial);
        let total_return = final_equity / initial - 1.0;

        let days_elapsed = (signals[signals.len() - 1].date - signals[0].date).num_days() as f64;
        let growth = cagr(initial, final_equity, days_elapsed);

        let sharpe = sharpe_ratio(pnl, TRADING_DAYS_PER_YEAR);
        let sortino = sortino_ratio(pnl, TRADING_DAYS_PER_YEAR);

        let equity_values: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let (dd, dd_duration) = max_drawdown(&equity_values);

        let wins: Vec<f64> = pnl.iter().copied().filter(|&p| p > 0.0).collect();
        let losses: Vec<f64> = pnl.iter().copied().filter(|&p| p < 0.0).collect();
        let decided = wins.len() + losses.len();
        let win_rate = if decided > 0 {
            wins.len() as f64 / decided as f64
        } else {
            f64::NAN
        };

        StrategyMetrics {
            total_return,
            cagr: growth,
            sharpe,
            sortino,
            max_drawdown: dd,
            drawdown_duration: dd_duration,
            win_rate,
            avg_win: mean(&wins),
            avg_loss: mean(&losses),
            n_trades,
            turnover: n_trades as f64 / signals.len() as f64,
            benchmark_total_return: bh_equity / initial - 1.0,
        }
    }
}
