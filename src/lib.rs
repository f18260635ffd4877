//! Kestrel - walk-forward forecasting and backtesting for equity prices.
//!
//! # Overview
//!
//! Kestrel evaluates next-period close-price forecasts and the trading
//! strategies built on them:
//!
//! - **Leakage-free partitioning**: expanding or rolling walk-forward
//!   train/validation/test splits over chronological data
//! - **Ensemble forecasting**: inverse-error weighted combination of any
//!   number of forecast models into one forecast with confidence intervals
//! - **Realistic simulation**: transaction costs and slippage charged on
//!   every position change
//! - **Risk metrics**: Sharpe, Sortino, max drawdown and duration, win
//!   rate, turnover, benchmark comparison
//! - **Portfolio backtests**: weekly top-K rebalancing across tickers with
//!   turnover-adjusted returns and benchmark books
//!
//! # Quick Start
//!
//! ```no_run
//! use kestrel::backtest::{BacktestConfig, Backtester};
//! use kestrel::types::DailySignal;
//! use chrono::NaiveDate;
//!
//! let signals = vec![
//!     DailySignal::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 0.62, 0.011),
//!     DailySignal::new(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), 0.48, -0.004),
//! ];
//!
//! let backtester = Backtester::new(BacktestConfig::default());
//! let report = backtester.run(&signals).unwrap();
//!
//! println!("Return: {:.2}%", report.metrics.total_return * 100.0);
//! println!("Sharpe: {:.2}", report.metrics.sharpe);
//! ```
//!
//! # Walk-Forward Splits
//!
//! ```
//! use kestrel::walkforward::WalkForwardSplitter;
//!
//! let splitter = WalkForwardSplitter::new(50, 20, 20, 10);
//! for fold in splitter.splits(100) {
//!     assert!(fold.train.end <= fold.validation.start);
//!     assert!(fold.validation.end <= fold.test.start);
//! }
//! ```
//!
//! # Modules
//!
//! - [`types`]: Core data types (Bar, DailySignal, TickerSignal)
//! - [`data`]: CSV loading and the per-ticker data manager
//! - [`features`]: Indicator series and the forecasting feature table
//! - [`walkforward`]: Walk-forward fold generation
//! - [`forecast`]: Forecast provider contract, artifact store, evaluation
//! - [`ensemble`]: Inverse-error weighted forecast combination
//! - [`backtest`]: Single-asset signal backtesting
//! - [`portfolio`]: Multi-asset top-K portfolio backtesting
//! - [`metrics`]: Shared performance statistics
//! - [`validation`]: Signal-series input validation
//! - [`config`]: TOML configuration file support
//! - [`report`]: Terminal summary tables and sparklines

pub mod backtest;
pub mod config;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod forecast;
pub mod metadata;
pub mod metrics;
pub mod portfolio;
pub mod report;
pub mod types;
pub mod validation;
pub mod walkforward;

// Re-exports for convenience
pub use backtest::{BacktestConfig, BacktestReport, Backtester, StrategyMetrics};
pub use ensemble::{EnsembleCombiner, EnsembleForecast};
pub use error::{ForecastError, Result};
pub use forecast::{
    ArtifactStore, ForecastProvider, ForecastResult, ModelBundle, ModelEvaluation, ModelKind,
    NaiveForecaster, SmaForecaster,
};
pub use portfolio::{PortfolioBacktester, PortfolioConfig, PortfolioMetrics, PortfolioReport};
pub use types::{Bar, DailySignal, EquityPoint, TickerSignal};
pub use walkforward::{Fold, WalkForwardSplitter};

// Data handling re-exports
pub use data::{load_csv, DataConfig, DataManager};

// Signal validation
pub use validation::{validate_signals, validate_ticker_signals, SignalValidationConfig};

// Configuration files
pub use config::{load_config, FileConfig};
