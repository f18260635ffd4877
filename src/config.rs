//! Configuration file support.
//!
//! Engine settings load from TOML files so runs are reproducible. Every
//! section is optional and falls back to the component defaults.

use crate::backtest::BacktestConfig;
use crate::error::Result;
use crate::portfolio::PortfolioConfig;
use crate::walkforward::WalkForwardSplitter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete engine configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Single-asset backtest settings.
    #[serde(default)]
    pub backtest: BacktestSettings,
    /// Portfolio backtest settings.
    #[serde(default)]
    pub portfolio: PortfolioSettings,
    /// Ensemble forecast settings.
    #[serde(default)]
    pub ensemble: EnsembleSettings,
    /// Walk-forward splitter settings.
    #[serde(default)]
    pub walkforward: WalkForwardSettings,
    /// Data settings.
    #[serde(default)]
    pub data: DataSettings,
}

/// Single-asset backtest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_cost")]
    pub cost: f64,
    #[serde(default = "default_slippage")]
    pub slippage: f64,
}

fn default_capital() -> f64 {
    10_000.0
}
fn default_threshold() -> f64 {
    0.5
}
fn default_cost() -> f64 {
    0.0005
}
fn default_slippage() -> f64 {
    0.0002
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: default_capital(),
            threshold: default_threshold(),
            cost: default_cost(),
            slippage: default_slippage(),
        }
    }
}

impl BacktestSettings {
    /// Convert into the backtester's configuration.
    pub fn to_config(&self) -> BacktestConfig {
        BacktestConfig {
            initial_capital: self.initial_capital,
            threshold: self.threshold,
            cost: self.cost,
            slippage: self.slippage,
        }
    }
}

/// Portfolio backtest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSettings {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_cost")]
    pub cost: f64,
    #[serde(default = "default_slippage")]
    pub slippage: f64,
}

fn default_top_k() -> usize {
    5
}

impl Default for PortfolioSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            initial_capital: default_capital(),
            cost: default_cost(),
            slippage: default_slippage(),
        }
    }
}

impl PortfolioSettings {
    /// Convert into the portfolio backtester's configuration.
    pub fn to_config(&self) -> PortfolioConfig {
        PortfolioConfig {
            top_k: self.top_k,
            initial_capital: self.initial_capital,
            cost: self.cost,
            slippage: self.slippage,
        }
    }
}

/// Ensemble forecast settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleSettings {
    /// Forecast horizon in days.
    #[serde(default = "default_horizon")]
    pub horizon_days: usize,
    /// Model names to include, e.g. ["naive", "sma5"].
    #[serde(default)]
    pub models: Vec<String>,
}

fn default_horizon() -> usize {
    30
}

impl Default for EnsembleSettings {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon(),
            models: Vec::new(),
        }
    }
}

/// Walk-forward splitter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardSettings {
    #[serde(default = "default_train_size")]
    pub train_size: usize,
    #[serde(default = "default_val_size")]
    pub val_size: usize,
    #[serde(default = "default_test_size")]
    pub test_size: usize,
    #[serde(default = "default_step_size")]
    pub step_size: usize,
    #[serde(default = "default_true")]
    pub expanding: bool,
}

fn default_train_size() -> usize {
    252
}
fn default_val_size() -> usize {
    63
}
fn default_test_size() -> usize {
    21
}
fn default_step_size() -> usize {
    21
}
fn default_true() -> bool {
    true
}

impl Default for WalkForwardSettings {
    fn default() -> Self {
        Self {
            train_size: default_train_size(),
            val_size: default_val_size(),
            test_size: default_test_size(),
            step_size: default_step_size(),
            expanding: true,
        }
    }
}

impl WalkForwardSettings {
    /// Convert into a splitter.
    pub fn to_splitter(&self) -> WalkForwardSplitter {
        WalkForwardSplitter {
            train_size: self.train_size,
            val_size: self.val_size,
            test_size: self.test_size,
            step_size: self.step_size,
            expanding: self.expanding,
        }
    }
}

/// Data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    /// Directory of per-ticker CSV files.
    pub data_dir: Option<String>,
    /// Directory for trained model bundles.
    pub models_dir: Option<String>,
    /// Tickers to load.
    #[serde(default)]
    pub tickers: Vec<String>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            models_dir: None,
            tickers: Vec::new(),
        }
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<FileConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());
    let contents = fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&contents)?;
    Ok(config)
}
