//! Error types for the forecasting and backtesting engine.

use thiserror::Error;

/// Main error type for forecasting and backtesting operations.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Insufficient data: need at least {needed} samples, have {actual}")]
    InsufficientData { needed: usize, actual: usize },

    #[error("No base models available for ensemble")]
    NoModelsAvailable,

    #[error("No trained model found for ticker {ticker}")]
    ModelNotFound { ticker: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParseError(#[from] chrono::ParseError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, ForecastError>;
