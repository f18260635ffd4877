//! Market data loading and management.
//!
//! CSV is the interchange format: one OHLCV row per period, flexible date
//! formats, invalid rows skipped with a warning. Loaded series are sorted
//! and deduplicated so timestamps are strictly increasing.

use crate::error::{ForecastError, Result};
use crate::metadata::compute_file_checksum;
use crate::types::Bar;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Raw CSV row with flexible column naming.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date", alias = "date", alias = "timestamp", alias = "Timestamp")]
    date: String,
    #[serde(alias = "Open", alias = "open", alias = "o")]
    open: f64,
    #[serde(alias = "High", alias = "high", alias = "h")]
    high: f64,
    #[serde(alias = "Low", alias = "low", alias = "l")]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "c", alias = "Adj Close")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", alias = "v", default)]
    volume: f64,
}

/// Data source configuration.
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Explicit date format for parsing (e.g. "%Y-%m-%d"). Tries common
    /// formats when absent.
    pub date_format: Option<String>,
    /// CSV delimiter.
    pub delimiter: u8,
    /// Skip invalid rows instead of failing.
    pub skip_invalid: bool,
    /// Validate bar data (high >= low, etc.).
    pub validate_bars: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            date_format: None,
            delimiter: b',',
            skip_invalid: true,
            validate_bars: true,
        }
    }
}

/// Parse a date string with multiple format attempts.
fn parse_datetime(s: &str, format: Option<&str>) -> Result<DateTime<Utc>> {
    if let Some(fmt) = format {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap()));
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%SZ",
    ];
    for fmt in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
    for fmt in &date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap()));
        }
    }

    Err(ForecastError::DataError(format!(
        "Could not parse date: '{}'",
        s
    )))
}

/// Load OHLCV data from a CSV file.
pub fn load_csv(path: impl AsRef<Path>, config: &DataConfig) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    info!("Loading data from: {}", path.display());

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(config.delimiter)
        .flexible(true)
        .from_path(path)?;

    let mut bars = Vec::new();
    let mut skipped = 0;
    let mut row_num = 0;

    for result in reader.deserialize() {
        row_num += 1;
        let row: CsvRow = match result {
            Ok(r) => r,
            Err(e) => {
                if config.skip_invalid {
                    debug!("Skipping row {}: {}", row_num, e);
                    skipped += 1;
                    continue;
                } else {
                    return Err(ForecastError::CsvError(e));
                }
            }
        };

        let timestamp = match parse_datetime(&row.date, config.date_format.as_deref()) {
            Ok(ts) => ts,
            Err(e) => {
                if config.skip_invalid {
                    debug!("Skipping row {} due to date parse error: {}", row_num, e);
                    skipped += 1;
                    continue;
                } else {
                    return Err(e);
                }
            }
        };

        let bar = Bar::new(
            timestamp, row.open, row.high, row.low, row.close, row.volume,
        );

        if config.validate_bars && !bar.validate() {
            if config.skip_invalid {
                debug!("Skipping row {} due to invalid bar data", row_num);
                skipped += 1;
                continue;
            } else {
                return Err(ForecastError::DataError(format!(
                    "Invalid bar data at row {}",
                    row_num
                )));
            }
        }

        bars.push(bar);
    }

    if skipped > 0 {
        warn!("Skipped {} invalid rows", skipped);
    }

    bars.sort_by_key(|b| b.timestamp);
    let original_len = bars.len();
    bars.dedup_by_key(|b| b.timestamp);
    if bars.len() < original_len {
        warn!("Removed {} duplicate timestamps", original_len - bars.len());
    }

    if bars.is_empty() {
        return Err(ForecastError::DataError(format!(
            "No usable rows in {}",
            path.display()
        )));
    }

    info!("Loaded {} bars", bars.len());
    Ok(bars)
}

/// In-memory store of price series keyed by ticker.
#[derive(Debug, Default, Clone)]
pub struct DataManager {
    series: HashMap<String, Vec<Bar>>,
    checksums: HashMap<String, String>,
}

impl DataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a CSV file for a ticker, tracking the file checksum.
    pub fn load(&mut self, ticker: impl Into<String>, path: impl AsRef<Path>) -> Result<()> {
        let ticker = ticker.into();
        let bars = load_csv(path.as_ref(), &DataConfig::default())?;
        if let Ok(checksum) = compute_file_checksum(path.as_ref()) {
            self.checksums.insert(ticker.clone(), checksum);
        }
        self.series.insert(ticker, bars);
        Ok(())
    }

    /// Add pre-loaded bars for a ticker, keeping them sorted.
    pub fn add(&mut self, ticker: impl Into<String>, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.timestamp);
        self.series.insert(ticker.into(), bars);
    }

    /// Get the bars for a ticker.
    pub fn get(&self, ticker: &str) -> Option<&Vec<Bar>> {
        self.series.get(ticker)
    }

    /// Closing prices for a ticker.
    pub fn closes(&self, ticker: &str) -> Option<Vec<f64>> {
        self.series
            .get(ticker)
            .map(|bars| bars.iter().map(|b| b.close).collect())
    }

    pub fn tickers(&self) -> Vec<&String> {
        let mut tickers: Vec<&String> = self.series.keys().collect();
        tickers.sort();
        tickers
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.series.contains_key(ticker)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Data file checksums keyed by ticker.
    pub fn checksums(&self) -> &HashMap<String, String> {
        &self.checksums
    }
}

/// Simple returns from a close price series: `r[t] = c[t+1]/c[t] - 1`.
pub fn returns_from_closes(closes: &[f64]) -> Vec<f64> {
    if closes.len() < 2 {
        return vec![];
    }
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}
