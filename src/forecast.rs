//! Forecast providers, model artifacts, and evaluation.
//!
//! Every model family implements [`ForecastProvider`]: predict a close-price
//! path for a ticker plus a held-out error estimate, and report evaluation
//! metrics against naive baselines. Providers are selected by configuration
//! through the tagged [`ModelKind`], never by inheritance; the ensemble only
//! depends on the trait.
//!
//! Trained state lives in an explicit [`ArtifactStore`] injected at
//! construction, so providers stay testable without any process-wide
//! filesystem layout.

use crate::data::DataManager;
use crate::ensemble::EnsembleCombiner;
use crate::error::{ForecastError, Result};
use crate::features::{FeatureTable, FEATURE_COLUMNS};
use crate::metrics::{directional_accuracy, mae, rmse};
use crate::walkforward::WalkForwardSplitter;
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Minimum close-price history a provider needs before forecasting.
const MIN_HISTORY: usize = 30;

/// Point forecast for one ticker over a horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub ticker: String,
    /// Requested horizon; `predictions` may be shorter.
    pub horizon_days: usize,
    pub predictions: Vec<f64>,
    /// Held-out RMSE usable for confidence-interval construction. Always
    /// non-negative when finite.
    pub error_estimate: f64,
    /// Probability of an up move over the first horizon step, in [0, 1].
    pub up_probability: Option<f64>,
    /// Risk score in [0, 100], scaled from forecast volatility.
    pub risk_score: Option<f64>,
}

impl ForecastResult {
    pub fn new(
        ticker: impl Into<String>,
        horizon_days: usize,
        predictions: Vec<f64>,
        error_estimate: f64,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            horizon_days,
            predictions,
            error_estimate,
            up_probability: None,
            risk_score: None,
        }
    }
}

/// Point-forecast quality on a held-out set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    /// Directional accuracy in [0, 1].
    pub accuracy: f64,
}

/// Error metrics for a baseline predictor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub rmse: f64,
    pub mae: f64,
}

/// Baseline predictors evaluated over the same horizon as the model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BaselineReport {
    /// Previous close carried forward.
    pub naive: ErrorMetrics,
    /// Five-period moving average of the preceding closes.
    pub sma5: ErrorMetrics,
}

/// Model evaluation against held-out targets and baselines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub ticker: String,
    pub test_metrics: RegressionMetrics,
    pub baseline: BaselineReport,
}

/// Uniform contract for forecasting model families.
pub trait ForecastProvider: Send + Sync {
    /// Short model name used as the ensemble weight key.
    fn name(&self) -> &str;

    /// Forecast up to `days` closes for `ticker`. Implementations may
    /// return fewer steps than requested.
    fn predict(&self, ticker: &str, days: usize) -> Result<ForecastResult>;

    /// Evaluate the model on held-out data with baseline comparisons.
    fn evaluate(&self, ticker: &str) -> Result<ModelEvaluation>;
}

/// Tagged model variant, selected by configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    /// Previous close carried forward.
    Naive,
    /// Moving average of the trailing window.
    Sma { window: usize },
}

impl ModelKind {
    /// Short identifier used in bundle filenames and ensemble keys.
    pub fn slug(&self) -> String {
        match self {
            ModelKind::Naive => "naive".to_string(),
            ModelKind::Sma { window } => format!("sma{}", window),
        }
    }
}

/// Serialized model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub ticker: String,
    /// UTC creation timestamp, lexicographically sortable.
    pub created_at: String,
    pub model: ModelKind,
    pub feature_columns: Vec<String>,
    pub metrics: RegressionMetrics,
}

/// Filesystem store for trained model bundles.
///
/// Bundles are JSON files named `model_{slug}_{ticker}_{created_at}.json`;
/// the newest bundle for a (model, ticker) pair wins.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    /// Persist a bundle, returning its path.
    pub fn save(&self, bundle: &ModelBundle) -> Result<PathBuf> {
        let path = self.root.join(format!(
            "model_{}_{}_{}.json",
            bundle.model.slug(),
            bundle.ticker,
            bundle.created_at
        ));
        std::fs::write(&path, serde_json::to_vec_pretty(bundle)?)?;
        debug!(path = %path.display(), "saved model bundle");
        Ok(path)
    }

    /// Load the newest bundle for a model/ticker pair.
    pub fn latest(&self, model: &str, ticker: &str) -> Result<ModelBundle> {
        let prefix = format!("model_{}_{}_", model, ticker);
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(&prefix) && n.ends_with(".json"))
                    .unwrap_or(false)
            })
            .collect();

        candidates.sort();
        let newest = candidates.pop().ok_or_else(|| ForecastError::ModelNotFound {
            ticker: ticker.to_string(),
        })?;
        let bundle: ModelBundle = serde_json::from_slice(&std::fs::read(newest)?)?;
        Ok(bundle)
    }
}

/// Multi-step forecast by feeding each prediction back in as the next
/// period's close.
///
/// The loop carries the growing series as an explicit value: every step
/// rebuilds its input from the original history plus the predictions made so
/// far, so each step's inputs stay auditable.
pub fn autoregressive_forecast(
    closes: &[f64],
    horizon: usize,
    step: impl Fn(&[f64]) -> f64,
) -> Vec<f64> {
    let mut predictions = Vec::with_capacity(horizon);
    for _ in 0..horizon {
        let series: Vec<f64> = closes
            .iter()
            .chain(predictions.iter())
            .copied()
            .collect();
        predictions.push(step(&series));
    }
    predictions
}

/// Probability that the next close lands above the last close, under a
/// normal error assumption: Φ((forecast − last_close) / rmse).
pub fn up_probability(first_prediction: f64, last_close: f64, error_estimate: f64) -> f64 {
    if error_estimate > 0.0 && error_estimate.is_finite() {
        normal_cdf((first_prediction - last_close) / error_estimate)
    } else {
        0.5
    }
}

/// Risk score in [0, 100]: forecast-error volatility relative to price,
/// scaled so a 2% one-step deviation reads as 50.
pub fn risk_score(last_close: f64, error_estimate: f64) -> f64 {
    let base = last_close.max(1e-8);
    let next_std_ret = error_estimate / base;
    ((next_std_ret / 0.02) * 50.0).clamp(0.0, 100.0)
}

/// Φ(x) = 0.5 * (1 + erf(x/√2))
fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Error function polynomial approximation.
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = x.signum();
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// Chronological 70/15/15 evaluation over a feature table.
///
/// `predict` receives the table and a row index and returns the predicted
/// next close for that row. Metrics are computed over the final 15% test
/// tail, alongside naive and SMA-5 baselines on the same rows.
pub fn chronological_evaluation(
    ticker: &str,
    table: &FeatureTable,
    mut predict: impl FnMut(&FeatureTable, usize) -> f64,
) -> Result<ModelEvaluation> {
    let n = table.len();
    if n < 20 {
        return Err(ForecastError::InsufficientData {
            needed: 20,
            actual: n,
        });
    }

    let val_end = (n as f64 * 0.85) as usize;
    let test_indices: Vec<usize> = (val_end..n).collect();

    let predicted: Vec<f64> = test_indices.iter().map(|&i| predict(table, i)).collect();
    let truth: Vec<f64> = test_indices.iter().map(|&i| table.targets[i]).collect();

    Ok(ModelEvaluation {
        ticker: ticker.to_string(),
        test_metrics: RegressionMetrics {
            rmse: rmse(&truth, &predicted),
            mae: mae(&truth, &predicted),
            accuracy: directional_accuracy(&truth, &predicted),
        },
        baseline: baseline_report(table, &test_indices, &truth),
    })
}

/// Per-period refit walk-forward evaluation over the last `steps` targets.
///
/// `fit_predict` receives the training rows/targets and the test row, refit
/// from scratch each step (expanding window, no lookahead). Preconditions
/// follow [`WalkForwardSplitter::single_step_folds`].
pub fn walkforward_evaluation(
    ticker: &str,
    table: &FeatureTable,
    steps: usize,
    mut fit_predict: impl FnMut(&[Vec<f64>], &[f64], &[f64]) -> f64,
) -> Result<ModelEvaluation> {
    let folds = WalkForwardSplitter::single_step_folds(table.len(), steps)?;

    let mut predicted = Vec::with_capacity(folds.len());
    let mut truth = Vec::with_capacity(folds.len());
    let mut test_indices = Vec::with_capacity(folds.len());

    for fold in &folds {
        let i = fold.test.start;
        let train_rows = &table.rows[fold.train.clone()];
        let train_targets = &table.targets[fold.train.clone()];
        predicted.push(fit_predict(train_rows, train_targets, &table.rows[i]));
        truth.push(table.targets[i]);
        test_indices.push(i);
    }

    info!(ticker, steps, "walk-forward evaluation complete");

    Ok(ModelEvaluation {
        ticker: ticker.to_string(),
        test_metrics: RegressionMetrics {
            rmse: rmse(&truth, &predicted),
            mae: mae(&truth, &predicted),
            accuracy: directional_accuracy(&truth, &predicted),
        },
        baseline: baseline_report(table, &test_indices, &truth),
    })
}

/// Naive and SMA-5 baselines over the given test rows.
fn baseline_report(table: &FeatureTable, test_indices: &[usize], truth: &[f64]) -> BaselineReport {
    // Naive: the close at the row is the previous value of its target.
    let naive: Vec<f64> = test_indices.iter().map(|&i| table.closes[i]).collect();

    // SMA-5 of the closes up to and including the row.
    let sma5: Vec<f64> = test_indices
        .iter()
        .map(|&i| {
            let start = i.saturating_sub(4);
            let window = &table.closes[start..=i];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect();

    BaselineReport {
        naive: ErrorMetrics {
            rmse: rmse(truth, &naive),
            mae: mae(truth, &naive),
        },
        sma5: ErrorMetrics {
            rmse: rmse(truth, &sma5),
            mae: mae(truth, &sma5),
        },
    }
}

/// Collect forecasts from several providers in parallel, skipping failures.
///
/// Safe to parallelize: each provider returns a completed, immutable
/// [`ForecastResult`] and the combiner has no ordering requirement.
pub fn collect_forecasts(
    providers: &[Box<dyn ForecastProvider>],
    ticker: &str,
    days: usize,
) -> BTreeMap<String, ForecastResult> {
    providers
        .par_iter()
        .filter_map(|provider| match provider.predict(ticker, days) {
            Ok(result) => Some((provider.name().to_string(), result)),
            Err(e) => {
                warn!(model = provider.name(), ticker, "provider failed: {}", e);
                None
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

/// Run every provider and combine the survivors into an ensemble forecast.
pub fn ensemble_forecast(
    providers: &[Box<dyn ForecastProvider>],
    ticker: &str,
    days: usize,
) -> Result<crate::ensemble::EnsembleForecast> {
    let results = collect_forecasts(providers, ticker, days);
    EnsembleCombiner::new().combine(&results, days)
}

/// Previous-close-carried-forward provider. The simplest possible model and
/// the floor every other model has to beat.
pub struct NaiveForecaster {
    data: DataManager,
    store: ArtifactStore,
}

impl NaiveForecaster {
    pub fn new(data: DataManager, store: ArtifactStore) -> Self {
        Self { data, store }
    }

    /// Evaluate on history and persist a bundle for later prediction.
    pub fn fit(&self, ticker: &str) -> Result<ModelBundle> {
        let evaluation = self.evaluate(ticker)?;
        let bundle = ModelBundle {
            ticker: ticker.to_string(),
            created_at: bundle_timestamp(),
            model: ModelKind::Naive,
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            metrics: evaluation.test_metrics,
        };
        self.store.save(&bundle)?;
        Ok(bundle)
    }

    fn closes(&self, ticker: &str) -> Result<Vec<f64>> {
        let closes = self
            .data
            .closes(ticker)
            .ok_or_else(|| ForecastError::DataError(format!("no data loaded for {}", ticker)))?;
        if closes.len() < MIN_HISTORY {
            return Err(ForecastError::InsufficientData {
                needed: MIN_HISTORY,
                actual: closes.len(),
            });
        }
        Ok(closes)
    }

    fn table(&self, ticker: &str) -> Result<FeatureTable> {
        let bars = self
            .data
            .get(ticker)
            .ok_or_else(|| ForecastError::DataError(format!("no data loaded for {}", ticker)))?;
        if bars.len() < MIN_HISTORY {
            return Err(ForecastError::InsufficientData {
                needed: MIN_HISTORY,
                actual: bars.len(),
            });
        }
        FeatureTable::from_bars(bars)
    }
}

impl ForecastProvider for NaiveForecaster {
    fn name(&self) -> &str {
        "naive"
    }

    fn predict(&self, ticker: &str, days: usize) -> Result<ForecastResult> {
        let bundle = self.store.latest(self.name(), ticker)?;
        let closes = self.closes(ticker)?;
        let last_close = *closes.last().unwrap_or(&0.0);

        let predictions =
            autoregressive_forecast(&closes, days, |series| series[series.len() - 1]);

        let error = bundle.metrics.rmse;
        let mut result = ForecastResult::new(ticker, days, predictions, error);
        result.up_probability = Some(up_probability(
            result.predictions.first().copied().unwrap_or(last_close),
            last_close,
            error,
        ));
        result.risk_score = Some(risk_score(last_close, error));
        Ok(result)
    }

    fn evaluate(&self, ticker: &str) -> Result<ModelEvaluation> {
        let table = self.table(ticker)?;
        chronological_evaluation(ticker, &table, |table, i| table.closes[i])
    }
}

/// Trailing moving-average provider: predicts the mean of the last `window`
/// closes.
pub struct SmaForecaster {
    data: DataManager,
    store: ArtifactStore,
    window: usize,
    name: String,
}

impl SmaForecaster {
    pub fn new(data: DataManager, store: ArtifactStore) -> Self {
        Self {
            data,
            store,
            window: 5,
            name: "sma5".to_string(),
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self.name = format!("sma{}", self.window);
        self
    }

    /// Evaluate on history and persist a bundle for later prediction.
    pub fn fit(&self, ticker: &str) -> Result<ModelBundle> {
        let evaluation = self.evaluate(ticker)?;
        let bundle = ModelBundle {
            ticker: ticker.to_string(),
            created_at: bundle_timestamp(),
            model: ModelKind::Sma {
                window: self.window,
            },
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            metrics: evaluation.test_metrics,
        };
        self.store.save(&bundle)?;
        Ok(bundle)
    }

    fn closes(&self, ticker: &str) -> Result<Vec<f64>> {
        let closes = self
            .data
            .closes(ticker)
            .ok_or_else(|| ForecastError::DataError(format!("no data loaded for {}", ticker)))?;
        if closes.len() < MIN_HISTORY.max(self.window) {
            return Err(ForecastError::InsufficientData {
                needed: MIN_HISTORY.max(self.window),
                actual: closes.len(),
            });
        }
        Ok(closes)
    }

    fn table(&self, ticker: &str) -> Result<FeatureTable> {
        let bars = self
            .data
            .get(ticker)
            .ok_or_else(|| ForecastError::DataError(format!("no data loaded for {}", ticker)))?;
        if bars.len() < MIN_HISTORY.max(self.window) {
            return Err(ForecastError::InsufficientData {
                needed: MIN_HISTORY.max(self.window),
                actual: bars.len(),
            });
        }
        FeatureTable::from_bars(bars)
    }

    fn window_mean(&self, series: &[f64]) -> f64 {
        let start = series.len().saturating_sub(self.window);
        let tail = &series[start..];
        tail.iter().sum::<f64>() / tail.len() as f64
    }
}

impl ForecastProvider for SmaForecaster {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, ticker: &str, days: usize) -> Result<ForecastResult> {
        let bundle = self.store.latest(&self.name, ticker)?;
        let closes = self.closes(ticker)?;
        let last_close = *closes.last().unwrap_or(&0.0);

        let predictions =
            autoregressive_forecast(&closes, days, |series| self.window_mean(series));

        let error = bundle.metrics.rmse;
        let mut result = ForecastResult::new(ticker, days, predictions, error);
        result.up_probability = Some(up_probability(
            result.predictions.first().copied().unwrap_or(last_close),
            last_close,
            error,
        ));
        result.risk_score = Some(risk_score(last_close, error));
        Ok(result)
    }

    fn evaluate(&self, ticker: &str) -> Result<ModelEvaluation> {
        let table = self.table(ticker)?;
        let window = self.window;
        chronological_evaluation(ticker, &table, |table, i| {
            let start = i.saturating_sub(window - 1);
            let slice = &table.closes[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
    }
}

fn bundle_timestamp() -> String {
    Utc::now().format("%Y%m%d%H%M%S%f").to_string()
}
