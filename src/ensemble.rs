//! Inverse-error weighted combination of point forecasts.
//!
//! The combiner takes completed forecasts from any number of models and
//! blends them into a single forecast with a confidence interval. Models
//! with lower held-out RMSE receive proportionally more weight; models that
//! failed to report a usable error stay in the mix at a heavily discounted
//! fixed weight rather than being excluded.

use crate::error::{ForecastError, Result};
use crate::forecast::ForecastResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Guard against division by zero in inverse-error weights.
const WEIGHT_EPSILON: f64 = 1e-6;

/// Weight assigned to a model whose error estimate is missing, zero, or
/// non-finite: unknown error is treated as "assume bad", not "perfect".
const FALLBACK_WEIGHT: f64 = 1e-3;

/// Two-sided 95% z-score used for the confidence band.
const CONFIDENCE_Z: f64 = 1.96;

/// Combined forecast across models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleForecast {
    pub ticker: String,
    /// Weighted point forecast per horizon step.
    pub predictions: Vec<f64>,
    /// Symmetric (low, high) band per horizon step. Constant width across
    /// the horizon.
    pub intervals: Vec<(f64, f64)>,
    /// Normalized per-model weights, summing to 1.
    pub weights: BTreeMap<String, f64>,
    /// Weighted average of the surviving finite error estimates.
    pub error_estimate: f64,
    /// Mean probability of an up move across models, in [0, 1].
    pub up_probability: f64,
    /// Mean risk score across models, in [0, 100].
    pub risk_score: f64,
}

/// Combines heterogeneous model forecasts into one ensemble forecast.
#[derive(Debug, Clone, Default)]
pub struct EnsembleCombiner;

impl EnsembleCombiner {
    pub fn new() -> Self {
        Self
    }

    /// Combine per-model forecasts into a single weighted forecast.
    ///
    /// Models with empty prediction sequences are dropped. The horizon is
    /// truncated to the shortest surviving model so that partial agreement
    /// across models beats total failure. Fails with
    /// [`ForecastError::NoModelsAvailable`] when nothing survives.
    pub fn combine(
        &self,
        results: &BTreeMap<String, ForecastResult>,
        requested_days: usize,
    ) -> Result<EnsembleForecast> {
        let surviving: Vec<(&String, &ForecastResult)> = results
            .iter()
            .filter(|(name, r)| {
                if r.predictions.is_empty() {
                    warn!(model = name.as_str(), "dropping model with empty predictions");
                    false
                } else {
                    true
                }
            })
            .collect();

        if surviving.is_empty() {
            return Err(ForecastError::NoModelsAvailable);
        }

        let ticker = surviving[0].1.ticker.clone();
        let min_len = surviving
            .iter()
            .map(|(_, r)| r.predictions.len())
            .min()
            .unwrap_or(0);
        let effective_days = requested_days.min(min_len);
        if effective_days < requested_days {
            debug!(
                requested_days,
                effective_days, "truncating ensemble horizon to shortest model"
            );
        }

        // Inverse-error raw weights.
        let raw_weights: Vec<f64> = surviving
            .iter()
            .map(|(_, r)| {
                let e = r.error_estimate;
                if e.is_finite() && e > 0.0 {
                    1.0 / (e + WEIGHT_EPSILON)
                } else {
                    FALLBACK_WEIGHT
                }
            })
            .collect();

        let weight_sum: f64 = raw_weights.iter().sum();
        let normalized: Vec<f64> = if weight_sum > 0.0 {
            raw_weights.iter().map(|w| w / weight_sum).collect()
        } else {
            // Degenerate sum: fall back to equal weights.
            vec![1.0 / surviving.len() as f64; surviving.len()]
        };

        // Weighted point forecast per horizon step.
        let predictions: Vec<f64> = (0..effective_days)
            .map(|h| {
                surviving
                    .iter()
                    .zip(normalized.iter())
                    .map(|((_, r), w)| w * r.predictions[h])
                    .sum()
            })
            .collect();

        // Ensemble error: weighted average over the finite error estimates,
        // with weights renormalized to that subset.
        let finite: Vec<(f64, f64)> = surviving
            .iter()
            .zip(normalized.iter())
            .filter(|((_, r), _)| r.error_estimate.is_finite())
            .map(|((_, r), w)| (r.error_estimate, *w))
            .collect();
        let finite_weight: f64 = finite.iter().map(|(_, w)| w).sum();
        let error_estimate = if finite_weight > 0.0 {
            finite.iter().map(|(e, w)| e * w).sum::<f64>() / finite_weight
        } else {
            0.0
        };

        let band = CONFIDENCE_Z * error_estimate;
        let intervals: Vec<(f64, f64)> = predictions.iter().map(|p| (p - band, p + band)).collect();

        // Auxiliary signals: unweighted means with neutral defaults.
        let up_probs: Vec<f64> = surviving
            .iter()
            .filter_map(|(_, r)| r.up_probability)
            .collect();
        let up_probability = if up_probs.is_empty() {
            0.5
        } else {
            (up_probs.iter().sum::<f64>() / up_probs.len() as f64).clamp(0.0, 1.0)
        };

        let risks: Vec<f64> = surviving.iter().filter_map(|(_, r)| r.risk_score).collect();
        let risk_score = if risks.is_empty() {
            50.0
        } else {
            (risks.iter().sum::<f64>() / risks.len() as f64).clamp(0.0, 100.0)
        };

        let weights: BTreeMap<String, f64> = surviving
            .iter()
            .zip(normalized.iter())
            .map(|((name, _), w)| ((*name).clone(), *w))
            .collect();

        Ok(EnsembleForecast {
            ticker,
            predictions,
            intervals,
            weights,
            error_estimate,
            up_probability,
            risk_score,
        })
    }
}
