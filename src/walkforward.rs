//! Walk-forward partitioning for time-series model evaluation.
//!
//! Walk-forward validation keeps training data strictly before validation
//! and test data, preventing lookahead bias. Shuffled cross-validation is
//! never appropriate for financial series: it destroys temporal dependence
//! and produces unrealistically optimistic estimates.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// A single train/validation/test partition over chronological indices.
///
/// Invariant: `train.end <= validation.start` and
/// `validation.end <= test.start`, so the three windows are disjoint and
/// chronologically ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub train: Range<usize>,
    pub validation: Range<usize>,
    pub test: Range<usize>,
}

impl Fold {
    /// Total number of indices covered by the fold.
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Time-series cross-validation splitter with expanding or rolling train
/// windows.
///
/// Each iteration advances the fold origin by `step_size`. With
/// `expanding = true` the train window always starts at index 0 and grows;
/// otherwise it keeps a fixed `train_size` and rolls forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardSplitter {
    /// Initial training window size (periods).
    pub train_size: usize,
    /// Validation window size (periods).
    pub val_size: usize,
    /// Test window size (periods).
    pub test_size: usize,
    /// How far the origin advances between folds (periods).
    pub step_size: usize,
    /// Whether the training window grows over time.
    pub expanding: bool,
}

impl Default for WalkForwardSplitter {
    fn default() -> Self {
        Self {
            train_size: 252,
            val_size: 63,
            test_size: 21,
            step_size: 21,
            expanding: true,
        }
    }
}

impl WalkForwardSplitter {
    /// Create a splitter with explicit window sizes and a rolling train
    /// window.
    pub fn new(train_size: usize, val_size: usize, test_size: usize, step_size: usize) -> Self {
        Self {
            train_size,
            val_size,
            test_size,
            step_size,
            expanding: false,
        }
    }

    /// Use an expanding (anchored) training window.
    pub fn with_expanding(mut self) -> Self {
        self.expanding = true;
        self
    }

    /// Lazily enumerate the folds that fit in `n_samples` indices.
    ///
    /// The returned iterator is finite and freshly constructed on every
    /// call, so the sequence can be restarted at will. If `n_samples` is too
    /// small for even one fold the sequence is empty; callers treat that as
    /// "insufficient data", not an error.
    pub fn splits(&self, n_samples: usize) -> Splits {
        Splits {
            splitter: self.clone(),
            n_samples,
            origin: 0,
        }
    }

    /// Single-step-ahead walk-forward plan over the last `steps` targets:
    /// fold `i` trains on every index before `i` and tests on `i` alone.
    ///
    /// Used for per-period retraining backtests. Requires `n_samples >= 200`
    /// and `steps >= 10`; violating either is a fatal precondition failure.
    pub fn single_step_folds(n_samples: usize, steps: usize) -> Result<Vec<Fold>> {
        if n_samples < 200 {
            return Err(ForecastError::InsufficientData {
                needed: 200,
                actual: n_samples,
            });
        }
        if steps < 10 {
            return Err(ForecastError::InsufficientData {
                needed: 10,
                actual: steps,
            });
        }

        let start = n_samples - steps;
        debug!(start, steps, "building single-step walk-forward plan");
        Ok((start..n_samples)
            .map(|i| Fold {
                train: 0..i,
                validation: i..i,
                test: i..i + 1,
            })
            .collect())
    }
}

/// Finite iterator over the folds of a [`WalkForwardSplitter`].
#[derive(Debug, Clone)]
pub struct Splits {
    splitter: WalkForwardSplitter,
    n_samples: usize,
    origin: usize,
}

impl Iterator for Splits {
    type Item = Fold;

    fn next(&mut self) -> Option<Fold> {
        let s = &self.splitter;
        let train_end = self.origin + s.train_size;
        let val_end = train_end + s.val_size;
        let test_end = val_end + s.test_size;

        if test_end > self.n_samples {
            return None;
        }

        let train_start = if s.expanding { 0 } else { self.origin };
        let fold = Fold {
            train: train_start..train_end,
            validation: train_end..val_end,
            test: val_end..test_end,
        };

        self.origin += s.step_size;
        if s.step_size == 0 {
            // A zero step would repeat the same fold forever.
            self.n_samples = 0;
        }
        Some(fold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_count_exact() {
        // Origins 0 and 10 fit; origin 20 gives test_end = 110 > 100.
        let splitter = WalkForwardSplitter::new(50, 20, 20, 10);
        let folds: Vec<Fold> = splitter.splits(100).collect();
        assert_eq!(folds.len(), 2);

        assert_eq!(folds[0].train, 0..50);
        assert_eq!(folds[0].validation, 50..70);
        assert_eq!(folds[0].test, 70..90);

        assert_eq!(folds[1].train, 10..60);
        assert_eq!(folds[1].validation, 60..80);
        assert_eq!(folds[1].test, 80..100);
    }

    #[test]
    fn test_expanding_train_grows_from_zero() {
        let splitter = WalkForwardSplitter::new(50, 20, 20, 10).with_expanding();
        let folds: Vec<Fold> = splitter.splits(100).collect();
        assert_eq!(folds.len(), 2);
        assert_eq!(folds[0].train, 0..50);
        assert_eq!(folds[1].train, 0..60);
    }

    #[test]
    fn test_chronological_ordering() {
        let splitter = WalkForwardSplitter::default();
        for fold in splitter.splits(500) {
            assert!(fold.train.end <= fold.validation.start);
            assert!(fold.validation.end <= fold.test.start);
            assert!(fold.train.start < fold.train.end);
            assert!(fold.validation.start < fold.validation.end);
            assert!(fold.test.start < fold.test.end);
        }
    }

    #[test]
    fn test_insufficient_data_yields_empty_sequence() {
        let splitter = WalkForwardSplitter::new(50, 20, 20, 10);
        assert_eq!(splitter.splits(89).count(), 0);
        assert_eq!(splitter.splits(0).count(), 0);
    }

    #[test]
    fn test_splits_are_restartable() {
        let splitter = WalkForwardSplitter::new(50, 20, 20, 10);
        let first: Vec<Fold> = splitter.splits(100).collect();
        let second: Vec<Fold> = splitter.splits(100).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_step_folds() {
        let folds = WalkForwardSplitter::single_step_folds(250, 10).unwrap();
        assert_eq!(folds.len(), 10);
        assert_eq!(folds[0].train, 0..240);
        assert_eq!(folds[0].test, 240..241);
        assert_eq!(folds[9].test, 249..250);
        // Every fold trains on all data strictly before its test index
        for fold in &folds {
            assert_eq!(fold.train.end, fold.test.start);
            assert!(fold.validation.is_empty());
        }
    }

    #[test]
    fn test_single_step_preconditions() {
        assert!(matches!(
            WalkForwardSplitter::single_step_folds(150, 20),
            Err(ForecastError::InsufficientData { needed: 200, .. })
        ));
        assert!(matches!(
            WalkForwardSplitter::single_step_folds(250, 5),
            Err(ForecastError::InsufficientData { needed: 10, .. })
        ));
    }
}
