//! Shared performance statistics.
//!
//! Every statistic here is a pure function of a return or equity series.
//! Degenerate cases (zero variance, empty downside, zero elapsed time) are
//! reported as NaN so that callers can surface "undefined" instead of a
//! misleading zero or infinity.

/// Arithmetic mean of a series. NaN for an empty series.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation of a series. NaN for an empty series.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Annualized Sharpe ratio: mean / std * sqrt(periods_per_year).
///
/// NaN when the series is empty or has zero variance.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    let sd = std_dev(returns);
    if returns.is_empty() || sd == 0.0 || !sd.is_finite() {
        return f64::NAN;
    }
    mean(returns) / sd * periods_per_year.sqrt()
}

/// Annualized Sortino ratio: mean over all returns, deviation over the
/// negative subset only.
///
/// NaN when there are no negative periods or their deviation is zero.
pub fn sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if downside.is_empty() {
        return f64::NAN;
    }
    let downside_dev = std_dev(&downside);
    if downside_dev == 0.0 || !downside_dev.is_finite() {
        return f64::NAN;
    }
    mean(returns) / downside_dev * periods_per_year.sqrt()
}

/// Maximum peak-to-trough drawdown of an equity curve, as a fraction of the
/// peak, together with its duration in periods (distance from the running
/// peak that precedes the trough to the trough itself).
///
/// A monotonically increasing curve yields exactly (0.0, 0). An empty curve
/// yields (NaN, 0).
pub fn max_drawdown(equity: &[f64]) -> (f64, usize) {
    if equity.is_empty() {
        return (f64::NAN, 0);
    }

    let mut peak = equity[0];
    let mut peak_idx = 0usize;
    let mut max_dd = 0.0_f64;
    let mut duration = 0usize;

    for (i, &e) in equity.iter().enumerate() {
        if e > peak {
            peak = e;
            peak_idx = i;
        }
        let dd = if peak > 0.0 { (peak - e) / peak } else { 0.0 };
        if dd > max_dd {
            max_dd = dd;
            duration = i - peak_idx;
        }
    }

    (max_dd, duration)
}

/// Compound annual growth rate from an initial and final equity over a span
/// of calendar days, using 365.25-day years.
///
/// NaN when the elapsed span is not positive.
pub fn cagr(initial: f64, final_equity: f64, days_elapsed: f64) -> f64 {
    if days_elapsed <= 0.0 || initial <= 0.0 {
        return f64::NAN;
    }
    (final_equity / initial).powf(365.25 / days_elapsed) - 1.0
}

/// Pearson correlation between two aligned series.
///
/// NaN when the series are empty, differ in length, or either has zero
/// variance.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.is_empty() || xs.len() != ys.len() {
        return f64::NAN;
    }
    let mx = mean(xs);
    let my = mean(ys);
    let n = xs.len() as f64;

    let covariance = xs
        .iter()
        .zip(ys.iter())
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>()
        / n;
    let sx = std_dev(xs);
    let sy = std_dev(ys);

    if sx == 0.0 || sy == 0.0 || !sx.is_finite() || !sy.is_finite() {
        return f64::NAN;
    }
    covariance / (sx * sy)
}

/// Root mean squared error between truth and predictions.
pub fn rmse(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() || truth.len() != predicted.len() {
        return f64::NAN;
    }
    let mse = truth
        .iter()
        .zip(predicted.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / truth.len() as f64;
    mse.sqrt()
}

/// Mean absolute error between truth and predictions.
pub fn mae(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() || truth.len() != predicted.len() {
        return f64::NAN;
    }
    truth
        .iter()
        .zip(predicted.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / truth.len() as f64
}

/// Directional accuracy: fraction of consecutive steps where the predicted
/// change has the same sign as the realized change. 0.0 when fewer than two
/// points are available.
pub fn directional_accuracy(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.len() < 2 || truth.len() != predicted.len() {
        return 0.0;
    }
    let hits = truth
        .windows(2)
        .zip(predicted.windows(2))
        .filter(|(t, p)| (t[1] - t[0]).signum() == (p[1] - p[0]).signum())
        .count();
    hits as f64 / (truth.len() - 1) as f64
}
