//! Terminal reporting for backtest results.
//!
//! Builds compact summary tables (with gains in green, losses in red) and
//! unicode sparklines for equity curves.

use crate::backtest::BacktestReport;
use crate::portfolio::PortfolioReport;
use colored::Colorize;
use tabled::{builder::Builder, settings::Style};

/// Characters used for sparkline rendering, ordered from low to high.
const SPARKLINE_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Generate a unicode sparkline from a slice of values.
pub fn sparkline(values: &[f64], width: usize) -> String {
    if values.is_empty() || width == 0 {
        return String::new();
    }

    let sampled = if values.len() > width {
        downsample(values, width)
    } else {
        values.to_vec()
    };

    let min_val = sampled.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_val = sampled.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max_val - min_val;

    sampled
        .iter()
        .map(|&v| {
            let normalized = if range > 0.0 {
                ((v - min_val) / range).clamp(0.0, 1.0)
            } else {
                0.5
            };
            let idx = ((normalized * 7.0).round() as usize).min(7);
            SPARKLINE_CHARS[idx]
        })
        .collect()
}

/// Reduce a series to `width` points by averaging buckets.
fn downsample(values: &[f64], width: usize) -> Vec<f64> {
    let bucket_size = values.len() as f64 / width as f64;
    (0..width)
        .map(|i| {
            let start = (i as f64 * bucket_size) as usize;
            let end = (((i + 1) as f64 * bucket_size) as usize).min(values.len());
            let bucket = &values[start..end.max(start + 1)];
            bucket.iter().sum::<f64>() / bucket.len() as f64
        })
        .collect()
}

fn fmt_pct(value: f64) -> String {
    if value.is_nan() {
        return "n/a".dimmed().to_string();
    }
    let formatted = format!("{:+.2}%", value * 100.0);
    if value >= 0.0 {
        formatted.green().to_string()
    } else {
        formatted.red().to_string()
    }
}

fn fmt_ratio(value: f64) -> String {
    if value.is_nan() {
        "n/a".dimmed().to_string()
    } else {
        format!("{:.2}", value)
    }
}

/// Render a single-asset backtest report as a summary table.
pub fn backtest_summary(report: &BacktestReport) -> String {
    let m = &report.metrics;
    let mut builder = Builder::default();
    builder.push_record(["Metric".to_string(), "Value".to_string()]);
    builder.push_record(["Total return".to_string(), fmt_pct(m.total_return)]);
    builder.push_record(["CAGR".to_string(), fmt_pct(m.cagr)]);
    builder.push_record(["Sharpe".to_string(), fmt_ratio(m.sharpe)]);
    builder.push_record(["Sortino".to_string(), fmt_ratio(m.sortino)]);
    builder.push_record(["Max drawdown".to_string(), fmt_pct(-m.max_drawdown)]);
    builder.push_record([
        "Drawdown duration".to_string(),
        format!("{} periods", m.drawdown_duration),
    ]);
    builder.push_record(["Win rate".to_string(), fmt_ratio(m.win_rate)]);
    builder.push_record(["Trades".to_string(), m.n_trades.to_string()]);
    builder.push_record(["Turnover".to_string(), fmt_ratio(m.turnover)]);
    builder.push_record([
        "Buy & hold return".to_string(),
        fmt_pct(m.benchmark_total_return),
    ]);

    let equity: Vec<f64> = report.equity_curve.iter().map(|p| p.equity).collect();
    let mut table = builder.build();
    table.with(Style::rounded());
    format!("{}\nEquity: {}", table, sparkline(&equity, 40))
}

/// Render a portfolio backtest report as a summary table.
pub fn portfolio_summary(report: &PortfolioReport) -> String {
    let m = &report.metrics;
    let mut builder = Builder::default();
    builder.push_record(["Metric".to_string(), "Value".to_string()]);
    builder.push_record(["Total return".to_string(), fmt_pct(m.total_return)]);
    builder.push_record(["CAGR".to_string(), fmt_pct(m.cagr)]);
    builder.push_record(["Sharpe".to_string(), fmt_ratio(m.sharpe)]);
    builder.push_record(["Volatility".to_string(), fmt_pct(m.volatility)]);
    builder.push_record(["Avg turnover".to_string(), fmt_ratio(m.avg_turnover)]);
    builder.push_record(["Avg cost drag".to_string(), fmt_pct(m.avg_cost_drag)]);
    builder.push_record([
        "Benchmark corr".to_string(),
        fmt_ratio(m.benchmark_correlation),
    ]);
    builder.push_record(["Periods".to_string(), report.periods.len().to_string()]);

    let equity: Vec<f64> = report.equity_curve.iter().map(|p| p.equity).collect();
    let mut table = builder.build();
    table.with(Style::rounded());
    format!("{}\nEquity: {}", table, sparkline(&equity, 40))
}
