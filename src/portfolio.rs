//! Multi-asset portfolio backtest with weekly top-K rebalancing.
//!
//! Each rebalancing period the backtester ranks all active tickers by
//! predicted probability, longs the top K at equal weight, charges turnover
//! costs on the weight changes, and compounds the net returns into an equity
//! curve. Equal-weight and (optionally) cap-weight benchmark books are
//! simulated in parallel with identical period semantics.

use crate::error::{ForecastError, Result};
use crate::metadata::{compute_config_hash, generate_experiment_id};
use crate::metrics::{cagr, mean, pearson_correlation, sharpe_ratio, std_dev};
use crate::types::{EquityPoint, TickerSignal};
use crate::validation::validate_ticker_signals;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::info;
use uuid::Uuid;

const WEEKS_PER_YEAR: f64 = 52.0;

/// Configuration for a multi-asset portfolio backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Number of tickers to long each rebalancing period.
    pub top_k: usize,
    /// Starting capital.
    pub initial_capital: f64,
    /// Transaction cost per unit of turnover, as a return fraction.
    pub cost: f64,
    /// Slippage per unit of turnover, as a return fraction.
    pub slippage: f64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            initial_capital: 10_000.0,
            cost: 0.0005,
            slippage: 0.0002,
        }
    }
}

/// Portfolio-level performance metrics. Degenerate statistics are NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub total_return: f64,
    pub cagr: f64,
    /// Annualized with sqrt(52) for weekly periods.
    pub sharpe: f64,
    /// Annualized standard deviation of net period returns.
    pub volatility: f64,
    pub avg_turnover: f64,
    pub avg_cost_drag: f64,
    /// Pearson correlation of net returns with the supplied benchmark.
    /// NaN when no benchmark was supplied.
    pub benchmark_correlation: f64,
}

/// One rebalancing period's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceRecord {
    /// ISO week start (Monday) of the period.
    pub week_start: NaiveDate,
    pub net_return: f64,
    pub turnover: f64,
    pub cost_drag: f64,
    /// Tickers held this period, in selection order.
    pub holdings: Vec<String>,
}

/// Results of a portfolio backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub config: PortfolioConfig,
    pub metrics: PortfolioMetrics,
    pub periods: Vec<RebalanceRecord>,
    /// Strategy equity, starting at `initial_capital`.
    pub equity_curve: Vec<EquityPoint>,
    /// Equal weight across all active tickers each period, no costs.
    pub equal_weight_curve: Vec<EquityPoint>,
    /// Cap-weighted book, present when cap weights were supplied.
    pub cap_weight_curve: Option<Vec<EquityPoint>>,
    /// Supplied benchmark compounded over the same periods.
    pub benchmark_curve: Option<Vec<EquityPoint>>,
    pub experiment_id: Uuid,
    pub config_hash: String,
}

/// Per-period aggregated view of one ticker: the latest forecast before the
/// rebalance and the compounded realized return within the period.
#[derive(Debug, Clone)]
struct PeriodEntry {
    predicted_prob: f64,
    compound_return: f64,
}

/// Weekly top-K long-only portfolio simulator.
pub struct PortfolioBacktester {
    config: PortfolioConfig,
    benchmark_returns: Option<BTreeMap<NaiveDate, f64>>,
    cap_weights: Option<BTreeMap<String, f64>>,
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

impl PortfolioBacktester {
    /// Create a new portfolio backtester.
    pub fn new(config: PortfolioConfig) -> Self {
        Self {
            config,
            benchmark_returns: None,
            cap_weights: None,
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(PortfolioConfig::default())
    }

    /// Supply a benchmark return series. Dates are normalized to their ISO
    /// week start; weeks missing from the series read as zero return.
    pub fn with_benchmark(
        mut self,
        returns: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        self.benchmark_returns = Some(
            returns
                .into_iter()
                .map(|(date, r)| (week_start(date), r))
                .collect(),
        );
        self
    }

    /// Supply static market-cap weights for the cap-weighted benchmark book.
    pub fn with_cap_weights(mut self, caps: impl IntoIterator<Item = (String, f64)>) -> Self {
        self.cap_weights = Some(caps.into_iter().collect());
        self
    }

    /// Run the simulation over per-ticker signal rows.
    pub fn run(&self, signals: &[TickerSignal]) -> Result<PortfolioReport> {
        if self.config.top_k == 0 {
            return Err(ForecastError::ConfigError(
                "top_k must be at least 1".to_string(),
            ));
        }
        if signals.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: 1,
                actual: 0,
            });
        }
        validate_ticker_signals(signals)?;

        let weeks = self.group_by_week(signals);
        let cfg = &self.config;
        let per_unit_drag = cfg.cost + cfg.slippage;

        let mut periods = Vec::with_capacity(weeks.len());
        let mut eqw_returns = Vec::with_capacity(weeks.len());
        let mut cap_returns = Vec::with_capacity(weeks.len());
        let mut bench_returns = Vec::with_capacity(weeks.len());
        let mut prev_weights: HashMap<String, f64> = HashMap::new();

        let total_cap: f64 = self
            .cap_weights
            .as_ref()
            .map(|caps| caps.values().sum())
            .unwrap_or(0.0);

        for (&start, entries) in &weeks {
            // Stable descending sort over entries already ordered by ticker:
            // ties go to whichever ticker sorts first, reproducibly.
            let mut ranked: Vec<(&String, &PeriodEntry)> = entries.iter().collect();
            ranked.sort_by(|a, b| {
                b.1.predicted_prob
                    .partial_cmp(&a.1.predicted_prob)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let selected = &ranked[..ranked.len().min(cfg.top_k)];
            let weight = 1.0 / cfg.top_k as f64;
            let weights: HashMap<String, f64> = selected
                .iter()
                .map(|(ticker, _)| ((*ticker).clone(), weight))
                .collect();

            let gross: f64 = selected
                .iter()
                .map(|(_, entry)| weight * entry.compound_return)
                .sum();

            let turnover: f64 = weights
                .keys()
                .chain(prev_weights.keys())
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .map(|ticker| {
                    let current = weights.get(ticker).copied().unwrap_or(0.0);
                    let previous = prev_weights.get(ticker).copied().unwrap_or(0.0);
                    (current - previous).abs()
                })
                .sum();

            let cost_drag = turnover * per_unit_drag;
            let net_return = gross - cost_drag;

            // Equal-weight benchmark across all active tickers.
            let eqw = mean(
                &entries
                    .values()
                    .map(|e| e.compound_return)
                    .collect::<Vec<f64>>(),
            );
            eqw_returns.push(eqw);

            // Cap-weight benchmark, normalized by the total of all supplied
            // caps.
            if let Some(caps) = &self.cap_weights {
                let cap_ret: f64 = if total_cap > 0.0 {
                    entries
                        .iter()
                        .map(|(ticker, e)| {
                            caps.get(ticker).copied().unwrap_or(0.0) / total_cap
                                * e.compound_return
                        })
                        .sum()
                } else {
                    0.0
                };
                cap_returns.push(cap_ret);
            }

            if let Some(bench) = &self.benchmark_returns {
                bench_returns.push(bench.get(&start).copied().unwrap_or(0.0));
            }

            periods.push(RebalanceRecord {
                week_start: start,
                net_return,
                turnover,
                cost_drag,
                holdings: selected
                    .iter()
                    .map(|(ticker, _)| (*ticker).clone())
                    .collect(),
            });

            prev_weights = weights;
        }

        let net_returns: Vec<f64> = periods.iter().map(|p| p.net_return).collect();
        let first_week = periods[0].week_start;
        let dates: Vec<NaiveDate> = periods.iter().map(|p| p.week_start).collect();

        let equity_curve = compound_curve(first_week, &dates, &net_returns, cfg.initial_capital)?;
        let equal_weight_curve =
            compound_curve(first_week, &dates, &eqw_returns, cfg.initial_capital)?;
        let cap_weight_curve = if self.cap_weights.is_some() {
            Some(compound_curve(
                first_week,
                &dates,
                &cap_returns,
                cfg.initial_capital,
            )?)
        } else {
            None
        };
        let benchmark_curve = if self.benchmark_returns.is_some() {
            Some(compound_curve(
                first_week,
                &dates,
                &bench_returns,
                cfg.initial_capital,
            )?)
        } else {
            None
        };

        let final_equity = equity_curve.last().map(|p| p.equity).unwrap_or(0.0);
        let days_elapsed =
            (periods[periods.len() - 1].week_start - first_week).num_days() as f64;
        let benchmark_correlation = if self.benchmark_returns.is_some() {
            pearson_correlation(&net_returns, &bench_returns)
        } else {
            f64::NAN
        };

        let metrics = PortfolioMetrics {
            total_return: final_equity / cfg.initial_capital - 1.0,
            cagr: cagr(cfg.initial_capital, final_equity, days_elapsed),
            sharpe: sharpe_ratio(&net_returns, WEEKS_PER_YEAR),
            volatility: std_dev(&net_returns) * WEEKS_PER_YEAR.sqrt(),
            avg_turnover: mean(&periods.iter().map(|p| p.turnover).collect::<Vec<f64>>()),
            avg_cost_drag: mean(&periods.iter().map(|p| p.cost_drag).collect::<Vec<f64>>()),
            benchmark_correlation,
        };

        info!(
            periods = periods.len(),
            total_return = metrics.total_return,
            avg_turnover = metrics.avg_turnover,
            "portfolio backtest complete"
        );

        Ok(PortfolioReport {
            config: cfg.clone(),
            metrics,
            periods,
            equity_curve,
            equal_weight_curve,
            cap_weight_curve,
            benchmark_curve,
            experiment_id: generate_experiment_id(),
            config_hash: compute_config_hash(cfg),
        })
    }

    /// Group signal rows into rebalancing periods keyed by ISO week start.
    ///
    /// Within a period a ticker keeps its most recent probability (the
    /// latest forecast before the rebalance) and compounds its returns.
    fn group_by_week(
        &self,
        signals: &[TickerSignal],
    ) -> BTreeMap<NaiveDate, BTreeMap<String, PeriodEntry>> {
        let mut sorted: Vec<&TickerSignal> = signals.iter().collect();
        sorted.sort_by(|a, b| (a.date, &a.ticker).cmp(&(b.date, &b.ticker)));

        let mut weeks: BTreeMap<NaiveDate, BTreeMap<String, PeriodEntry>> = BTreeMap::new();
        for signal in sorted {
            let entry = weeks
                .entry(week_start(signal.date))
                .or_default()
                .entry(signal.ticker.clone())
                .or_insert(PeriodEntry {
                    predicted_prob: signal.predicted_prob,
                    compound_return: 0.0,
                });
            entry.predicted_prob = signal.predicted_prob;
            entry.compound_return =
                (1.0 + entry.compound_return) * (1.0 + signal.actual_return) - 1.0;
        }
        weeks
    }
}

/// Compound period returns into an equity curve starting at `initial` the
/// day before the first period.
fn compound_curve(
    first_week: NaiveDate,
    dates: &[NaiveDate],
    returns: &[f64],
    initial: f64,
) -> Result<Vec<EquityPoint>> {
    let start = first_week
        .pred_opt()
        .ok_or_else(|| ForecastError::DataError("period date out of range".to_string()))?;
    let mut curve = Vec::with_capacity(returns.len() + 1);
    curve.push(EquityPoint::new(start, initial));
    let mut equity = initial;
    for (&date, &r) in dates.iter().zip(returns.iter()) {
        equity *= 1.0 + r;
        curve.push(EquityPoint::new(date, equity));
    }
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// One signal per ticker per week across `n_weeks` Mondays.
    fn weekly_signals(rows: &[(&str, f64, f64)], n_weeks: usize) -> Vec<TickerSignal> {
        let monday = date(2024, 1, 1); // a Monday
        let mut signals = Vec::new();
        for w in 0..n_weeks {
            for &(ticker, prob, ret) in rows {
                signals.push(TickerSignal::new(
                    monday + Duration::days(7 * w as i64),
                    ticker,
                    prob,
                    ret,
                ));
            }
        }
        signals
    }

    #[test]
    fn test_week_start_is_monday() {
        assert_eq!(week_start(date(2024, 1, 1)), date(2024, 1, 1)); // Monday
        assert_eq!(week_start(date(2024, 1, 3)), date(2024, 1, 1)); // Wednesday
        assert_eq!(week_start(date(2024, 1, 7)), date(2024, 1, 1)); // Sunday
        assert_eq!(week_start(date(2024, 1, 8)), date(2024, 1, 8)); // next Monday
    }

    #[test]
    fn test_top_k_selection_and_weighting() {
        let rows = [
            ("AAA", 0.9, 0.02),
            ("BBB", 0.8, 0.04),
            ("CCC", 0.1, -0.50),
        ];
        let config = PortfolioConfig {
            top_k: 2,
            cost: 0.0,
            slippage: 0.0,
            ..Default::default()
        };
        let report = PortfolioBacktester::new(config)
            .run(&weekly_signals(&rows, 1))
            .unwrap();

        assert_eq!(report.periods.len(), 1);
        assert_eq!(report.periods[0].holdings, vec!["AAA", "BBB"]);
        // 0.5 * 0.02 + 0.5 * 0.04 = 0.03
        assert!((report.periods[0].net_return - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_stable_tie_break_prefers_first_sorted_ticker() {
        let rows = [("ZZZ", 0.8, 0.01), ("AAA", 0.8, 0.02), ("MMM", 0.8, 0.03)];
        let config = PortfolioConfig {
            top_k: 2,
            ..Default::default()
        };
        let report = PortfolioBacktester::new(config)
            .run(&weekly_signals(&rows, 1))
            .unwrap();
        // Equal probabilities: ticker sort order decides.
        assert_eq!(report.periods[0].holdings, vec!["AAA", "MMM"]);
    }

    #[test]
    fn test_turnover_zero_when_holdings_unchanged() {
        let rows = [("AAA", 0.9, 0.01), ("BBB", 0.8, 0.01), ("CCC", 0.1, 0.01)];
        let config = PortfolioConfig {
            top_k: 2,
            ..Default::default()
        };
        let report = PortfolioBacktester::new(config)
            .run(&weekly_signals(&rows, 3))
            .unwrap();

        // First period buys the book; later periods keep the same set.
        assert!((report.periods[0].turnover - 1.0).abs() < 1e-12);
        for period in &report.periods[1..] {
            assert_eq!(period.turnover, 0.0);
            assert_eq!(period.cost_drag, 0.0);
        }
    }

    #[test]
    fn test_turnover_on_full_rotation() {
        // Week 1 holds AAA, week 2 rotates entirely into BBB.
        let monday = date(2024, 1, 1);
        let signals = vec![
            TickerSignal::new(monday, "AAA", 0.9, 0.01),
            TickerSignal::new(monday, "BBB", 0.1, 0.01),
            TickerSignal::new(monday + Duration::days(7), "AAA", 0.1, 0.01),
            TickerSignal::new(monday + Duration::days(7), "BBB", 0.9, 0.01),
        ];
        let config = PortfolioConfig {
            top_k: 1,
            ..Default::default()
        };
        let report = PortfolioBacktester::new(config).run(&signals).unwrap();
        // Sold 1.0 of AAA, bought 1.0 of BBB.
        assert!((report.periods[1].turnover - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_fewer_active_tickers_than_k_leaves_cash() {
        let rows = [("AAA", 0.9, 0.10)];
        let config = PortfolioConfig {
            top_k: 5,
            cost: 0.0,
            slippage: 0.0,
            ..Default::default()
        };
        let report = PortfolioBacktester::new(config)
            .run(&weekly_signals(&rows, 1))
            .unwrap();
        // Only 1/5 of the book is invested.
        assert!((report.periods[0].net_return - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_daily_rows_aggregate_within_week() {
        let monday = date(2024, 1, 1);
        let signals = vec![
            TickerSignal::new(monday, "AAA", 0.6, 0.01),
            TickerSignal::new(monday + Duration::days(2), "AAA", 0.9, 0.02),
        ];
        let config = PortfolioConfig {
            top_k: 1,
            cost: 0.0,
            slippage: 0.0,
            ..Default::default()
        };
        let report = PortfolioBacktester::new(config).run(&signals).unwrap();
        assert_eq!(report.periods.len(), 1);
        // Compound return over both days.
        let expected = 1.01 * 1.02 - 1.0;
        assert!((report.periods[0].net_return - expected).abs() < 1e-12);
    }

    #[test]
    fn test_benchmark_correlation_and_curves() {
        let rows = [("AAA", 0.9, 0.01), ("BBB", 0.1, -0.01)];
        let monday = date(2024, 1, 1);
        let bench: Vec<(NaiveDate, f64)> = (0..4)
            .map(|w| (monday + Duration::days(7 * w), 0.005))
            .collect();

        let config = PortfolioConfig {
            top_k: 1,
            ..Default::default()
        };
        let report = PortfolioBacktester::new(config)
            .with_benchmark(bench)
            .run(&weekly_signals(&rows, 4))
            .unwrap();

        let bench_curve = report.benchmark_curve.as_ref().unwrap();
        assert_eq!(bench_curve.len(), 5);
        let expected_final = 10_000.0 * 1.005_f64.powi(4);
        assert!((bench_curve.last().unwrap().equity - expected_final).abs() < 1e-6);
        // Constant benchmark returns have zero variance: correlation is NaN.
        assert!(report.metrics.benchmark_correlation.is_nan());
    }

    #[test]
    fn test_no_benchmark_means_nan_correlation() {
        let rows = [("AAA", 0.9, 0.01)];
        let report = PortfolioBacktester::with_defaults()
            .run(&weekly_signals(&rows, 2))
            .unwrap();
        assert!(report.metrics.benchmark_correlation.is_nan());
        assert!(report.benchmark_curve.is_none());
    }

    #[test]
    fn test_cap_weight_benchmark_uses_total_cap() {
        let rows = [("AAA", 0.9, 0.10), ("BBB", 0.1, 0.02)];
        let config = PortfolioConfig {
            top_k: 1,
            cost: 0.0,
            slippage: 0.0,
            ..Default::default()
        };
        let report = PortfolioBacktester::new(config)
            .with_cap_weights(vec![("AAA".to_string(), 300.0), ("BBB".to_string(), 100.0)])
            .run(&weekly_signals(&rows, 1))
            .unwrap();

        let cap_curve = report.cap_weight_curve.as_ref().unwrap();
        // 0.75 * 0.10 + 0.25 * 0.02 = 0.08
        let expected = 10_000.0 * 1.08;
        assert!((cap_curve.last().unwrap().equity - expected).abs() < 1e-6);
    }

    #[test]
    fn test_equal_weight_benchmark_covers_all_active() {
        let rows = [("AAA", 0.9, 0.10), ("BBB", 0.1, -0.10)];
        let config = PortfolioConfig {
            top_k: 1,
            cost: 0.0,
            slippage: 0.0,
            ..Default::default()
        };
        let report = PortfolioBacktester::new(config)
            .run(&weekly_signals(&rows, 1))
            .unwrap();
        // Equal-weight return is the mean of both tickers: 0.
        let eqw_final = report.equal_weight_curve.last().unwrap().equity;
        assert!((eqw_final - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_top_k_is_config_error() {
        let config = PortfolioConfig {
            top_k: 0,
            ..Default::default()
        };
        let result = PortfolioBacktester::new(config).run(&weekly_signals(&[("A", 0.5, 0.0)], 1));
        assert!(matches!(result, Err(ForecastError::ConfigError(_))));
    }
}
