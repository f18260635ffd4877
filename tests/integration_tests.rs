//! Integration tests for the forecasting and backtesting engine.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;
use std::io::Write;

use kestrel::backtest::{BacktestConfig, Backtester};
use kestrel::data::{load_csv, DataConfig, DataManager};
use kestrel::ensemble::EnsembleCombiner;
use kestrel::features::FeatureTable;
use kestrel::forecast::{
    collect_forecasts, ArtifactStore, ForecastProvider, ForecastResult, NaiveForecaster,
    SmaForecaster,
};
use kestrel::portfolio::{PortfolioBacktester, PortfolioConfig};
use kestrel::types::{Bar, DailySignal, TickerSignal};
use kestrel::walkforward::WalkForwardSplitter;

/// Synthetic daily bars with a gentle trend and deterministic noise.
fn create_synthetic_bars(days: usize, initial_price: f64, daily_return: f64) -> Vec<Bar> {
    let mut bars = Vec::with_capacity(days);
    let mut price = initial_price;

    for i in 0..days {
        let noise = ((i as f64 * 0.7).sin() * 2.0 + (i as f64 * 1.3).cos()) * 0.3;
        price = (price * (1.0 + daily_return) + noise).max(1.0);

        let open = price - 0.5;
        let close = price;
        let high = (price + 1.5 + noise.abs()).max(open).max(close);
        let low = (price - 1.5 - noise.abs()).min(open).min(close);

        bars.push(Bar::new(
            Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap() + Duration::days(i as i64),
            open,
            high,
            low,
            close,
            1_000_000.0,
        ));
    }

    bars
}

/// Derive long/flat backtest signals from a predicted close path: the
/// probability is 1 when the next predicted close is above the previous
/// value, 0 otherwise.
fn signals_from_predictions(
    predictions: &[f64],
    last_close: f64,
    realized_returns: &[f64],
) -> Vec<DailySignal> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let mut prev = last_close;
    predictions
        .iter()
        .zip(realized_returns.iter())
        .enumerate()
        .map(|(i, (&pred, &ret))| {
            let prob = if pred > prev { 1.0 } else { 0.0 };
            prev = pred;
            DailySignal::new(start + Duration::days(i as i64), prob, ret)
        })
        .collect()
}

#[test]
fn test_csv_to_backtest_pipeline() {
    // Write bars out as CSV, load them back, engineer features, and run a
    // backtest on a threshold signal derived from the feature table.
    let bars = create_synthetic_bars(120, 100.0, 0.002);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
    for bar in &bars {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            bar.timestamp.format("%Y-%m-%d"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        )
        .unwrap();
    }
    file.flush().unwrap();

    let loaded = load_csv(file.path(), &DataConfig::default()).unwrap();
    assert_eq!(loaded.len(), bars.len());

    let table = FeatureTable::from_bars(&loaded).unwrap();
    assert!(!table.is_empty());

    // Signal: probability of an up day from the return feature sign.
    let return_idx = table.columns.iter().position(|c| c == "return").unwrap();
    let signals: Vec<DailySignal> = table
        .rows
        .iter()
        .zip(table.dates.iter())
        .zip(table.targets.iter().zip(table.closes.iter()))
        .map(|((row, &date), (&target, &close))| {
            let prob = if row[return_idx] > 0.0 { 0.8 } else { 0.2 };
            DailySignal::new(date, prob, target / close - 1.0)
        })
        .collect();

    let report = Backtester::new(BacktestConfig::default())
        .run(&signals)
        .unwrap();
    assert_eq!(report.equity_curve.len(), signals.len() + 1);
    assert!(report.metrics.turnover >= 0.0);
}

#[test]
fn test_provider_to_ensemble_to_backtest_flow() {
    let bars = create_synthetic_bars(250, 100.0, 0.001);
    let dir = tempfile::TempDir::new().unwrap();
    let store = ArtifactStore::new(dir.path()).unwrap();

    let mut data = DataManager::new();
    data.add("TEST", bars.clone());

    let naive = NaiveForecaster::new(data.clone(), store.clone());
    naive.fit("TEST").unwrap();
    let sma = SmaForecaster::new(data, store);
    sma.fit("TEST").unwrap();

    let providers: Vec<Box<dyn ForecastProvider>> = vec![Box::new(naive), Box::new(sma)];
    let results = collect_forecasts(&providers, "TEST", 10);
    assert_eq!(results.len(), 2);

    let ensemble = EnsembleCombiner::new().combine(&results, 10).unwrap();
    assert_eq!(ensemble.predictions.len(), 10);
    let weight_sum: f64 = ensemble.weights.values().sum();
    assert!((weight_sum - 1.0).abs() < 1e-9);
    assert!(ensemble.intervals.iter().all(|(low, high)| low <= high));
}

#[test]
fn test_ensemble_of_one_is_identity_through_backtest() {
    // Round-trip property: a single model fed directly into the backtester
    // and through the combiner first produces identical equity curves.
    let bars = create_synthetic_bars(250, 100.0, 0.001);
    let dir = tempfile::TempDir::new().unwrap();
    let store = ArtifactStore::new(dir.path()).unwrap();

    let mut data = DataManager::new();
    data.add("TEST", bars.clone());
    let model = NaiveForecaster::new(data, store);
    model.fit("TEST").unwrap();

    let direct: ForecastResult = model.predict("TEST", 10).unwrap();
    let mut results = BTreeMap::new();
    results.insert("naive".to_string(), direct.clone());
    let ensemble = EnsembleCombiner::new().combine(&results, 10).unwrap();

    let last_close = bars.last().unwrap().close;
    let realized = vec![0.004; 10];

    let direct_signals = signals_from_predictions(&direct.predictions, last_close, &realized);
    let ensemble_signals =
        signals_from_predictions(&ensemble.predictions, last_close, &realized);

    let backtester = Backtester::new(BacktestConfig::default());
    let direct_report = backtester.run(&direct_signals).unwrap();
    let ensemble_report = backtester.run(&ensemble_signals).unwrap();

    for (a, b) in direct_report
        .equity_curve
        .iter()
        .zip(ensemble_report.equity_curve.iter())
    {
        assert!((a.equity - b.equity).abs() < 1e-9);
    }
}

#[test]
fn test_walkforward_splits_cover_spec_example() {
    let splitter = WalkForwardSplitter::new(50, 20, 20, 10);
    let folds: Vec<_> = splitter.splits(100).collect();
    assert_eq!(folds.len(), 2);
    for fold in &folds {
        assert!(fold.train.end <= fold.validation.start);
        assert!(fold.validation.end <= fold.test.start);
    }
}

#[test]
fn test_portfolio_end_to_end_with_benchmarks() {
    let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let tickers = ["AAA", "BBB", "CCC", "DDD"];
    let mut signals = Vec::new();
    for week in 0..8 {
        for (t, ticker) in tickers.iter().enumerate() {
            let prob = 0.3 + 0.1 * t as f64 + if week % 2 == 0 { 0.05 } else { 0.0 };
            let ret = 0.002 * (t as f64 + 1.0) * if week % 3 == 2 { -1.0 } else { 1.0 };
            signals.push(TickerSignal::new(
                monday + Duration::days(7 * week),
                *ticker,
                prob,
                ret,
            ));
        }
    }

    let bench: Vec<(NaiveDate, f64)> = (0..8)
        .map(|w| (monday + Duration::days(7 * w), 0.001 * (w % 3) as f64))
        .collect();

    let config = PortfolioConfig {
        top_k: 2,
        ..Default::default()
    };
    let report = PortfolioBacktester::new(config)
        .with_benchmark(bench)
        .with_cap_weights(vec![
            ("AAA".to_string(), 100.0),
            ("BBB".to_string(), 200.0),
            ("CCC".to_string(), 300.0),
            ("DDD".to_string(), 400.0),
        ])
        .run(&signals)
        .unwrap();

    assert_eq!(report.periods.len(), 8);
    assert!(report.cap_weight_curve.is_some());
    assert!(report.benchmark_curve.is_some());
    assert!(report.metrics.benchmark_correlation.is_finite());
    // DDD always has the highest probability, CCC second.
    assert_eq!(report.periods[0].holdings, vec!["DDD", "CCC"]);
    // Stable selection means later periods trade nothing.
    assert!(report.periods[1..].iter().all(|p| p.turnover == 0.0));
}

#[test]
fn test_walkforward_evaluation_against_provider() {
    let bars = create_synthetic_bars(320, 100.0, 0.001);
    let table = FeatureTable::from_bars(&bars).unwrap();

    let evaluation =
        kestrel::forecast::walkforward_evaluation("TEST", &table, 20, |_rows, targets, _row| {
            *targets.last().unwrap()
        })
        .unwrap();

    assert_eq!(evaluation.ticker, "TEST");
    assert!(evaluation.test_metrics.rmse.is_finite());
    assert!(evaluation.baseline.naive.rmse.is_finite());
    assert!(evaluation.baseline.sma5.mae.is_finite());
}

#[test]
fn test_config_file_drives_backtester() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [backtest]
        initial_capital = 25000.0
        threshold = 0.4

        [portfolio]
        top_k = 3
        "#
    )
    .unwrap();
    file.flush().unwrap();

    let config = kestrel::load_config(file.path()).unwrap();
    let backtest_config = config.backtest.to_config();
    assert!((backtest_config.initial_capital - 25_000.0).abs() < f64::EPSILON);

    let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let signals: Vec<DailySignal> = (0..30)
        .map(|i| {
            DailySignal::new(
                start + Duration::days(i),
                0.45 + 0.1 * ((i % 3) as f64 - 1.0),
                0.002 * ((i % 4) as f64 - 1.5),
            )
        })
        .collect();

    let report = Backtester::new(backtest_config).run(&signals).unwrap();
    assert!((report.equity_curve[0].equity - 25_000.0).abs() < f64::EPSILON);
    assert_eq!(config.portfolio.to_config().top_k, 3);
}
