//! Sweep isolation and report invariants on random-walk series.

use chrono::{Duration, TimeZone, Utc};
use msslab_core::domain::Bar;
use msslab_core::engine::{run_simulation, EngineConfig};
use msslab_core::session::SessionWindow;
use msslab_runner::config::BacktestConfig;
use msslab_runner::sweep::rank_by_net_profit;
use msslab_runner::{run_on_bars, run_sweep, ParamGrid, PerformanceReport, ReturnSampling};
use proptest::prelude::*;

/// Deterministic LCG random walk with small wicks.
fn random_walk(seed: u64, n: usize) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
    };
    let mut price = 1.1000;
    (0..n)
        .map(|i| {
            let open = price;
            let close = open + next() * 0.0008;
            let high = open.max(close) + next().abs() * 0.0004;
            let low = open.min(close) - next().abs() * 0.0004;
            price = close;
            Bar {
                timestamp: start + Duration::minutes(i as i64),
                open,
                high,
                low,
                close,
                volume: None,
            }
        })
        .collect()
}

fn fast_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.indicators.ema_fast = 8;
    cfg.indicators.ema_slow = 34;
    cfg.indicators.swing_lookback = 2;
    cfg.session = SessionWindow::always_open();
    cfg.history.enabled = false;
    cfg
}

#[test]
fn sweep_results_match_sequential_runs_in_order() {
    let bars = random_walk(7, 3_000);
    let grid = ParamGrid {
        ema_fast: vec![5, 8],
        ema_slow: vec![21, 34],
        swing_lookback: vec![2, 3],
        min_rr: vec![1.5, 2.0],
    };
    let configs = grid.generate_configs(&fast_config());
    assert_eq!(configs.len(), 16);

    let parallel = run_sweep(&bars, &configs);
    assert_eq!(parallel.len(), configs.len());
    for (cfg, res) in configs.iter().zip(&parallel) {
        let sequential = run_simulation(&bars, cfg).unwrap();
        let res = res.as_ref().unwrap();
        assert_eq!(res.ledger, sequential.ledger);
        assert_eq!(res.stats, sequential.stats);
    }

    let rows = rank_by_net_profit(&configs, &parallel);
    assert_eq!(rows.len(), configs.len());
    for pair in rows.windows(2) {
        assert!(pair[0].net_profit >= pair[1].net_profit);
    }
}

#[test]
fn daily_sampling_changes_only_the_ratios() {
    let bars = random_walk(11, 6_000);
    let mut cfg = BacktestConfig {
        engine: fast_config(),
        ..BacktestConfig::default()
    };
    let per_trade = run_on_bars(&cfg, &bars, None).unwrap();
    cfg.report.annualization.sampling = ReturnSampling::Daily;
    let daily = run_on_bars(&cfg, &bars, None).unwrap();

    assert_eq!(per_trade.report.total_trades, daily.report.total_trades);
    assert_eq!(per_trade.report.net_profit, daily.report.net_profit);
    assert_eq!(per_trade.report.max_drawdown, daily.report.max_drawdown);
    assert_ne!(per_trade.run_id, daily.run_id);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn report_agrees_with_engine_state(seed in any::<u64>(), n in 200usize..1_500) {
        let bars = random_walk(seed, n);
        let cfg = BacktestConfig { engine: fast_config(), ..BacktestConfig::default() };
        let run = run_on_bars(&cfg, &bars, None).unwrap();
        let r: &PerformanceReport = &run.report;

        let pnl_sum: f64 = run.result.ledger.trades().iter().map(|t| t.pnl).sum();
        let tol = 1e-6 * r.initial_capital;
        prop_assert!((r.final_capital - (r.initial_capital + pnl_sum)).abs() < tol);
        prop_assert!((r.final_capital - run.result.final_capital()).abs() < tol);
        prop_assert!(r.max_drawdown >= 0.0);
        prop_assert!((r.max_drawdown - run.result.equity.max_drawdown).abs() < tol);
        prop_assert_eq!(r.wins + r.losses, r.total_trades);
        prop_assert_eq!(r.rr_distribution.iter().map(|b| b.count).sum::<usize>(), r.total_trades);
        prop_assert_eq!(r.stop_distribution.iter().map(|b| b.count).sum::<usize>(), r.total_trades);
        prop_assert_eq!(r.forensics.losing_trades, r.losses);
        prop_assert_eq!(r.forensics.analyzed() + r.forensics.skipped, r.losses);
        for ratio in [r.sharpe, r.sortino, r.calmar, r.profit_factor].into_iter().flatten() {
            prop_assert!(ratio.is_finite());
        }
    }
}
