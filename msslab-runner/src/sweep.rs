//! Parameter sweeps over one bar series.
//!
//! Each configuration runs in its own `Simulation` with its own equity,
//! ledger and detector state; rayon spreads the runs across threads. Nothing
//! is shared between runs except the read-only bar slice.

use rayon::prelude::*;
use serde::Serialize;

use msslab_core::domain::Bar;
use msslab_core::engine::{run_simulation, EngineConfig, EngineError, RunResult};

/// Grid of detector/indicator parameters to sweep.
#[derive(Debug, Clone)]
pub struct ParamGrid {
    pub ema_fast: Vec<usize>,
    pub ema_slow: Vec<usize>,
    pub swing_lookback: Vec<usize>,
    pub min_rr: Vec<f64>,
}

impl ParamGrid {
    /// Single-point grid holding the base config's values.
    pub fn from_base(base: &EngineConfig) -> Self {
        Self {
            ema_fast: vec![base.indicators.ema_fast],
            ema_slow: vec![base.indicators.ema_slow],
            swing_lookback: vec![base.indicators.swing_lookback],
            min_rr: vec![base.risk.min_rr],
        }
    }

    /// Upper bound on the number of configurations (before skipping fast >= slow).
    pub fn size(&self) -> usize {
        self.ema_fast.len() * self.ema_slow.len() * self.swing_lookback.len() * self.min_rr.len()
    }

    /// All grid points applied to `base`, skipping fast >= slow.
    ///
    /// `rr_target` is raised to `min_rr` when it would fall below it.
    pub fn generate_configs(&self, base: &EngineConfig) -> Vec<EngineConfig> {
        let mut configs = Vec::new();
        for &fast in &self.ema_fast {
            for &slow in &self.ema_slow {
                if fast >= slow {
                    continue;
                }
                for &k in &self.swing_lookback {
                    for &min_rr in &self.min_rr {
                        let mut cfg = base.clone();
                        cfg.indicators.ema_fast = fast;
                        cfg.indicators.ema_slow = slow;
                        cfg.indicators.swing_lookback = k;
                        cfg.risk.min_rr = min_rr;
                        cfg.risk.rr_target = cfg.risk.rr_target.max(min_rr);
                        configs.push(cfg);
                    }
                }
            }
        }
        configs
    }
}

/// Run every configuration over the same bars. Results are in input order.
pub fn run_sweep(bars: &[Bar], configs: &[EngineConfig]) -> Vec<Result<RunResult, EngineError>> {
    configs
        .par_iter()
        .map(|cfg| run_simulation(bars, cfg))
        .collect()
}

/// One line of a sweep table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRow {
    pub index: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub swing_lookback: usize,
    pub min_rr: f64,
    pub trades: usize,
    pub win_rate: f64,
    pub net_profit: f64,
    pub max_drawdown: f64,
}

impl SweepRow {
    pub fn new(index: usize, config: &EngineConfig, result: &RunResult) -> Self {
        let trades = result.ledger.trades();
        Self {
            index,
            ema_fast: config.indicators.ema_fast,
            ema_slow: config.indicators.ema_slow,
            swing_lookback: config.indicators.swing_lookback,
            min_rr: config.risk.min_rr,
            trades: trades.len(),
            win_rate: crate::metrics::win_rate(trades),
            net_profit: result.final_capital() - result.initial_capital,
            max_drawdown: result.equity.max_drawdown,
        }
    }
}

/// Sweep table sorted by net profit, best first. Failed runs are logged and skipped.
pub fn rank_by_net_profit(
    configs: &[EngineConfig],
    results: &[Result<RunResult, EngineError>],
) -> Vec<SweepRow> {
    let mut rows: Vec<SweepRow> = configs
        .iter()
        .zip(results)
        .enumerate()
        .filter_map(|(i, (cfg, res))| match res {
            Ok(result) => Some(SweepRow::new(i, cfg, result)),
            Err(e) => {
                tracing::warn!(index = i, error = %e, "sweep run failed");
                None
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.net_profit
            .partial_cmp(&a.net_profit)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    rows
}
