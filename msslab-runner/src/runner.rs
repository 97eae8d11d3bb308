//! Backtest runner: wires together config, data, engine, report and export.
//!
//! Entry points:
//! - `run_backtest()`: loads bars from `[data].path`, seeds history, runs. Used by the CLI.
//! - `run_on_bars()`: takes pre-loaded bars. Used by tests and sweeps.

use std::path::Path;

use thiserror::Error;

use msslab_core::data::DataError;
use msslab_core::domain::Bar;
use msslab_core::engine::{RunResult, Simulation};
use msslab_core::history::HistoryEvaluator;

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_series, DataSummary, LoadedSeries};
use crate::export::{
    history_from_trade_log, read_trade_log, write_artifacts, ArtifactPaths, ExportError, RunSummary,
    SCHEMA_VERSION,
};
use crate::report::PerformanceReport;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),

    #[error("failed to serialize config for fingerprinting: {0}")]
    Fingerprint(#[from] serde_json::Error),

    #[error("no data file configured (set [data].path)")]
    MissingDataPath,
}

/// Everything a completed backtest produced.
#[derive(Debug, Clone)]
pub struct BacktestRun {
    /// BLAKE3 over the serialized engine/report config and the bar data.
    pub run_id: String,
    pub config: BacktestConfig,
    pub result: RunResult,
    pub report: PerformanceReport,
    pub data: Option<DataSummary>,
}

impl BacktestRun {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            schema_version: SCHEMA_VERSION,
            run_id: self.run_id.clone(),
            symbol: self.config.engine.instrument.symbol.clone(),
            bars: self.result.bar_count(),
            first_timestamp: self.result.first_timestamp,
            last_timestamp: self.result.last_timestamp,
            report: self.report.clone(),
            data: self.data.clone(),
        }
    }

    /// Directory name for this run's artifacts: `{symbol}_{run_id prefix}`.
    pub fn artifact_dir_name(&self) -> String {
        let prefix: String = self.run_id.chars().take(12).collect();
        format!("{}_{}", self.config.engine.instrument.symbol, prefix)
    }

    /// Write artifacts under `output_dir/{symbol}_{run_id prefix}/`.
    pub fn save(&self, output_dir: &Path) -> Result<ArtifactPaths, RunError> {
        let dir = output_dir.join(self.artifact_dir_name());
        let paths = write_artifacts(
            &dir,
            &self.summary(),
            self.result.ledger.trades(),
            self.config.engine.instrument.pip_size,
        )?;
        Ok(paths)
    }
}

/// Deterministic fingerprint of a run's inputs.
pub fn fingerprint(config: &BacktestConfig, bars: &[Bar]) -> Result<String, RunError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&serde_json::to_vec(&config.engine)?);
    hasher.update(&serde_json::to_vec(&config.report)?);
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.unwrap_or(f64::NAN).to_le_bytes());
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Load the history seed named by `[history].seed_trade_log`, if any.
pub fn load_history_seed(config: &BacktestConfig) -> Result<Option<HistoryEvaluator>, RunError> {
    let Some(path) = &config.history.seed_trade_log else {
        return Ok(None);
    };
    let rows = read_trade_log(path)?;
    let evaluator = history_from_trade_log(
        &rows,
        config.engine.history.clone(),
        config.engine.instrument.pip_size,
    )?;
    tracing::info!(path = %path.display(), trades = rows.len(), "seeded history from trade log");
    Ok(Some(evaluator))
}

/// Run the simulation over pre-loaded bars and build the report.
pub fn run_on_bars(
    config: &BacktestConfig,
    bars: &[Bar],
    history: Option<HistoryEvaluator>,
) -> Result<BacktestRun, RunError> {
    config.validate()?;
    let run_id = fingerprint(config, bars)?;

    let mut sim = match history {
        Some(h) => Simulation::with_history(config.engine.clone(), h),
        None => Simulation::new(config.engine.clone()),
    }
    .map_err(ConfigError::from)?;
    for bar in bars {
        sim.on_bar(bar)?;
    }
    let result = sim.finish();

    let report = PerformanceReport::build(
        &result,
        bars,
        config.engine.instrument.pip_size,
        &config.report,
    );
    tracing::info!(
        run_id = %run_id,
        trades = report.total_trades,
        net_profit = report.net_profit,
        "backtest complete"
    );

    Ok(BacktestRun {
        run_id,
        config: config.clone(),
        result,
        report,
        data: None,
    })
}

/// Load the configured data file, seed history, and run.
pub fn run_backtest(config: &BacktestConfig) -> Result<BacktestRun, RunError> {
    config.validate()?;
    let path = config.data.path.as_deref().ok_or(RunError::MissingDataPath)?;
    let loaded: LoadedSeries = load_series(path, &config.data.preprocess())?;
    let history = load_history_seed(config)?;
    let mut run = run_on_bars(config, &loaded.series.bars, history)?;
    run.data = Some(loaded.summary());
    Ok(run)
}

/// Load a TOML config file and run it.
pub fn run_from_file(config_path: &Path) -> Result<BacktestRun, RunError> {
    let config = BacktestConfig::load(config_path)?;
    run_backtest(&config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let p = 1.1 + (i as f64 * 0.3).sin() * 0.001;
                Bar {
                    timestamp: start + Duration::minutes(i as i64),
                    open: p,
                    high: p + 0.0003,
                    low: p - 0.0003,
                    close: p + 0.0001,
                    volume: Some(1.0),
                }
            })
            .collect()
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let cfg = BacktestConfig::default();
        let b = bars(50);
        assert_eq!(fingerprint(&cfg, &b).unwrap(), fingerprint(&cfg, &b).unwrap());
        assert_eq!(fingerprint(&cfg, &b).unwrap().len(), 64);
    }

    #[test]
    fn fingerprint_changes_with_params_and_data() {
        let cfg = BacktestConfig::default();
        let b = bars(50);
        let base = fingerprint(&cfg, &b).unwrap();

        let mut other = cfg.clone();
        other.engine.risk.min_rr = 3.0;
        assert_ne!(base, fingerprint(&other, &b).unwrap());

        let mut moved = b.clone();
        moved[10].close += 0.00001;
        assert_ne!(base, fingerprint(&cfg, &moved).unwrap());
    }

    #[test]
    fn fingerprint_ignores_output_location() {
        let cfg = BacktestConfig::default();
        let mut other = cfg.clone();
        other.output.dir = "elsewhere".into();
        let b = bars(20);
        assert_eq!(fingerprint(&cfg, &b).unwrap(), fingerprint(&other, &b).unwrap());
    }

    #[test]
    fn missing_data_path_is_an_error() {
        let err = run_backtest(&BacktestConfig::default()).unwrap_err();
        assert!(matches!(err, RunError::MissingDataPath));
    }

    #[test]
    fn invalid_engine_config_fails_before_running() {
        let mut cfg = BacktestConfig::default();
        cfg.engine.simulation.max_open_positions = 0;
        let err = run_on_bars(&cfg, &bars(10), None).unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::Engine(_))));
    }

    #[test]
    fn unsorted_bars_are_a_data_error() {
        let mut b = bars(10);
        b.swap(3, 4);
        let err = run_on_bars(&BacktestConfig::default(), &b, None).unwrap_err();
        assert!(matches!(err, RunError::Data(DataError::NonMonotonic { .. })));
    }

    #[test]
    fn short_series_runs_to_an_empty_report() {
        let run = run_on_bars(&BacktestConfig::default(), &bars(30), None).unwrap();
        assert_eq!(run.result.bar_count(), 30);
        assert_eq!(run.report.total_trades, 0);
        assert_eq!(run.report.final_capital, 10_000.0);
        assert!(run.artifact_dir_name().starts_with("EURUSD_"));
    }
}
