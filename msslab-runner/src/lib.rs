//! MSSLab Runner: backtest orchestration, reporting and artifacts.
//!
//! This crate contains:
//! - TOML backtest configuration
//! - Bar loading through the core preprocessor
//! - Performance metrics, distributions and losing-trade forensics
//! - Artifact export (trade log, text report, JSON summary)
//! - Parallel parameter sweeps

pub mod config;
pub mod data_loader;
pub mod export;
pub mod forensics;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError};
pub use data_loader::{load_series, DataSummary, LoadedSeries};
pub use export::{ArtifactPaths, ExportError, RunSummary, TradeLogRow};
pub use forensics::{ForensicMethod, ForensicSummary, LossCause};
pub use metrics::{AnnualizationConfig, ReturnSampling};
pub use report::PerformanceReport;
pub use runner::{run_backtest, run_from_file, run_on_bars, BacktestRun, RunError};
pub use sweep::{run_sweep, ParamGrid, SweepRow};
