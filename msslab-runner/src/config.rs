//! Backtest configuration loaded from TOML.
//!
//! ```toml
//! [data]
//! path = "data/EURUSD_M1.csv"
//! ohlc_violation_tolerance = 0.0
//!
//! [engine.indicators]
//! ema_fast = 50
//! ema_slow = 200
//!
//! [engine.risk]
//! min_rr = 2.0
//!
//! [report.annualization]
//! sampling = "per_trade"
//! periods_per_year = 252
//!
//! [output]
//! dir = "results"
//!
//! [history]
//! seed_trade_log = "results/previous/trade_log.csv"
//! ```
//!
//! Every section is optional and falls back to its defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use msslab_core::data::PreprocessConfig;
use msslab_core::engine::{self, EngineConfig};

use crate::forensics::ForensicMethod;
use crate::metrics::AnnualizationConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("engine config: {0}")]
    Engine(#[from] engine::ConfigError),

    #[error("invalid parameter '{name}' = {value}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV file with `time, open, high, low, close[, volume]` columns.
    pub path: Option<PathBuf>,
    pub ohlc_violation_tolerance: f64,
}

impl DataConfig {
    pub fn preprocess(&self) -> PreprocessConfig {
        PreprocessConfig {
            ohlc_violation_tolerance: self.ohlc_violation_tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub annualization: AnnualizationConfig,
    /// Bars examined after a losing trade when attributing its cause.
    pub forensic_lookahead: usize,
    pub forensic_method: ForensicMethod,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            annualization: AnnualizationConfig::default(),
            forensic_lookahead: 100,
            forensic_method: ForensicMethod::TrendConfirmation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySeedConfig {
    /// Trade log written by an earlier run, used to pre-load the history evaluator.
    pub seed_trade_log: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub data: DataConfig,
    pub engine: EngineConfig,
    pub report: ReportConfig,
    pub output: OutputConfig,
    pub history: HistorySeedConfig,
}

impl BacktestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: BacktestConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded backtest config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;

        let tol = self.data.ohlc_violation_tolerance;
        if !(0.0..=1.0).contains(&tol) {
            return Err(invalid("data.ohlc_violation_tolerance", tol, "must be within [0, 1]"));
        }

        let ann = &self.report.annualization;
        if !(ann.periods_per_year.is_finite() && ann.periods_per_year > 0.0) {
            return Err(invalid(
                "report.annualization.periods_per_year",
                ann.periods_per_year,
                "must be a positive finite number",
            ));
        }
        if !ann.risk_free_rate.is_finite() {
            return Err(invalid(
                "report.annualization.risk_free_rate",
                ann.risk_free_rate,
                "must be finite",
            ));
        }
        if self.report.forensic_lookahead == 0 {
            return Err(invalid(
                "report.forensic_lookahead",
                self.report.forensic_lookahead,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, value: impl ToString, reason: &'static str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ReturnSampling;
    use msslab_core::engine::IntrabarPolicy;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = BacktestConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, BacktestConfig::default());
        assert_eq!(cfg.engine.indicators.ema_fast, 50);
        assert_eq!(cfg.engine.indicators.ema_slow, 200);
        assert_eq!(cfg.engine.indicators.swing_lookback, 3);
        assert_eq!(cfg.engine.risk.min_rr, 2.0);
        assert_eq!(cfg.engine.simulation.initial_capital, 10_000.0);
        assert_eq!(cfg.report.forensic_lookahead, 100);
        assert_eq!(cfg.report.annualization.periods_per_year, 252.0);
        assert_eq!(cfg.output.dir, PathBuf::from("results"));
        assert!(cfg.data.path.is_none());
        assert!(cfg.history.seed_trade_log.is_none());
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let toml = r#"
            [data]
            path = "bars.csv"
            ohlc_violation_tolerance = 0.01

            [engine.indicators]
            ema_fast = 20
            ema_slow = 100

            [engine.session]
            start = "07:30"
            end = "16:00"

            [engine.simulation]
            intrabar_policy = "ohlc_path"
            max_open_positions = 3

            [report]
            forensic_lookahead = 50
            forensic_method = "target_reached"

            [report.annualization]
            sampling = "daily"
            risk_free_rate = 0.02

            [history]
            seed_trade_log = "old/trade_log.csv"
        "#;
        let cfg = BacktestConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.data.path, Some(PathBuf::from("bars.csv")));
        assert_eq!(cfg.data.preprocess().ohlc_violation_tolerance, 0.01);
        assert_eq!(cfg.engine.indicators.ema_fast, 20);
        assert_eq!(cfg.engine.indicators.swing_lookback, 3);
        assert_eq!(cfg.engine.session.start.format("%H:%M").to_string(), "07:30");
        assert_eq!(cfg.engine.simulation.intrabar_policy, IntrabarPolicy::OhlcPath);
        assert_eq!(cfg.engine.simulation.max_open_positions, 3);
        assert_eq!(cfg.engine.risk.rr_target, 2.0);
        assert_eq!(cfg.report.forensic_lookahead, 50);
        assert_eq!(cfg.report.forensic_method, ForensicMethod::TargetReached);
        assert_eq!(cfg.report.annualization.sampling, ReturnSampling::Daily);
        assert_eq!(cfg.report.annualization.periods_per_year, 252.0);
        assert_eq!(cfg.history.seed_trade_log, Some(PathBuf::from("old/trade_log.csv")));
    }

    #[test]
    fn engine_validation_errors_surface() {
        let toml = r#"
            [engine.indicators]
            ema_fast = 200
            ema_slow = 50
        "#;
        let err = BacktestConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Engine(engine::ConfigError::EmaPeriods { fast: 200, slow: 50 })
        ));
    }

    #[test]
    fn non_positive_min_rr_is_rejected() {
        let err = BacktestConfig::from_toml_str("[engine.risk]\nmin_rr = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("risk.min_rr"));
    }

    #[test]
    fn report_parameters_are_validated() {
        let err = BacktestConfig::from_toml_str("[report.annualization]\nperiods_per_year = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "report.annualization.periods_per_year",
                ..
            }
        ));

        let err = BacktestConfig::from_toml_str("[report]\nforensic_lookahead = 0\n").unwrap_err();
        assert!(err.to_string().contains("forensic_lookahead"));

        let err = BacktestConfig::from_toml_str("[data]\nohlc_violation_tolerance = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("ohlc_violation_tolerance"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = BacktestConfig::from_toml_str("[engine.indicators\nema_fast = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unknown_enum_value_is_a_parse_error() {
        let err = BacktestConfig::from_toml_str("[report.annualization]\nsampling = \"weekly\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = BacktestConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
