//! Engine configuration and its validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::exits::IntrabarPolicy;
use crate::detector::DetectorConfig;
use crate::domain::Instrument;
use crate::history::HistoryConfig;
use crate::indicators::IndicatorConfig;
use crate::risk::RiskConfig;
use crate::session::SessionWindow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub initial_capital: f64,
    pub max_open_positions: usize,
    pub intrabar_policy: IntrabarPolicy,
    /// Close open positions at the open of the first out-of-session bar.
    pub close_at_session_end: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            max_open_positions: 1,
            intrabar_policy: IntrabarPolicy::WorstCase,
            close_at_session_end: false,
        }
    }
}

/// Full configuration for one simulation run. Every section defaults, so
/// partial TOML files deserialize.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub instrument: Instrument,
    pub indicators: IndicatorConfig,
    pub session: SessionWindow,
    pub detector: DetectorConfig,
    pub risk: RiskConfig,
    pub history: HistoryConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid parameter '{name}' = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("EMA fast period {fast} must be shorter than slow period {slow}")]
    EmaPeriods { fast: usize, slow: usize },

    #[error("min stop {min_pips} pips must be below max stop {max_pips} pips")]
    StopBounds { min_pips: f64, max_pips: f64 },
}

fn invalid(name: &'static str, value: impl ToString, reason: &'static str) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        value: value.to_string(),
        reason,
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, value, "must be a positive finite number"))
    }
}

impl EngineConfig {
    /// Reject parameter combinations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ind = &self.indicators;
        if ind.ema_fast == 0 {
            return Err(invalid("indicators.ema_fast", ind.ema_fast, "must be at least 1"));
        }
        if ind.ema_slow == 0 {
            return Err(invalid("indicators.ema_slow", ind.ema_slow, "must be at least 1"));
        }
        if ind.ema_fast >= ind.ema_slow {
            return Err(ConfigError::EmaPeriods {
                fast: ind.ema_fast,
                slow: ind.ema_slow,
            });
        }
        if ind.swing_lookback == 0 {
            return Err(invalid("indicators.swing_lookback", ind.swing_lookback, "must be at least 1"));
        }
        if !(ind.flat_tolerance.is_finite() && ind.flat_tolerance >= 0.0) {
            return Err(invalid("indicators.flat_tolerance", ind.flat_tolerance, "must be >= 0"));
        }

        let risk = &self.risk;
        positive("risk.min_rr", risk.min_rr)?;
        positive("risk.rr_target", risk.rr_target)?;
        if !(risk.risk_fraction > 0.0 && risk.risk_fraction < 1.0) {
            return Err(invalid("risk.risk_fraction", risk.risk_fraction, "must be in (0, 1)"));
        }
        positive("risk.stop_bounds.max_pips", risk.stop_bounds.max_pips)?;
        if !(risk.stop_bounds.min_pips.is_finite() && risk.stop_bounds.min_pips >= 0.0) {
            return Err(invalid("risk.stop_bounds.min_pips", risk.stop_bounds.min_pips, "must be >= 0"));
        }
        if risk.stop_bounds.min_pips >= risk.stop_bounds.max_pips {
            return Err(ConfigError::StopBounds {
                min_pips: risk.stop_bounds.min_pips,
                max_pips: risk.stop_bounds.max_pips,
            });
        }
        if !(risk.stop_buffer_pips.is_finite() && risk.stop_buffer_pips >= 0.0) {
            return Err(invalid("risk.stop_buffer_pips", risk.stop_buffer_pips, "must be >= 0"));
        }
        positive("risk.max_leverage", risk.max_leverage)?;

        positive("instrument.pip_size", self.instrument.pip_size)?;
        positive("instrument.lot_step", self.instrument.lot_step)?;
        positive("instrument.quote_to_account", self.instrument.quote_to_account)?;

        let hist = &self.history;
        if !(0.0..=1.0).contains(&hist.loss_rate_threshold) {
            return Err(invalid(
                "history.loss_rate_threshold",
                hist.loss_rate_threshold,
                "must be within [0, 1]",
            ));
        }

        let sim = &self.simulation;
        positive("simulation.initial_capital", sim.initial_capital)?;
        if sim.max_open_positions == 0 {
            return Err(invalid(
                "simulation.max_open_positions",
                sim.max_open_positions,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
