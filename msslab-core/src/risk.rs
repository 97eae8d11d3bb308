//! Risk sizer: Setup + equity -> TradePlan, or a rejection reason.
//!
//! stop_loss = stop anchor pushed out by the stop buffer
//! take_profit = entry ± stop_distance × rr_target
//! size = floor_to_lot(equity × risk_fraction / (stop_distance × quote_to_account))

use serde::{Deserialize, Serialize};

use crate::domain::{EquityState, Instrument, RejectReason, RejectedSetup, Setup, TradePlan};

/// Tolerance for pip-bound and RR comparisons against float noise.
const BOUND_EPSILON: f64 = 1e-9;

/// Inclusive stop-distance bounds in pips.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopBounds {
    pub min_pips: f64,
    pub max_pips: f64,
}

impl Default for StopBounds {
    fn default() -> Self {
        Self {
            min_pips: 1.0,
            max_pips: 20.0,
        }
    }
}

impl StopBounds {
    /// `Ok(())` inside the bounds, otherwise the matching rejection.
    pub fn check(&self, pips: f64) -> Result<(), RejectReason> {
        if !pips.is_finite() || pips + BOUND_EPSILON < self.min_pips || pips <= 0.0 {
            Err(RejectReason::StopTooTight)
        } else if pips - BOUND_EPSILON > self.max_pips {
            Err(RejectReason::StopTooWide)
        } else {
            Ok(())
        }
    }

    pub fn contains(&self, pips: f64) -> bool {
        self.check(pips).is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Fraction of current equity risked per trade.
    pub risk_fraction: f64,
    /// Target distance as a multiple of the stop distance.
    pub rr_target: f64,
    /// Plans below this risk/reward are rejected.
    pub min_rr: f64,
    pub stop_bounds: StopBounds,
    /// Extra pips beyond the swing anchor.
    pub stop_buffer_pips: f64,
    /// Maximum notional / equity.
    pub max_leverage: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_fraction: 0.01,
            rr_target: 2.0,
            min_rr: 2.0,
            stop_bounds: StopBounds::default(),
            stop_buffer_pips: 0.0,
            max_leverage: 50.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskSizer {
    config: RiskConfig,
    instrument: Instrument,
}

impl RiskSizer {
    pub fn new(config: RiskConfig, instrument: Instrument) -> Self {
        Self { config, instrument }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Size a setup against current equity. Rejection is total: no plan is
    /// produced for any out-of-bounds input.
    pub fn size(&self, setup: &Setup, equity: &EquityState) -> Result<TradePlan, RejectedSetup> {
        self.try_size(setup, equity)
            .map_err(|reason| RejectedSetup::new(setup, reason))
    }

    fn try_size(&self, setup: &Setup, equity: &EquityState) -> Result<TradePlan, RejectReason> {
        let sign = setup.direction.sign();
        let entry = setup.entry_price;
        let buffer = self.instrument.from_pips(self.config.stop_buffer_pips.max(0.0));
        let stop_loss = setup.stop_level - sign * buffer;

        // Stop must sit on the losing side of the entry.
        let signed_distance = sign * (entry - stop_loss);
        if signed_distance <= 0.0 {
            return Err(RejectReason::StopTooTight);
        }
        let distance = signed_distance;
        self.config.stop_bounds.check(self.instrument.to_pips(distance))?;

        let take_profit = entry + sign * distance * self.config.rr_target;
        let rr = (take_profit - entry).abs() / distance;
        if rr + BOUND_EPSILON < self.config.min_rr {
            return Err(RejectReason::RiskRewardBelowMinimum);
        }

        let risk_budget = equity.current_capital * self.config.risk_fraction;
        let per_unit_risk = distance * self.instrument.quote_to_account;
        let position_size = self.instrument.floor_to_lot(risk_budget / per_unit_risk);
        if position_size <= 0.0 {
            return Err(RejectReason::NonPositiveSize);
        }

        let notional = position_size * entry * self.instrument.quote_to_account;
        if notional > equity.current_capital * self.config.max_leverage {
            return Err(RejectReason::ExposureCapExceeded);
        }

        Ok(TradePlan {
            setup: setup.clone(),
            entry_price: entry,
            stop_loss,
            take_profit,
            risk_reward_ratio: rr,
            position_size,
            risk_amount: position_size * per_unit_risk,
        })
    }
}
