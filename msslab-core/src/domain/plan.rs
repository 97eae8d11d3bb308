//! TradePlan and the rejection outcome of the sizing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::setup::Setup;
use super::trend::Direction;

/// A fully sized trade proposal derived from a `Setup`.
///
/// Invariants (enforced by the sizer): `risk_reward_ratio >= min_rr`, stop
/// distance within the configured pip bounds, `position_size > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub setup: Setup,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_reward_ratio: f64,
    /// Units of the base currency.
    pub position_size: f64,
    /// Account-currency loss if the stop is hit.
    pub risk_amount: f64,
}

impl TradePlan {
    pub fn direction(&self) -> Direction {
        self.setup.direction
    }

    pub fn stop_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }

    pub fn stop_pips(&self, pip_size: f64) -> f64 {
        self.stop_distance() / pip_size
    }
}

/// Why a candidate setup did not become a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    StopTooTight,
    StopTooWide,
    RiskRewardBelowMinimum,
    NonPositiveSize,
    ExposureCapExceeded,
    CapacityReached,
    HistoryVeto,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::StopTooTight => "STOP_TOO_TIGHT",
            RejectReason::StopTooWide => "STOP_TOO_WIDE",
            RejectReason::RiskRewardBelowMinimum => "RISK_REWARD_BELOW_MINIMUM",
            RejectReason::NonPositiveSize => "NON_POSITIVE_SIZE",
            RejectReason::ExposureCapExceeded => "EXPOSURE_CAP_EXCEEDED",
            RejectReason::CapacityReached => "CAPACITY_REACHED",
            RejectReason::HistoryVeto => "HISTORY_VETO",
        }
    }
}

/// A declined setup. Not an error: counted and logged, the run continues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedSetup {
    pub timestamp: DateTime<Utc>,
    pub bar_index: usize,
    pub direction: Direction,
    pub reason: RejectReason,
}

impl RejectedSetup {
    pub fn new(setup: &Setup, reason: RejectReason) -> Self {
        Self {
            timestamp: setup.timestamp,
            bar_index: setup.bar_index,
            direction: setup.direction,
            reason,
        }
    }
}
