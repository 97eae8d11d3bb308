//! Open positions and closed trades.
//!
//! `OpenPosition::close` consumes the position, so a plan can only ever
//! produce one `ClosedTrade`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::TradePlan;
use super::trend::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    SessionEnd,
    ForcedClose,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::TakeProfit => "TAKE_PROFIT",
            CloseReason::StopLoss => "STOP_LOSS",
            CloseReason::SessionEnd => "SESSION_END",
            CloseReason::ForcedClose => "FORCED_CLOSE",
        }
    }

    pub fn parse(s: &str) -> Option<CloseReason> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TAKE_PROFIT" => Some(CloseReason::TakeProfit),
            "STOP_LOSS" => Some(CloseReason::StopLoss),
            "SESSION_END" => Some(CloseReason::SessionEnd),
            "FORCED_CLOSE" => Some(CloseReason::ForcedClose),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
}

/// A live simulated position. Its plan is frozen at open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub plan: TradePlan,
    pub open_timestamp: DateTime<Utc>,
    pub open_index: usize,
    pub status: PositionStatus,
}

impl OpenPosition {
    pub fn new(plan: TradePlan, open_timestamp: DateTime<Utc>, open_index: usize) -> Self {
        Self {
            plan,
            open_timestamp,
            open_index,
            status: PositionStatus::Open,
        }
    }

    pub fn direction(&self) -> Direction {
        self.plan.direction()
    }

    /// Account-currency PnL if closed at `exit_price`.
    pub fn pnl_at(&self, exit_price: f64, quote_to_account: f64) -> f64 {
        self.direction().sign()
            * (exit_price - self.plan.entry_price)
            * self.plan.position_size
            * quote_to_account
    }

    /// Close the position. `equity_after` is the capital once `pnl` is booked.
    pub fn close(
        self,
        close_timestamp: DateTime<Utc>,
        close_index: usize,
        exit_price: f64,
        close_reason: CloseReason,
        pnl: f64,
        equity_after: f64,
    ) -> ClosedTrade {
        ClosedTrade {
            plan: self.plan,
            open_timestamp: self.open_timestamp,
            open_index: self.open_index,
            close_timestamp,
            close_index,
            exit_price,
            close_reason,
            pnl,
            equity_after,
        }
    }
}

/// A completed trade. Appended to the ledger once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub plan: TradePlan,
    pub open_timestamp: DateTime<Utc>,
    pub open_index: usize,
    pub close_timestamp: DateTime<Utc>,
    pub close_index: usize,
    pub exit_price: f64,
    pub close_reason: CloseReason,
    pub pnl: f64,
    pub equity_after: f64,
}

impl ClosedTrade {
    pub fn direction(&self) -> Direction {
        self.plan.direction()
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    /// Capital before this trade was booked.
    pub fn equity_before(&self) -> f64 {
        self.equity_after - self.pnl
    }

    pub fn bars_held(&self) -> usize {
        self.close_index.saturating_sub(self.open_index)
    }
}
