//! Mutable per-run state and the run result.
//!
//! Everything a run mutates lives here and is owned by one `Simulation`;
//! nothing is shared between runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    CloseReason, EquityState, Ledger, OpenPosition, RejectReason, RejectedSetup, Setup, TrendState,
};

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub bars_processed: usize,
    pub tradable_bars: usize,
    pub setups_detected: usize,
    pub trades_opened: usize,
    pub rejections: BTreeMap<RejectReason, usize>,
    pub close_reasons: BTreeMap<CloseReason, usize>,
}

impl RunStats {
    pub fn rejected_total(&self) -> usize {
        self.rejections.values().sum()
    }
}

pub struct EngineState {
    pub equity: EquityState,
    pub ledger: Ledger,
    pub open_positions: Vec<OpenPosition>,
    pub setups: Vec<Setup>,
    pub rejections: Vec<RejectedSetup>,
    pub stats: RunStats,
    /// Trend per processed bar, in bar order.
    pub trend_timeline: Vec<TrendState>,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub last_close: Option<f64>,
}

impl EngineState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            equity: EquityState::new(initial_capital),
            ledger: Ledger::new(),
            open_positions: Vec::new(),
            setups: Vec::new(),
            rejections: Vec::new(),
            stats: RunStats::default(),
            trend_timeline: Vec::new(),
            first_timestamp: None,
            last_timestamp: None,
            last_close: None,
        }
    }

    pub fn bar_index(&self) -> usize {
        self.trend_timeline.len()
    }
}

/// Outcome of a complete simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub initial_capital: f64,
    pub equity: EquityState,
    pub ledger: Ledger,
    pub setups: Vec<Setup>,
    pub rejections: Vec<RejectedSetup>,
    pub stats: RunStats,
    pub trend_timeline: Vec<TrendState>,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl RunResult {
    pub fn final_capital(&self) -> f64 {
        self.equity.current_capital
    }

    pub fn bar_count(&self) -> usize {
        self.trend_timeline.len()
    }
}
