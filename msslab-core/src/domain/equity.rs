//! EquityState: capital, peak and drawdown for one simulation run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityState {
    pub current_capital: f64,
    pub peak_capital: f64,
    /// Largest observed peak-to-trough decline, in account currency. Always >= 0.
    pub max_drawdown: f64,
    /// Largest peak-to-trough decline as a fraction of the peak.
    pub max_drawdown_pct: f64,
}

impl EquityState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            current_capital: initial_capital,
            peak_capital: initial_capital,
            max_drawdown: 0.0,
            max_drawdown_pct: 0.0,
        }
    }

    /// Book a realized PnL and update peak/drawdown.
    pub fn apply(&mut self, pnl: f64) {
        self.current_capital += pnl;
        if self.current_capital > self.peak_capital {
            self.peak_capital = self.current_capital;
        }
        let drawdown = self.peak_capital - self.current_capital;
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
        if self.peak_capital > 0.0 {
            let pct = drawdown / self.peak_capital;
            if pct > self.max_drawdown_pct {
                self.max_drawdown_pct = pct;
            }
        }
    }

    pub fn current_drawdown(&self) -> f64 {
        self.peak_capital - self.current_capital
    }
}
