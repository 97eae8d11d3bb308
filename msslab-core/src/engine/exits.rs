//! Exit resolution for open positions against one bar.
//!
//! When a bar's range crosses both the stop and the target, the true order is
//! unknowable from OHLC alone; `IntrabarPolicy` decides.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, CloseReason, Direction, OpenPosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntrabarPolicy {
    /// Stop first (conservative).
    #[default]
    WorstCase,
    /// Target first.
    BestCase,
    /// Bullish bars travel O→L→H→C, bearish bars O→H→L→C.
    OhlcPath,
}

/// Exit price and reason if `bar` touches the position's stop or target.
///
/// Exits fill at the level itself.
pub fn resolve_exit(position: &OpenPosition, bar: &Bar, policy: IntrabarPolicy) -> Option<(f64, CloseReason)> {
    let plan = &position.plan;
    let (stop_hit, target_hit) = match position.direction() {
        Direction::Long => (bar.low <= plan.stop_loss, bar.high >= plan.take_profit),
        Direction::Short => (bar.high >= plan.stop_loss, bar.low <= plan.take_profit),
    };
    let stop = (plan.stop_loss, CloseReason::StopLoss);
    let target = (plan.take_profit, CloseReason::TakeProfit);

    match (stop_hit, target_hit) {
        (false, false) => None,
        (true, false) => Some(stop),
        (false, true) => Some(target),
        (true, true) => {
            let stop_first = match policy {
                IntrabarPolicy::WorstCase => true,
                IntrabarPolicy::BestCase => false,
                IntrabarPolicy::OhlcPath => {
                    let low_first = bar.is_bullish();
                    match position.direction() {
                        Direction::Long => low_first,
                        Direction::Short => !low_first,
                    }
                }
            };
            Some(if stop_first { stop } else { target })
        }
    }
}
