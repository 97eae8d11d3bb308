//! History evaluator: veto plans whose pattern has been losing.
//!
//! A pattern signature is (direction, stop-distance band, RR band, UTC entry
//! hour). A plan is vetoed when its signature has at least `min_samples`
//! recorded outcomes and a loss rate above `loss_rate_threshold`. A loss is
//! any trade with pnl <= 0.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::buckets::{RrBucket, StopBucket};
use crate::domain::{ClosedTrade, Direction, RejectReason, TradePlan};
use crate::session::SessionWindow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub loss_rate_threshold: f64,
    pub min_samples: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            loss_rate_threshold: 0.5,
            min_samples: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatternSignature {
    pub direction: Direction,
    pub stop_bucket: StopBucket,
    pub rr_bucket: RrBucket,
    pub entry_hour: u32,
}

impl PatternSignature {
    pub fn new(direction: Direction, stop_pips: f64, risk_reward: f64, entry_hour: u32) -> Self {
        Self {
            direction,
            stop_bucket: StopBucket::from_pips(stop_pips),
            rr_bucket: RrBucket::from_ratio(risk_reward),
            entry_hour,
        }
    }

    pub fn of_plan(plan: &TradePlan, pip_size: f64) -> Self {
        Self::new(
            plan.direction(),
            plan.stop_pips(pip_size),
            plan.risk_reward_ratio,
            SessionWindow::hour_bucket(plan.setup.timestamp),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStats {
    pub wins: usize,
    pub losses: usize,
}

impl SignatureStats {
    pub fn total(&self) -> usize {
        self.wins + self.losses
    }

    pub fn loss_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.losses as f64 / self.total() as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEvaluator {
    config: HistoryConfig,
    pip_size: f64,
    stats: BTreeMap<PatternSignature, SignatureStats>,
}

impl HistoryEvaluator {
    pub fn new(config: HistoryConfig, pip_size: f64) -> Self {
        Self {
            config,
            pip_size,
            stats: BTreeMap::new(),
        }
    }

    /// Build an evaluator pre-loaded with an existing ledger.
    pub fn from_trades<'a>(
        config: HistoryConfig,
        pip_size: f64,
        trades: impl IntoIterator<Item = &'a ClosedTrade>,
    ) -> Self {
        let mut evaluator = Self::new(config, pip_size);
        for trade in trades {
            evaluator.record(trade);
        }
        evaluator
    }

    pub fn record(&mut self, trade: &ClosedTrade) {
        let signature = PatternSignature::of_plan(&trade.plan, self.pip_size);
        self.record_outcome(signature, trade.is_win());
    }

    /// Record an outcome directly (used when seeding from an exported trade log).
    pub fn record_outcome(&mut self, signature: PatternSignature, win: bool) {
        let entry = self.stats.entry(signature).or_default();
        if win {
            entry.wins += 1;
        } else {
            entry.losses += 1;
        }
    }

    pub fn stats_for(&self, signature: &PatternSignature) -> SignatureStats {
        self.stats.get(signature).copied().unwrap_or_default()
    }

    pub fn signatures(&self) -> impl Iterator<Item = (&PatternSignature, &SignatureStats)> {
        self.stats.iter()
    }

    /// Pass (`Ok`) or veto. Never alters the plan.
    pub fn evaluate(&self, plan: &TradePlan) -> Result<(), RejectReason> {
        if !self.config.enabled {
            return Ok(());
        }
        let signature = PatternSignature::of_plan(plan, self.pip_size);
        let stats = self.stats_for(&signature);
        if stats.total() >= self.config.min_samples && stats.loss_rate() > self.config.loss_rate_threshold {
            tracing::debug!(
                ?signature,
                losses = stats.losses,
                total = stats.total(),
                "history veto"
            );
            return Err(RejectReason::HistoryVeto);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CloseReason, OpenPosition, Setup, SwingKind, SwingPoint, TrendState};
    use chrono::{TimeZone, Utc};

    fn plan_at(hour: u32) -> TradePlan {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, hour, 15, 0).unwrap();
        let point = SwingPoint {
            timestamp: ts,
            price: 1.1,
            kind: SwingKind::High,
            index: 0,
        };
        TradePlan {
            setup: Setup {
                timestamp: ts,
                bar_index: 10,
                direction: Direction::Long,
                entry_price: 1.1008,
                breakout_level: 1.1,
                stop_level: 1.1,
                trend_at_detection: TrendState::Up,
                swing_reference: point,
                stop_anchor: point,
            },
            entry_price: 1.1008,
            stop_loss: 1.1000,
            take_profit: 1.1024,
            risk_reward_ratio: 2.0,
            position_size: 125_000.0,
            risk_amount: 100.0,
        }
    }

    fn closed(plan: TradePlan, pnl: f64) -> ClosedTrade {
        let ts = plan.setup.timestamp;
        OpenPosition::new(plan, ts, 10).close(ts, 12, 1.1, CloseReason::StopLoss, pnl, 10_000.0 + pnl)
    }

    #[test]
    fn empty_history_passes() {
        let h = HistoryEvaluator::new(HistoryConfig::default(), 0.0001);
        assert!(h.evaluate(&plan_at(9)).is_ok());
    }

    #[test]
    fn losing_pattern_is_vetoed_after_min_samples() {
        let mut h = HistoryEvaluator::new(HistoryConfig::default(), 0.0001);
        for _ in 0..4 {
            h.record(&closed(plan_at(9), -100.0));
        }
        assert!(h.evaluate(&plan_at(9)).is_ok(), "4 samples is below the minimum");
        h.record(&closed(plan_at(9), -100.0));
        assert_eq!(h.evaluate(&plan_at(9)), Err(RejectReason::HistoryVeto));
        // Different hour is a different signature.
        assert!(h.evaluate(&plan_at(14)).is_ok());
    }

    #[test]
    fn threshold_is_strict() {
        let mut h = HistoryEvaluator::new(HistoryConfig::default(), 0.0001);
        for pnl in [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0] {
            h.record(&closed(plan_at(9), pnl));
        }
        // 50% loss rate does not exceed 0.5.
        assert!(h.evaluate(&plan_at(9)).is_ok());
    }

    #[test]
    fn breakeven_counts_as_loss() {
        let mut h = HistoryEvaluator::new(HistoryConfig::default(), 0.0001);
        h.record(&closed(plan_at(9), 0.0));
        let sig = PatternSignature::of_plan(&plan_at(9), 0.0001);
        assert_eq!(h.stats_for(&sig).losses, 1);
    }

    #[test]
    fn disabled_never_vetoes() {
        let trades: Vec<_> = (0..10).map(|_| closed(plan_at(9), -5.0)).collect();
        let cfg = HistoryConfig {
            enabled: false,
            ..HistoryConfig::default()
        };
        let h = HistoryEvaluator::from_trades(cfg, 0.0001, &trades);
        assert!(h.evaluate(&plan_at(9)).is_ok());
    }
}
