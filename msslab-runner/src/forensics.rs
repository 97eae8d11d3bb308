//! Losing-trade forensics.
//!
//! Every losing trade (pnl <= 0) is attributed to one of two causes:
//! - `Directional Bias Wrong`: the market went the other way.
//! - `Entry Too Early`: the direction was right, the timing was not.
//!
//! Two attribution methods are available. `trend_confirmation` looks at the
//! first non-flat trend state after the close, within the lookahead window:
//! opposite to the trade means the bias was wrong. `target_reached` looks at
//! the bars after entry: if the take-profit was reached within the window the
//! entry was early; trades with fewer future bars than the window are skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use msslab_core::domain::{Bar, ClosedTrade, Direction, TrendState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LossCause {
    DirectionalBiasWrong,
    EntryTooEarly,
}

impl LossCause {
    pub fn label(self) -> &'static str {
        match self {
            LossCause::DirectionalBiasWrong => "Directional Bias Wrong",
            LossCause::EntryTooEarly => "Entry Too Early",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForensicMethod {
    #[default]
    TrendConfirmation,
    TargetReached,
}

/// Classify a losing trade from the trend timeline of its run.
pub fn classify_by_trend(trade: &ClosedTrade, timeline: &[TrendState], lookahead: usize) -> LossCause {
    let start = trade.close_index.saturating_add(1).min(timeline.len());
    let end = trade.close_index.saturating_add(lookahead).saturating_add(1).min(timeline.len());
    let next_confirmed = timeline[start..end].iter().find_map(|t| t.direction());
    match next_confirmed {
        Some(dir) if dir == trade.direction().opposite() => LossCause::DirectionalBiasWrong,
        _ => LossCause::EntryTooEarly,
    }
}

/// Classify a losing trade by whether its target was touched within
/// `lookahead` bars after entry. `None` when fewer bars remain.
pub fn classify_by_target(trade: &ClosedTrade, bars: &[Bar], lookahead: usize) -> Option<LossCause> {
    let start = trade.open_index.checked_add(1)?;
    let end = start.checked_add(lookahead)?;
    let window = bars.get(start..end)?;
    let tp = trade.plan.take_profit;
    let hit = match trade.direction() {
        Direction::Long => window.iter().any(|b| b.high >= tp),
        Direction::Short => window.iter().any(|b| b.low <= tp),
    };
    Some(if hit {
        LossCause::EntryTooEarly
    } else {
        LossCause::DirectionalBiasWrong
    })
}

/// Counts of losing trades by cause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForensicSummary {
    pub method: ForensicMethod,
    pub lookahead: usize,
    pub losing_trades: usize,
    /// Losing trades the method could not classify.
    pub skipped: usize,
    pub counts: BTreeMap<LossCause, usize>,
}

impl ForensicSummary {
    pub fn analyzed(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzed() == 0
    }

    /// Share of each cause among analyzed trades, in percent.
    pub fn percentages(&self) -> Vec<(LossCause, f64)> {
        let total = self.analyzed();
        if total == 0 {
            return Vec::new();
        }
        self.counts
            .iter()
            .map(|(&cause, &n)| (cause, n as f64 / total as f64 * 100.0))
            .collect()
    }
}

/// Attribute every losing trade of a run.
pub fn analyze_losses(
    trades: &[ClosedTrade],
    timeline: &[TrendState],
    bars: &[Bar],
    method: ForensicMethod,
    lookahead: usize,
) -> ForensicSummary {
    let mut summary = ForensicSummary {
        method,
        lookahead,
        ..ForensicSummary::default()
    };
    for trade in trades.iter().filter(|t| !t.is_win()) {
        summary.losing_trades += 1;
        let cause = match method {
            ForensicMethod::TrendConfirmation => Some(classify_by_trend(trade, timeline, lookahead)),
            ForensicMethod::TargetReached => classify_by_target(trade, bars, lookahead),
        };
        match cause {
            Some(cause) => *summary.counts.entry(cause).or_default() += 1,
            None => summary.skipped += 1,
        }
    }
    if summary.skipped > 0 {
        tracing::debug!(
            skipped = summary.skipped,
            lookahead,
            "losing trades without enough future bars for forensics"
        );
    }
    summary
}
