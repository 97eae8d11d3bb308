//! Performance metrics: pure functions over the closed-trade ledger.
//!
//! Every metric is a pure function: trades (and/or the equity curve derived
//! from them) in, scalar out. Ratios that are undefined for the given input
//! return `None` rather than an infinity or a placeholder zero.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use msslab_core::domain::ClosedTrade;

const MIN_DEVIATION: f64 = 1e-15;
const DAYS_PER_YEAR: f64 = 365.25;

// ─── Annualization ──────────────────────────────────────────────────

/// How the return series behind Sharpe/Sortino is sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnSampling {
    /// One return per closed trade: pnl / equity before the trade.
    #[default]
    PerTrade,
    /// One return per UTC close date, from the last equity of each date.
    Daily,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnualizationConfig {
    pub sampling: ReturnSampling,
    /// Number of return periods per year used to annualize the ratios.
    pub periods_per_year: f64,
    /// Annual risk-free rate, as a fraction.
    pub risk_free_rate: f64,
}

impl Default for AnnualizationConfig {
    fn default() -> Self {
        Self {
            sampling: ReturnSampling::PerTrade,
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
        }
    }
}

// ─── Equity curve & returns ─────────────────────────────────────────

/// Equity after each trade, starting with the initial capital.
pub fn equity_curve(initial_capital: f64, trades: &[ClosedTrade]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    let mut equity = initial_capital;
    curve.push(equity);
    for t in trades {
        equity += t.pnl;
        curve.push(equity);
    }
    curve
}

/// Per-trade returns: pnl relative to the equity before the trade.
pub fn per_trade_returns(initial_capital: f64, trades: &[ClosedTrade]) -> Vec<f64> {
    let mut returns = Vec::with_capacity(trades.len());
    let mut equity = initial_capital;
    for t in trades {
        if equity > 0.0 {
            returns.push(t.pnl / equity);
        }
        equity += t.pnl;
    }
    returns
}

/// Last equity per UTC close date, seeded with the initial capital on the
/// day before the first close.
pub fn daily_equity(initial_capital: f64, trades: &[ClosedTrade]) -> Vec<(NaiveDate, f64)> {
    let mut points: Vec<(NaiveDate, f64)> = Vec::new();
    let Some(first) = trades.first() else {
        return points;
    };
    let seed_date = first
        .close_timestamp
        .date_naive()
        .pred_opt()
        .unwrap_or_else(|| first.close_timestamp.date_naive());
    points.push((seed_date, initial_capital));

    let mut equity = initial_capital;
    for t in trades {
        equity += t.pnl;
        let date = t.close_timestamp.date_naive();
        match points.last_mut() {
            Some(last) if last.0 == date => last.1 = equity,
            _ => points.push((date, equity)),
        }
    }
    points
}

pub fn daily_returns(initial_capital: f64, trades: &[ClosedTrade]) -> Vec<f64> {
    let points = daily_equity(initial_capital, trades);
    points
        .windows(2)
        .filter(|w| w[0].1 > 0.0)
        .map(|w| (w[1].1 - w[0].1) / w[0].1)
        .collect()
}

/// The return series selected by the annualization config.
pub fn returns(initial_capital: f64, trades: &[ClosedTrade], cfg: &AnnualizationConfig) -> Vec<f64> {
    match cfg.sampling {
        ReturnSampling::PerTrade => per_trade_returns(initial_capital, trades),
        ReturnSampling::Daily => daily_returns(initial_capital, trades),
    }
}

// ─── Ratios ─────────────────────────────────────────────────────────

/// Annualized Sharpe ratio.
///
/// Sharpe = mean(r - rf/ppy) / std(r - rf/ppy) * sqrt(ppy), sample standard
/// deviation. `None` with fewer than two returns or zero deviation.
pub fn sharpe_ratio(returns: &[f64], cfg: &AnnualizationConfig) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let rf = cfg.risk_free_rate / cfg.periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - rf).collect();
    let std = std_dev(&excess);
    if std < MIN_DEVIATION {
        return None;
    }
    Some(mean_f64(&excess) / std * cfg.periods_per_year.sqrt())
}

/// Annualized Sortino ratio.
///
/// Downside deviation = sqrt(sum(min(r - rf/ppy, 0)^2) / n). `None` with
/// fewer than two returns or no downside.
pub fn sortino_ratio(returns: &[f64], cfg: &AnnualizationConfig) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let rf = cfg.risk_free_rate / cfg.periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - rf).collect();
    let downside_sq: f64 = excess.iter().map(|r| r.min(0.0).powi(2)).sum();
    let downside = (downside_sq / excess.len() as f64).sqrt();
    if downside < MIN_DEVIATION {
        return None;
    }
    Some(mean_f64(&excess) / downside * cfg.periods_per_year.sqrt())
}

/// Compound annual growth rate as a fraction over the calendar span from
/// `start` to `end`, counted in whole days of 365.25-day years.
///
/// `None` for spans under one day, non-positive capital, or overflow.
pub fn cagr(
    initial_capital: f64,
    final_capital: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Option<f64> {
    if initial_capital <= 0.0 || final_capital <= 0.0 {
        return None;
    }
    let days = (end - start).num_days();
    if days <= 0 {
        return None;
    }
    let years = days as f64 / DAYS_PER_YEAR;
    let growth = (final_capital / initial_capital).powf(1.0 / years) - 1.0;
    growth.is_finite().then_some(growth)
}

/// Calmar ratio: CAGR fraction / max drawdown fraction.
pub fn calmar_ratio(cagr: Option<f64>, max_drawdown_pct: f64) -> Option<f64> {
    let c = cagr?;
    if max_drawdown_pct <= 0.0 {
        return None;
    }
    Some(c / max_drawdown_pct)
}

/// Largest peak-to-trough decline of an equity curve: (currency, fraction of
/// the peak it fell from). Both are >= 0.
pub fn max_drawdown(curve: &[f64]) -> (f64, f64) {
    let Some(&first) = curve.first() else {
        return (0.0, 0.0);
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_dd_pct = 0.0_f64;
    for &eq in curve {
        if eq > peak {
            peak = eq;
        }
        let dd = peak - eq;
        max_dd = max_dd.max(dd);
        if peak > 0.0 {
            max_dd_pct = max_dd_pct.max(dd / peak);
        }
    }
    (max_dd, max_dd_pct)
}

// ─── Trade statistics ───────────────────────────────────────────────

/// Fraction of trades with pnl > 0.
pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_win()).count() as f64 / trades.len() as f64
}

pub fn gross_profit(trades: &[ClosedTrade]) -> f64 {
    trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum()
}

/// Sum of losing pnl, as a positive number.
pub fn gross_loss(trades: &[ClosedTrade]) -> f64 {
    trades.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).sum()
}

/// Gross profit / gross loss. `None` when there is no gross loss.
pub fn profit_factor(trades: &[ClosedTrade]) -> Option<f64> {
    let loss = gross_loss(trades);
    if loss < 1e-10 {
        return None;
    }
    Some(gross_profit(trades) / loss)
}

/// Mean pnl per trade.
pub fn expectancy(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.pnl).sum::<f64>() / trades.len() as f64
}

pub fn average_win(trades: &[ClosedTrade]) -> f64 {
    let wins: Vec<f64> = trades.iter().filter(|t| t.is_win()).map(|t| t.pnl).collect();
    mean_f64(&wins)
}

/// Mean loss magnitude over non-winning trades.
pub fn average_loss(trades: &[ClosedTrade]) -> f64 {
    let losses: Vec<f64> = trades.iter().filter(|t| !t.is_win()).map(|t| t.pnl).collect();
    mean_f64(&losses).abs()
}

pub fn longest_win_streak(trades: &[ClosedTrade]) -> usize {
    longest_streak(trades, true)
}

pub fn longest_loss_streak(trades: &[ClosedTrade]) -> usize {
    longest_streak(trades, false)
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

fn longest_streak(trades: &[ClosedTrade], winners: bool) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for t in trades {
        if t.is_win() == winners {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
