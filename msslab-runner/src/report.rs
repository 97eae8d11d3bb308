//! Performance report: terminal reduction of a run's ledger.
//!
//! `PerformanceReport` is built either from a full `RunResult` (which also
//! carries the run's setup and rejection counters) or from a bare trade list.
//! `render_text` produces the human-readable report written to
//! `performance_report.txt`.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use msslab_core::buckets::{RrBucket, StopBucket};
use msslab_core::domain::{Bar, ClosedTrade};
use msslab_core::engine::RunResult;

use crate::config::ReportConfig;
use crate::forensics::{analyze_losses, ForensicSummary};
use crate::metrics::{self, AnnualizationConfig};

/// Literal text used when the forensic section has nothing to show.
pub const NO_LOSING_TRADES: &str = "No losing trades to analyze.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    // Overall
    pub initial_capital: f64,
    pub final_capital: f64,
    pub net_profit: f64,
    pub net_profit_pct: f64,
    /// Fraction; `None` when the traded span is under one day.
    pub cagr: Option<f64>,
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,

    // Trades
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: Option<f64>,
    pub expectancy: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub longest_win_streak: usize,
    pub longest_loss_streak: usize,

    // Ratios
    pub annualization: AnnualizationConfig,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub calmar: Option<f64>,

    // Distributions
    pub rr_distribution: Vec<BucketCount>,
    pub stop_distribution: Vec<BucketCount>,
    pub close_reasons: BTreeMap<String, usize>,

    // Activity (empty when built from a bare trade list)
    pub setups_detected: usize,
    pub rejections: BTreeMap<String, usize>,

    pub forensics: ForensicSummary,
}

impl PerformanceReport {
    /// Build the full report for a simulation run over `bars`.
    pub fn build(result: &RunResult, bars: &[Bar], pip_size: f64, cfg: &ReportConfig) -> Self {
        let trades = result.ledger.trades();
        let forensics = analyze_losses(
            trades,
            &result.trend_timeline,
            bars,
            cfg.forensic_method,
            cfg.forensic_lookahead,
        );
        let mut report = Self::from_trades(
            result.initial_capital,
            trades,
            pip_size,
            &cfg.annualization,
            forensics,
        );
        report.setups_detected = result.stats.setups_detected;
        report.rejections = result
            .stats
            .rejections
            .iter()
            .map(|(reason, &n)| (reason.as_str().to_string(), n))
            .collect();
        report
    }

    /// Build the report from a trade list alone.
    pub fn from_trades(
        initial_capital: f64,
        trades: &[ClosedTrade],
        pip_size: f64,
        annualization: &AnnualizationConfig,
        forensics: ForensicSummary,
    ) -> Self {
        let curve = metrics::equity_curve(initial_capital, trades);
        let final_capital = curve.last().copied().unwrap_or(initial_capital);
        let net_profit = final_capital - initial_capital;
        let (max_drawdown, max_drawdown_pct) = metrics::max_drawdown(&curve);

        let cagr = match (trades.first(), trades.last()) {
            (Some(first), Some(last)) => metrics::cagr(
                initial_capital,
                final_capital,
                first.open_timestamp,
                last.close_timestamp,
            ),
            _ => None,
        };
        let returns = metrics::returns(initial_capital, trades, annualization);
        let wins = trades.iter().filter(|t| t.is_win()).count();

        Self {
            initial_capital,
            final_capital,
            net_profit,
            net_profit_pct: if initial_capital > 0.0 {
                net_profit / initial_capital * 100.0
            } else {
                0.0
            },
            cagr,
            max_drawdown,
            max_drawdown_pct,
            total_trades: trades.len(),
            wins,
            losses: trades.len() - wins,
            win_rate: metrics::win_rate(trades),
            gross_profit: metrics::gross_profit(trades),
            gross_loss: metrics::gross_loss(trades),
            profit_factor: metrics::profit_factor(trades),
            expectancy: metrics::expectancy(trades),
            average_win: metrics::average_win(trades),
            average_loss: metrics::average_loss(trades),
            longest_win_streak: metrics::longest_win_streak(trades),
            longest_loss_streak: metrics::longest_loss_streak(trades),
            annualization: annualization.clone(),
            sharpe: metrics::sharpe_ratio(&returns, annualization),
            sortino: metrics::sortino_ratio(&returns, annualization),
            calmar: metrics::calmar_ratio(cagr, max_drawdown_pct),
            rr_distribution: rr_distribution(trades),
            stop_distribution: stop_distribution(trades, pip_size),
            close_reasons: close_reason_counts(trades),
            setups_detected: 0,
            rejections: BTreeMap::new(),
            forensics,
        }
    }

    /// Render the plain-text report.
    pub fn render_text(&self) -> String {
        let mut out = String::with_capacity(2048);
        let rule = "=".repeat(50);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "=    Strategy Performance & Forensics Report    =");
        let _ = writeln!(out, "{rule}");
        out.push('\n');

        let _ = writeln!(out, "--- I. Overall Performance Summary ---");
        line(&mut out, "Initial Capital", money(self.initial_capital));
        line(&mut out, "Final Capital", money(self.final_capital));
        line(
            &mut out,
            "Total Net Profit",
            format!("{} ({:.2}%)", money(self.net_profit), self.net_profit_pct),
        );
        line(&mut out, "CAGR", opt_pct(self.cagr));
        line(
            &mut out,
            "Maximum Drawdown",
            format!("{} ({:.2}%)", money(self.max_drawdown), self.max_drawdown_pct * 100.0),
        );
        out.push('\n');

        let _ = writeln!(out, "--- II. Backtesting Metrics ---");
        line(&mut out, "Total Trades", self.total_trades.to_string());
        line(&mut out, "Win Rate", format!("{:.2}%", self.win_rate * 100.0));
        line(&mut out, "Profit Factor", opt_ratio(self.profit_factor));
        line(&mut out, "Gross Profit", money(self.gross_profit));
        line(&mut out, "Gross Loss", money(self.gross_loss));
        line(&mut out, "Expectancy per Trade", money(self.expectancy));
        line(&mut out, "Average Win", money(self.average_win));
        line(&mut out, "Average Loss", money(self.average_loss));
        line(&mut out, "Longest Winning Streak", format!("{} trades", self.longest_win_streak));
        line(&mut out, "Longest Losing Streak", format!("{} trades", self.longest_loss_streak));
        if !self.close_reasons.is_empty() {
            let reasons: Vec<String> = self
                .close_reasons
                .iter()
                .map(|(r, n)| format!("{r}={n}"))
                .collect();
            line(&mut out, "Close Reasons", reasons.join(", "));
        }
        if self.setups_detected > 0 {
            line(&mut out, "Setups Detected", self.setups_detected.to_string());
            for (reason, n) in &self.rejections {
                line(&mut out, &format!("Rejected ({reason})"), n.to_string());
            }
        }
        out.push('\n');

        let _ = writeln!(out, "--- III. Advanced Performance Ratios ---");
        let sampling = match self.annualization.sampling {
            metrics::ReturnSampling::PerTrade => "per trade",
            metrics::ReturnSampling::Daily => "daily",
        };
        line(
            &mut out,
            "Return Sampling",
            format!(
                "{sampling}, {} periods/year, risk-free {:.2}%",
                self.annualization.periods_per_year,
                self.annualization.risk_free_rate * 100.0
            ),
        );
        line(&mut out, "Sharpe Ratio", opt_ratio(self.sharpe));
        line(&mut out, "Sortino Ratio", opt_ratio(self.sortino));
        line(&mut out, "Calmar Ratio", opt_ratio(self.calmar));
        out.push('\n');

        let _ = writeln!(out, "--- IV. Risk-to-Reward Ratio Distribution ---");
        distribution(&mut out, &self.rr_distribution);
        out.push('\n');

        let _ = writeln!(out, "--- V. Stop-Loss Distribution ---");
        distribution(&mut out, &self.stop_distribution);
        out.push('\n');

        let _ = writeln!(out, "--- VI. Trade Timing Forensics (Analysis of Losing Trades) ---");
        if self.forensics.is_empty() {
            let _ = writeln!(out, "{NO_LOSING_TRADES}");
        } else {
            for (cause, n) in &self.forensics.counts {
                let _ = writeln!(out, "{:<26} {n}", cause.label());
            }
            if self.forensics.skipped > 0 {
                let _ = writeln!(out, "{:<26} {}", "Not classified", self.forensics.skipped);
            }
            out.push('\n');
            let _ = writeln!(out, "--- Percentages ---");
            for (cause, pct) in self.forensics.percentages() {
                let _ = writeln!(out, "{:<26} {pct:.2}", cause.label());
            }
        }
        let _ = writeln!(out, "{rule}");
        out
    }
}

pub fn rr_distribution(trades: &[ClosedTrade]) -> Vec<BucketCount> {
    let mut counts: BTreeMap<RrBucket, usize> = BTreeMap::new();
    for t in trades {
        *counts.entry(RrBucket::from_ratio(t.plan.risk_reward_ratio)).or_default() += 1;
    }
    RrBucket::ALL
        .iter()
        .map(|b| BucketCount {
            label: b.label().to_string(),
            count: counts.get(b).copied().unwrap_or(0),
        })
        .collect()
}

pub fn stop_distribution(trades: &[ClosedTrade], pip_size: f64) -> Vec<BucketCount> {
    let mut counts: BTreeMap<StopBucket, usize> = BTreeMap::new();
    for t in trades {
        *counts.entry(StopBucket::from_pips(t.plan.stop_pips(pip_size))).or_default() += 1;
    }
    StopBucket::ALL
        .iter()
        .map(|b| BucketCount {
            label: b.label().to_string(),
            count: counts.get(b).copied().unwrap_or(0),
        })
        .collect()
}

pub fn close_reason_counts(trades: &[ClosedTrade]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for t in trades {
        *counts.entry(t.close_reason.as_str().to_string()).or_default() += 1;
    }
    counts
}

// ─── Formatting helpers ─────────────────────────────────────────────

fn line(out: &mut String, label: &str, value: String) {
    let _ = writeln!(out, "{:<27}{value}", format!("{label}:"));
}

fn money(v: f64) -> String {
    let sign = if v < 0.0 { "-" } else { "" };
    let cents = (v.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}.{frac:02}")
}

fn opt_ratio(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.2}"))
}

fn opt_pct(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |x| format!("{:.2}%", x * 100.0))
}

fn distribution(out: &mut String, buckets: &[BucketCount]) {
    for b in buckets {
        let _ = writeln!(out, "{:<12} {}", b.label, b.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forensics::LossCause;
    use crate::metrics::test_support::chain;

    fn report(pnls: &[f64]) -> PerformanceReport {
        let trades = chain(10_000.0, pnls);
        PerformanceReport::from_trades(
            10_000.0,
            &trades,
            0.0001,
            &AnnualizationConfig::default(),
            ForensicSummary::default(),
        )
    }

    #[test]
    fn money_formatting_groups_thousands() {
        assert_eq!(money(10_000.0), "$10,000.00");
        assert_eq!(money(-1234.5), "-$1,234.50");
        assert_eq!(money(0.0), "$0.00");
        assert_eq!(money(999.999), "$1,000.00");
    }

    #[test]
    fn ledger_identity_holds_in_report() {
        let r = report(&[200.0, -100.0, 200.0]);
        assert_eq!(r.final_capital, 10_300.0);
        assert_eq!(r.net_profit, 300.0);
        assert!((r.net_profit_pct - 3.0).abs() < 1e-12);
        assert_eq!(r.total_trades, 3);
        assert_eq!(r.wins, 2);
        assert_eq!(r.losses, 1);
        assert_eq!(r.max_drawdown, 100.0);
        assert!(r.max_drawdown >= 0.0);
    }

    #[test]
    fn distributions_cover_every_band() {
        let r = report(&[200.0, -100.0]);
        assert_eq!(r.rr_distribution.len(), 8);
        assert_eq!(r.stop_distribution.len(), 5);
        // Test trades carry RR 2.0 and an 8-pip stop.
        let rr = r.rr_distribution.iter().find(|b| b.label == "2.0-2.5").unwrap();
        assert_eq!(rr.count, 2);
        let stop = r.stop_distribution.iter().find(|b| b.label == "6-10 pips").unwrap();
        assert_eq!(stop.count, 2);
        assert_eq!(r.rr_distribution.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn close_reasons_are_counted() {
        let r = report(&[200.0, -100.0, -100.0]);
        assert_eq!(r.close_reasons.get("TAKE_PROFIT"), Some(&1));
        assert_eq!(r.close_reasons.get("STOP_LOSS"), Some(&2));
    }

    #[test]
    fn empty_ledger_report_has_no_ratios() {
        let r = report(&[]);
        assert_eq!(r.final_capital, 10_000.0);
        assert_eq!(r.sharpe, None);
        assert_eq!(r.calmar, None);
        assert_eq!(r.profit_factor, None);
        assert_eq!(r.cagr, None);
    }

    #[test]
    fn text_report_without_losses_uses_literal_phrase() {
        let text = report(&[200.0, 150.0]).render_text();
        assert!(text.contains("--- I. Overall Performance Summary ---"));
        assert!(text.contains("--- VI. Trade Timing Forensics (Analysis of Losing Trades) ---"));
        assert!(text.contains(NO_LOSING_TRADES));
        assert!(text.contains("Initial Capital:           $10,000.00"));
        assert!(text.contains("Profit Factor:             n/a"));
    }

    #[test]
    fn text_report_lists_forensic_counts_and_percentages() {
        let mut r = report(&[200.0, -100.0, -100.0, -100.0]);
        r.forensics.losing_trades = 3;
        r.forensics.counts.insert(LossCause::DirectionalBiasWrong, 2);
        r.forensics.counts.insert(LossCause::EntryTooEarly, 1);
        let text = r.render_text();
        assert!(!text.contains(NO_LOSING_TRADES));
        assert!(text.contains("Directional Bias Wrong"));
        assert!(text.contains("--- Percentages ---"));
        assert!(text.contains("66.67"));
        assert!(text.contains("33.33"));
    }
}
