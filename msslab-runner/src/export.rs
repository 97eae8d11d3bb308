//! Artifact export: trade log CSV, text report, JSON summary.
//!
//! A run directory contains:
//! - `trade_log.csv`: one row per closed trade
//! - `performance_report.txt`: the rendered `PerformanceReport`
//! - `summary.json`: report, data summary and run fingerprint
//!
//! The trade log can be read back to seed the history evaluator of a later run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use msslab_core::domain::{ClosedTrade, Direction};
use msslab_core::history::{HistoryConfig, HistoryEvaluator, PatternSignature};
use msslab_core::session::SessionWindow;

use crate::data_loader::DataSummary;
use crate::report::PerformanceReport;

/// Current schema version of `summary.json`.
pub const SCHEMA_VERSION: u32 = 1;

pub const TRADE_LOG_FILE: &str = "trade_log.csv";
pub const REPORT_FILE: &str = "performance_report.txt";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("trade log row {row}: invalid {column} '{value}'")]
    Parse {
        row: usize,
        column: &'static str,
        value: String,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ─── Trade log ──────────────────────────────────────────────────────

/// One row of `trade_log.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogRow {
    pub open_timestamp: DateTime<Utc>,
    pub close_timestamp: DateTime<Utc>,
    pub direction: String,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub position_size: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub equity_after: f64,
    pub close_reason: String,
    pub risk_reward: f64,
    pub stop_pips: f64,
}

impl TradeLogRow {
    pub fn from_trade(trade: &ClosedTrade, pip_size: f64) -> Self {
        Self {
            open_timestamp: trade.open_timestamp,
            close_timestamp: trade.close_timestamp,
            direction: trade.direction().as_str().to_string(),
            entry: trade.plan.entry_price,
            stop_loss: trade.plan.stop_loss,
            take_profit: trade.plan.take_profit,
            position_size: trade.plan.position_size,
            exit_price: trade.exit_price,
            pnl: trade.pnl,
            equity_after: trade.equity_after,
            close_reason: trade.close_reason.as_str().to_string(),
            risk_reward: trade.plan.risk_reward_ratio,
            stop_pips: trade.plan.stop_pips(pip_size),
        }
    }

    /// Pattern signature of the logged trade, recomputed from its prices.
    pub fn signature(&self, row: usize, pip_size: f64) -> Result<PatternSignature, ExportError> {
        let direction = Direction::parse(&self.direction).ok_or_else(|| ExportError::Parse {
            row,
            column: "direction",
            value: self.direction.clone(),
        })?;
        let risk = (self.entry - self.stop_loss).abs();
        if !(risk.is_finite() && risk > 0.0) {
            return Err(ExportError::Parse {
                row,
                column: "stop_loss",
                value: self.stop_loss.to_string(),
            });
        }
        let reward = (self.take_profit - self.entry).abs();
        Ok(PatternSignature::new(
            direction,
            risk / pip_size,
            reward / risk,
            SessionWindow::hour_bucket(self.open_timestamp),
        ))
    }
}

/// Serialize trades as trade-log CSV text.
pub fn trade_log_csv(trades: &[ClosedTrade], pip_size: f64) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for t in trades {
        wtr.serialize(TradeLogRow::from_trade(t, pip_size))?;
    }
    if trades.is_empty() {
        write_trade_log_header(&mut wtr)?;
    }
    let data = wtr.into_inner().map_err(|e| ExportError::Io {
        path: PathBuf::from(TRADE_LOG_FILE),
        source: e.into_error(),
    })?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

fn write_trade_log_header(wtr: &mut csv::Writer<Vec<u8>>) -> Result<(), ExportError> {
    wtr.write_record([
        "open_timestamp",
        "close_timestamp",
        "direction",
        "entry",
        "stop_loss",
        "take_profit",
        "position_size",
        "exit_price",
        "pnl",
        "equity_after",
        "close_reason",
        "risk_reward",
        "stop_pips",
    ])?;
    Ok(())
}

pub fn write_trade_log(path: &Path, trades: &[ClosedTrade], pip_size: f64) -> Result<(), ExportError> {
    let text = trade_log_csv(trades, pip_size)?;
    std::fs::write(path, text).map_err(io_err(path))
}

pub fn read_trade_log(path: &Path) -> Result<Vec<TradeLogRow>, ExportError> {
    let file = std::fs::File::open(path).map_err(io_err(path))?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut rows = Vec::new();
    for record in rdr.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Build a history evaluator pre-loaded with the outcomes of a trade log.
pub fn history_from_trade_log(
    rows: &[TradeLogRow],
    config: HistoryConfig,
    pip_size: f64,
) -> Result<HistoryEvaluator, ExportError> {
    let mut evaluator = HistoryEvaluator::new(config, pip_size);
    for (i, row) in rows.iter().enumerate() {
        let signature = row.signature(i + 1, pip_size)?;
        evaluator.record_outcome(signature, row.pnl > 0.0);
    }
    Ok(evaluator)
}

// ─── Summary & artifact bundle ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,
    pub run_id: String,
    pub symbol: String,
    pub bars: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub report: PerformanceReport,
    pub data: Option<DataSummary>,
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub trade_log: PathBuf,
    pub report: PathBuf,
    pub summary: PathBuf,
}

/// Write the three run artifacts into `dir`, creating it if needed.
pub fn write_artifacts(
    dir: &Path,
    summary: &RunSummary,
    trades: &[ClosedTrade],
    pip_size: f64,
) -> Result<ArtifactPaths, ExportError> {
    std::fs::create_dir_all(dir).map_err(io_err(dir))?;
    let paths = ArtifactPaths {
        dir: dir.to_path_buf(),
        trade_log: dir.join(TRADE_LOG_FILE),
        report: dir.join(REPORT_FILE),
        summary: dir.join(SUMMARY_FILE),
    };

    write_trade_log(&paths.trade_log, trades, pip_size)?;

    let text = summary.report.render_text();
    std::fs::write(&paths.report, text).map_err(io_err(&paths.report))?;

    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&paths.summary, json).map_err(io_err(&paths.summary))?;

    tracing::info!(dir = %dir.display(), trades = trades.len(), "artifacts written");
    Ok(paths)
}
