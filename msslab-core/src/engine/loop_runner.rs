//! Bar-by-bar simulation loop.
//!
//! Per bar, in this fixed order:
//! 1. Indicators, session, detector (via the scanner)
//! 2. Setup → capacity check → risk sizer → history evaluator → open
//! 3. Exit checks for positions opened on earlier bars
//!
//! `finish` force-closes anything still open at the last close.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::config::{ConfigError, EngineConfig};
use super::exits::resolve_exit;
use super::state::{EngineState, RunResult};
use crate::data::DataError;
use crate::domain::{Bar, CloseReason, ClosedTrade, OpenPosition, RejectReason, RejectedSetup, Setup, TrendState};
use crate::history::HistoryEvaluator;
use crate::risk::RiskSizer;
use crate::scanner::MssScanner;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// What happened on one bar.
#[derive(Debug, Clone, Default)]
pub struct BarEvents {
    pub index: usize,
    pub setup: Option<Setup>,
    pub opened: bool,
    pub rejection: Option<RejectedSetup>,
    pub closed: Vec<ClosedTrade>,
}

/// One isolated simulation. Owns its equity, ledger and detector state.
pub struct Simulation {
    config: EngineConfig,
    scanner: MssScanner,
    sizer: RiskSizer,
    history: HistoryEvaluator,
    state: EngineState,
}

impl Simulation {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let history = HistoryEvaluator::new(config.history.clone(), config.instrument.pip_size);
        Ok(Self::build(config, history))
    }

    /// Start with a pre-seeded history evaluator (e.g. from an earlier trade log).
    pub fn with_history(config: EngineConfig, history: HistoryEvaluator) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, history))
    }

    fn build(config: EngineConfig, history: HistoryEvaluator) -> Self {
        Self {
            scanner: MssScanner::new(&config),
            sizer: RiskSizer::new(config.risk.clone(), config.instrument.clone()),
            state: EngineState::new(config.simulation.initial_capital),
            history,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Process the next bar. A `DataError` leaves the simulation unchanged.
    pub fn on_bar(&mut self, bar: &Bar) -> Result<BarEvents, DataError> {
        let scan = self.scanner.push(bar)?;
        let index = scan.update.index;

        let state = &mut self.state;
        state.trend_timeline.push(scan.update.trend);
        state.stats.bars_processed += 1;
        if scan.tradable {
            state.stats.tradable_bars += 1;
        }
        state.first_timestamp.get_or_insert(bar.timestamp);
        state.last_timestamp = Some(bar.timestamp);
        state.last_close = Some(bar.close);

        let mut events = BarEvents {
            index,
            ..BarEvents::default()
        };

        if let Some(setup) = scan.setup {
            self.state.stats.setups_detected += 1;
            self.state.setups.push(setup.clone());
            match self.admit(&setup) {
                Ok(plan) => {
                    tracing::debug!(
                        index,
                        direction = plan.direction().as_str(),
                        entry = plan.entry_price,
                        stop = plan.stop_loss,
                        target = plan.take_profit,
                        size = plan.position_size,
                        "position opened"
                    );
                    self.state.open_positions.push(OpenPosition::new(plan, bar.timestamp, index));
                    self.state.stats.trades_opened += 1;
                    events.opened = true;
                }
                Err(rejected) => {
                    tracing::debug!(index, reason = rejected.reason.as_str(), "setup rejected");
                    *self.state.stats.rejections.entry(rejected.reason).or_default() += 1;
                    self.state.rejections.push(rejected.clone());
                    events.rejection = Some(rejected);
                }
            }
            events.setup = Some(setup);
        }

        events.closed = self.manage_positions(bar, index, scan.tradable);
        Ok(events)
    }

    /// Capacity, sizing and history checks, in that order.
    fn admit(&self, setup: &Setup) -> Result<crate::domain::TradePlan, RejectedSetup> {
        if self.state.open_positions.len() >= self.config.simulation.max_open_positions {
            return Err(RejectedSetup::new(setup, RejectReason::CapacityReached));
        }
        let plan = self.sizer.size(setup, &self.state.equity)?;
        self.history
            .evaluate(&plan)
            .map_err(|reason| RejectedSetup::new(setup, reason))?;
        Ok(plan)
    }

    fn manage_positions(&mut self, bar: &Bar, index: usize, tradable: bool) -> Vec<ClosedTrade> {
        let policy = self.config.simulation.intrabar_policy;
        let session_exit = self.config.simulation.close_at_session_end && !tradable;

        let mut still_open = Vec::with_capacity(self.state.open_positions.len());
        let mut closed = Vec::new();
        for position in std::mem::take(&mut self.state.open_positions) {
            // Opened at this bar's close: first eligible exit is the next bar.
            if position.open_index >= index {
                still_open.push(position);
                continue;
            }
            let exit = if session_exit {
                Some((bar.open, CloseReason::SessionEnd))
            } else {
                resolve_exit(&position, bar, policy)
            };
            match exit {
                Some((price, reason)) => {
                    closed.push(self.close_position(position, bar.timestamp, index, price, reason));
                }
                None => still_open.push(position),
            }
        }
        self.state.open_positions = still_open;
        closed
    }

    fn close_position(
        &mut self,
        position: OpenPosition,
        timestamp: DateTime<Utc>,
        index: usize,
        price: f64,
        reason: CloseReason,
    ) -> ClosedTrade {
        let pnl = position.pnl_at(price, self.config.instrument.quote_to_account);
        let mut equity = self.state.equity.clone();
        equity.apply(pnl);
        let trade = position.close(timestamp, index, price, reason, pnl, equity.current_capital);

        tracing::debug!(
            index,
            reason = reason.as_str(),
            pnl,
            equity = equity.current_capital,
            "position closed"
        );
        self.state.equity = equity;
        self.history.record(&trade);
        *self.state.stats.close_reasons.entry(reason).or_default() += 1;
        self.state.ledger.append(trade.clone());
        trade
    }

    /// End the run: force-close open positions at the last close.
    pub fn finish(mut self) -> RunResult {
        if let (Some(close), Some(ts)) = (self.state.last_close, self.state.last_timestamp) {
            let index = self.state.bar_index().saturating_sub(1);
            for position in std::mem::take(&mut self.state.open_positions) {
                self.close_position(position, ts, index, close, CloseReason::ForcedClose);
            }
        }

        let state = self.state;
        tracing::info!(
            bars = state.stats.bars_processed,
            setups = state.stats.setups_detected,
            trades = state.ledger.len(),
            rejected = state.stats.rejected_total(),
            final_capital = state.equity.current_capital,
            "simulation finished"
        );
        RunResult {
            initial_capital: self.config.simulation.initial_capital,
            equity: state.equity,
            ledger: state.ledger,
            setups: state.setups,
            rejections: state.rejections,
            stats: state.stats,
            trend_timeline: state.trend_timeline,
            first_timestamp: state.first_timestamp,
            last_timestamp: state.last_timestamp,
        }
    }

    /// Trend for every bar processed so far.
    pub fn trend_timeline(&self) -> &[TrendState] {
        &self.state.trend_timeline
    }
}

/// Run a complete simulation over a bar series.
pub fn run_simulation(bars: &[Bar], config: &EngineConfig) -> Result<RunResult, EngineError> {
    let mut sim = Simulation::new(config.clone())?;
    for bar in bars {
        sim.on_bar(bar)?;
    }
    Ok(sim.finish())
}
