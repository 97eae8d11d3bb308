//! Streaming MSS scanner for live or replayed bar feeds.
//!
//! Bundles the indicator engine, session filter and detector behind a single
//! `push(bar)`. It does not assume a historical dataset exists: bars arrive one
//! at a time and each is validated against the previous one.

use chrono::{DateTime, Utc};

use crate::data::DataError;
use crate::detector::{DetectorPhase, MssDetector};
use crate::domain::{Bar, Setup};
use crate::engine::EngineConfig;
use crate::indicators::{IndicatorEngine, IndicatorUpdate};
use crate::session::SessionWindow;

/// Everything the scanner derived from one bar.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub update: IndicatorUpdate,
    pub tradable: bool,
    pub phase: DetectorPhase,
    pub setup: Option<Setup>,
}

#[derive(Debug, Clone)]
pub struct MssScanner {
    indicators: IndicatorEngine,
    session: SessionWindow,
    detector: MssDetector,
    last_timestamp: Option<DateTime<Utc>>,
}

impl MssScanner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            indicators: IndicatorEngine::new(config.indicators.clone()),
            session: config.session,
            detector: MssDetector::new(
                config.detector.clone(),
                config.risk.stop_bounds,
                config.risk.stop_buffer_pips,
                config.instrument.pip_size,
            ),
            last_timestamp: None,
        }
    }

    /// Number of bars accepted so far.
    pub fn processed(&self) -> usize {
        self.indicators.processed()
    }

    pub fn detector(&self) -> &MssDetector {
        &self.detector
    }

    /// Feed the next bar. Rejects bars that are not strictly later than the
    /// previous one or that violate OHLC invariants; state is untouched on error.
    pub fn push(&mut self, bar: &Bar) -> Result<ScanOutput, DataError> {
        let index = self.processed();
        if let Some(prev) = self.last_timestamp {
            if bar.timestamp < prev {
                return Err(DataError::NonMonotonic {
                    row: index + 1,
                    previous: prev,
                    current: bar.timestamp,
                });
            }
            if bar.timestamp == prev {
                return Err(DataError::Duplicate {
                    row: index + 1,
                    timestamp: bar.timestamp,
                });
            }
        }
        if !bar.is_sane() {
            return Err(DataError::InvalidBar {
                index,
                timestamp: bar.timestamp,
            });
        }
        self.last_timestamp = Some(bar.timestamp);

        let update = self.indicators.update(bar);
        let tradable = self.session.is_tradable(bar.timestamp);
        let setup = self.detector.on_bar(bar, &update, tradable);
        Ok(ScanOutput {
            update,
            tradable,
            phase: self.detector.phase(),
            setup,
        })
    }

    pub fn reset(&mut self) {
        self.indicators.reset();
        self.detector.reset();
        self.last_timestamp = None;
    }
}

/// Scan a whole series and collect every emitted setup.
pub fn scan_setups(bars: &[Bar], config: &EngineConfig) -> Result<Vec<Setup>, DataError> {
    let mut scanner = MssScanner::new(config);
    let mut setups = Vec::new();
    for bar in bars {
        if let Some(setup) = scanner.push(bar)?.setup {
            setups.push(setup);
        }
    }
    Ok(setups)
}
