//! Streaming indicator engine: one `update` per bar, in time order.

use serde::{Deserialize, Serialize};

use super::ema::EmaState;
use super::swing::SwingDetector;
use super::trend::classify_trend;
use crate::domain::{Bar, SwingPoint, TrendState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ema_fast: usize,
    pub ema_slow: usize,
    /// Swing window half-width k (window = 2k + 1, confirmation lag = k bars).
    pub swing_lookback: usize,
    /// EMAs closer than this (in price) classify as `Flat`.
    pub flat_tolerance: f64,
    pub require_price_confirmation: bool,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_fast: 50,
            ema_slow: 200,
            swing_lookback: 3,
            flat_tolerance: 1e-7,
            require_price_confirmation: false,
        }
    }
}

/// Indicator output for one processed bar.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorUpdate {
    pub index: usize,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub trend: TrendState,
    /// Swings confirmed by this bar (their `index` is `index - k`).
    pub new_swings: Vec<SwingPoint>,
}

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
    fast: EmaState,
    slow: EmaState,
    swings: SwingDetector,
    processed: usize,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self {
            fast: EmaState::new(config.ema_fast),
            slow: EmaState::new(config.ema_slow),
            swings: SwingDetector::new(config.swing_lookback),
            processed: 0,
            config,
        }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Bars needed before the trend can be anything but `Flat`.
    pub fn warmup_bars(&self) -> usize {
        self.config.ema_fast.max(self.config.ema_slow)
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn update(&mut self, bar: &Bar) -> IndicatorUpdate {
        let index = self.processed;
        self.processed += 1;

        let ema_fast = self.fast.update(bar.close);
        let ema_slow = self.slow.update(bar.close);
        let trend = classify_trend(
            ema_fast,
            ema_slow,
            bar.close,
            self.config.flat_tolerance,
            self.config.require_price_confirmation,
        );
        let new_swings = self.swings.update(bar);

        IndicatorUpdate {
            index,
            ema_fast,
            ema_slow,
            trend,
            new_swings,
        }
    }

    /// Start over as if no bar had been seen.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

/// Lazy stream of indicator updates over a bar slice.
pub fn indicator_updates<'a>(
    config: &IndicatorConfig,
    bars: &'a [Bar],
) -> impl Iterator<Item = IndicatorUpdate> + 'a {
    let mut engine = IndicatorEngine::new(config.clone());
    bars.iter().map(move |bar| engine.update(bar))
}
