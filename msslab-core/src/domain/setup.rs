//! Setup: a candidate MSS entry emitted by the detector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::swing::SwingPoint;
use super::trend::{Direction, TrendState};

/// Immutable record of a confirmed structure break.
///
/// `breakout_level` is the swing price that was broken (`swing_reference`),
/// `stop_level` is the opposite swing the stop is anchored to (`stop_anchor`).
/// The entry reference is always the close of the trigger bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub timestamp: DateTime<Utc>,
    pub bar_index: usize,
    pub direction: Direction,
    pub entry_price: f64,
    pub breakout_level: f64,
    pub stop_level: f64,
    pub trend_at_detection: TrendState,
    pub swing_reference: SwingPoint,
    pub stop_anchor: SwingPoint,
}

impl Setup {
    /// Absolute distance between the entry reference and the stop anchor.
    pub fn anchor_distance(&self) -> f64 {
        (self.entry_price - self.stop_level).abs()
    }
}
