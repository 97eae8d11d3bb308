//! Indicator engine: streaming EMA, swing detection and trend classification.
//!
//! Every indicator is an explicit state object updated once per bar. The batch
//! helpers (`ema_series`, `detect_swings`) drive the same state objects, so
//! incremental and batch results are identical by construction.

pub mod ema;
pub mod engine;
pub mod swing;
pub mod trend;

pub use ema::{ema_series, EmaState};
pub use engine::{indicator_updates, IndicatorConfig, IndicatorEngine, IndicatorUpdate};
pub use swing::{detect_swings, SwingDetector};
pub use trend::classify_trend;

/// Create synthetic bars from close prices for testing.
///
/// Minute bars from 2024-01-02 08:00 UTC: open = prev close (or close for the
/// first bar), high = max(open,close) + 0.0002, low = min(open,close) - 0.0002.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 0.0002,
                low: open.min(close) - 0.0002,
                close,
                volume: None,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
