//! Trend classification from the fast/slow EMA pair.

use crate::domain::TrendState;

/// Classify one bar.
///
/// `Flat` when either EMA is undefined or the two are within `tolerance`.
/// With `require_price_confirmation`, `Up` also needs the close above both
/// EMAs (`Down`: below both); otherwise the bar is `Flat`.
pub fn classify_trend(
    ema_fast: Option<f64>,
    ema_slow: Option<f64>,
    close: f64,
    tolerance: f64,
    require_price_confirmation: bool,
) -> TrendState {
    let (fast, slow) = match (ema_fast, ema_slow) {
        (Some(f), Some(s)) => (f, s),
        _ => return TrendState::Flat,
    };
    if (fast - slow).abs() <= tolerance {
        return TrendState::Flat;
    }
    let raw = if fast > slow {
        TrendState::Up
    } else {
        TrendState::Down
    };
    if !require_price_confirmation {
        return raw;
    }
    match raw {
        TrendState::Up if close > fast && close > slow => TrendState::Up,
        TrendState::Down if close < fast && close < slow => TrendState::Down,
        _ => TrendState::Flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_emas_are_flat() {
        assert_eq!(classify_trend(None, Some(1.1), 1.1, 1e-7, false), TrendState::Flat);
        assert_eq!(classify_trend(Some(1.1), None, 1.1, 1e-7, false), TrendState::Flat);
    }

    #[test]
    fn fast_above_slow_is_up() {
        assert_eq!(classify_trend(Some(1.102), Some(1.100), 1.09, 1e-7, false), TrendState::Up);
        assert_eq!(classify_trend(Some(1.098), Some(1.100), 1.11, 1e-7, false), TrendState::Down);
    }

    #[test]
    fn negligible_spread_is_flat() {
        assert_eq!(
            classify_trend(Some(1.100_000_05), Some(1.1), 1.1, 1e-7, false),
            TrendState::Flat
        );
    }

    #[test]
    fn price_confirmation_demotes_to_flat() {
        // Fast above slow but close below both.
        assert_eq!(classify_trend(Some(1.102), Some(1.100), 1.099, 1e-7, true), TrendState::Flat);
        assert_eq!(classify_trend(Some(1.102), Some(1.100), 1.103, 1e-7, true), TrendState::Up);
        assert_eq!(classify_trend(Some(1.098), Some(1.100), 1.097, 1e-7, true), TrendState::Down);
    }
}
