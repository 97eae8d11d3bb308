//! MSS detector: the per-bar state machine that turns trend + swings into setups.
//!
//! Phases:
//! - `Idle`: trend is `Flat`, nothing is tracked.
//! - `Watching`: a direction bias is set and (once available) a breakout
//!   level is stored: the most recent confirmed swing beyond price against
//!   the bias (swing high above close for longs, swing low below close for shorts).
//! - `Triggered`: the level broke on this bar and a `Setup` was emitted. The
//!   next bar returns to `Watching` and only swings confirmed after the
//!   consumed one can re-arm it.
//!
//! A break outside the session window, or with a stop distance (stop buffer
//! included) outside the pip bounds, emits nothing and leaves the level armed.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Direction, Setup, SwingKind, SwingPoint};
use crate::indicators::IndicatorUpdate;
use crate::risk::StopBounds;

/// Confirmed swings kept per side for stop-anchor lookup.
const ANCHOR_HISTORY: usize = 64;

/// What counts as crossing the breakout level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakConfirmation {
    /// Close beyond the level.
    #[default]
    Close,
    /// High (long) or low (short) beyond the level.
    Wick,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub break_confirmation: BreakConfirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectorPhase {
    Idle,
    Watching,
    Triggered,
}

#[derive(Debug, Clone)]
pub struct MssDetector {
    config: DetectorConfig,
    bounds: StopBounds,
    /// Pips the sizer adds beyond the anchor; bounds apply to the buffered distance.
    stop_buffer_pips: f64,
    pip_size: f64,
    phase: DetectorPhase,
    bias: Option<Direction>,
    level: Option<SwingPoint>,
    /// Index of the last swing consumed by a trigger; re-arming needs a later one.
    consumed_through: Option<usize>,
    highs: VecDeque<SwingPoint>,
    lows: VecDeque<SwingPoint>,
}

impl MssDetector {
    pub fn new(config: DetectorConfig, bounds: StopBounds, stop_buffer_pips: f64, pip_size: f64) -> Self {
        Self {
            config,
            bounds,
            stop_buffer_pips: stop_buffer_pips.max(0.0),
            pip_size,
            phase: DetectorPhase::Idle,
            bias: None,
            level: None,
            consumed_through: None,
            highs: VecDeque::new(),
            lows: VecDeque::new(),
        }
    }

    pub fn phase(&self) -> DetectorPhase {
        self.phase
    }

    pub fn bias(&self) -> Option<Direction> {
        self.bias
    }

    /// The swing currently armed as breakout level, if any.
    pub fn breakout_level(&self) -> Option<&SwingPoint> {
        self.level.as_ref()
    }

    /// Process one bar. `update` must be the indicator output for this same
    /// bar and `tradable` the session verdict for its timestamp.
    pub fn on_bar(&mut self, bar: &Bar, update: &IndicatorUpdate, tradable: bool) -> Option<Setup> {
        for swing in &update.new_swings {
            self.remember(*swing);
        }

        let desired = update.trend.direction();
        if desired != self.bias {
            // Trend flip or loss of trend: drop everything, re-arm fresh.
            self.bias = desired;
            self.level = None;
            self.consumed_through = None;
            self.phase = match desired {
                Some(_) => DetectorPhase::Watching,
                None => DetectorPhase::Idle,
            };
        } else if self.phase == DetectorPhase::Triggered {
            self.phase = DetectorPhase::Watching;
        }

        let direction = self.bias?;

        let setup = self.check_trigger(bar, update, direction, tradable);
        if setup.is_some() {
            self.phase = DetectorPhase::Triggered;
        }
        self.rearm(bar, direction);
        setup
    }

    fn remember(&mut self, swing: SwingPoint) {
        let side = match swing.kind {
            SwingKind::High => &mut self.highs,
            SwingKind::Low => &mut self.lows,
        };
        side.push_back(swing);
        if side.len() > ANCHOR_HISTORY {
            side.pop_front();
        }
    }

    fn check_trigger(
        &mut self,
        bar: &Bar,
        update: &IndicatorUpdate,
        direction: Direction,
        tradable: bool,
    ) -> Option<Setup> {
        let level = self.level?;
        let probe = match (self.config.break_confirmation, direction) {
            (BreakConfirmation::Close, _) => bar.close,
            (BreakConfirmation::Wick, Direction::Long) => bar.high,
            (BreakConfirmation::Wick, Direction::Short) => bar.low,
        };
        let broken = match direction {
            Direction::Long => probe > level.price,
            Direction::Short => probe < level.price,
        };
        if !broken || !tradable {
            return None;
        }

        let entry = bar.close;
        let anchor = self.stop_anchor(direction, entry)?;
        let stop_pips = (entry - anchor.price).abs() / self.pip_size + self.stop_buffer_pips;
        if !self.bounds.contains(stop_pips) {
            tracing::debug!(
                index = update.index,
                stop_pips,
                "structure break suppressed: stop distance out of bounds"
            );
            return None;
        }

        self.consumed_through = Some(level.index);
        self.level = None;

        let setup = Setup {
            timestamp: bar.timestamp,
            bar_index: update.index,
            direction,
            entry_price: entry,
            breakout_level: level.price,
            stop_level: anchor.price,
            trend_at_detection: update.trend,
            swing_reference: level,
            stop_anchor: anchor,
        };
        tracing::debug!(
            index = setup.bar_index,
            direction = direction.as_str(),
            breakout = setup.breakout_level,
            stop = setup.stop_level,
            "MSS setup detected"
        );
        Some(setup)
    }

    /// Most recent confirmed opposite swing on the losing side of `entry`.
    fn stop_anchor(&self, direction: Direction, entry: f64) -> Option<SwingPoint> {
        match direction {
            Direction::Long => self.lows.iter().rev().find(|s| s.price < entry).copied(),
            Direction::Short => self.highs.iter().rev().find(|s| s.price > entry).copied(),
        }
    }

    /// Point the level at the newest eligible swing, if it is newer than the current one.
    fn rearm(&mut self, bar: &Bar, direction: Direction) {
        let candidate = match direction {
            Direction::Long => self.highs.back(),
            Direction::Short => self.lows.back(),
        };
        let Some(candidate) = candidate.copied() else {
            return;
        };
        let fresh = self.consumed_through.map_or(true, |c| candidate.index > c);
        let newer = self.level.map_or(true, |l| candidate.index > l.index);
        let beyond = match direction {
            Direction::Long => candidate.price > bar.close,
            Direction::Short => candidate.price < bar.close,
        };
        if fresh && newer && beyond {
            self.level = Some(candidate);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone(), self.bounds, self.stop_buffer_pips, self.pip_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TrendState;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(i: i64, o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap() + Duration::minutes(i),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: None,
        }
    }

    fn swing(index: usize, price: f64, kind: SwingKind) -> SwingPoint {
        SwingPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap() + Duration::minutes(index as i64),
            price,
            kind,
            index,
        }
    }

    fn update(index: usize, trend: TrendState, new_swings: Vec<SwingPoint>) -> IndicatorUpdate {
        IndicatorUpdate {
            index,
            ema_fast: Some(1.1),
            ema_slow: Some(1.1),
            trend,
            new_swings,
        }
    }

    fn detector() -> MssDetector {
        buffered_detector(0.0)
    }

    fn buffered_detector(stop_buffer_pips: f64) -> MssDetector {
        MssDetector::new(DetectorConfig::default(), StopBounds::default(), stop_buffer_pips, 0.0001)
    }

    /// Arms a long detector with a swing high at 1.1010 and a swing low at 1.0995.
    fn armed_long() -> MssDetector {
        arm_long(detector(), 1.0995)
    }

    fn arm_long(mut d: MssDetector, low: f64) -> MssDetector {
        let swings = vec![swing(1, 1.1010, SwingKind::High), swing(2, low, SwingKind::Low)];
        let out = d.on_bar(
            &bar(5, 1.1000, 1.1004, 1.0998, 1.1002),
            &update(5, TrendState::Up, swings),
            true,
        );
        assert!(out.is_none());
        assert_eq!(d.phase(), DetectorPhase::Watching);
        assert_eq!(d.breakout_level().map(|s| s.index), Some(1));
        d
    }

    #[test]
    fn flat_trend_is_idle() {
        let mut d = detector();
        let out = d.on_bar(&bar(0, 1.1, 1.1, 1.1, 1.1), &update(0, TrendState::Flat, vec![]), true);
        assert!(out.is_none());
        assert_eq!(d.phase(), DetectorPhase::Idle);
    }

    #[test]
    fn close_above_level_triggers_long() {
        let mut d = armed_long();
        let setup = d
            .on_bar(&bar(6, 1.1002, 1.1015, 1.1001, 1.1012), &update(6, TrendState::Up, vec![]), true)
            .unwrap();
        assert_eq!(setup.direction, Direction::Long);
        assert_eq!(setup.bar_index, 6);
        assert!((setup.breakout_level - 1.1010).abs() < 1e-12);
        assert!((setup.stop_level - 1.0995).abs() < 1e-12);
        assert!((setup.entry_price - 1.1012).abs() < 1e-12);
        assert_eq!(d.phase(), DetectorPhase::Triggered);
        assert!(d.breakout_level().is_none());
    }

    #[test]
    fn wick_only_break_needs_wick_mode() {
        let probe = bar(6, 1.1002, 1.1015, 1.1001, 1.1008);
        let mut d = armed_long();
        assert!(d.on_bar(&probe, &update(6, TrendState::Up, vec![]), true).is_none());

        let mut d = MssDetector::new(
            DetectorConfig {
                break_confirmation: BreakConfirmation::Wick,
            },
            StopBounds::default(),
            0.0,
            0.0001,
        );
        let swings = vec![swing(1, 1.1010, SwingKind::High), swing(2, 1.0995, SwingKind::Low)];
        d.on_bar(&bar(5, 1.1000, 1.1004, 1.0998, 1.1002), &update(5, TrendState::Up, swings), true);
        let setup = d.on_bar(&probe, &update(6, TrendState::Up, vec![]), true).unwrap();
        assert!((setup.entry_price - 1.1008).abs() < 1e-12);
    }

    #[test]
    fn out_of_session_break_keeps_level() {
        let mut d = armed_long();
        let out = d.on_bar(&bar(6, 1.1002, 1.1015, 1.1001, 1.1012), &update(6, TrendState::Up, vec![]), false);
        assert!(out.is_none());
        assert_eq!(d.breakout_level().map(|s| s.index), Some(1));
        assert_eq!(d.phase(), DetectorPhase::Watching);
    }

    #[test]
    fn wide_stop_suppresses_and_keeps_watching() {
        let mut d = armed_long();
        // Close 1.1030 is 35 pips above the 1.0995 anchor.
        let out = d.on_bar(&bar(6, 1.1002, 1.1032, 1.1001, 1.1030), &update(6, TrendState::Up, vec![]), true);
        assert!(out.is_none());
        assert_eq!(d.phase(), DetectorPhase::Watching);
        assert!(d.breakout_level().is_some());
    }

    #[test]
    fn buffered_stop_past_upper_bound_keeps_level() {
        // 17 raw pips + 4 buffer = 21 > 20.
        let mut d = arm_long(buffered_detector(4.0), 1.0995);
        let out = d.on_bar(&bar(6, 1.1002, 1.1015, 1.1001, 1.1012), &update(6, TrendState::Up, vec![]), true);
        assert!(out.is_none());
        assert_eq!(d.phase(), DetectorPhase::Watching);
        assert_eq!(d.breakout_level().map(|s| s.index), Some(1));
    }

    #[test]
    fn buffered_setup_is_accepted_by_sizer() {
        use crate::domain::{EquityState, Instrument};
        use crate::risk::{RiskConfig, RiskSizer};

        // 17 raw pips + 2 buffer = 19.
        let mut d = arm_long(buffered_detector(2.0), 1.0995);
        let setup = d
            .on_bar(&bar(6, 1.1002, 1.1015, 1.1001, 1.1012), &update(6, TrendState::Up, vec![]), true)
            .unwrap();
        let sizer = RiskSizer::new(
            RiskConfig {
                stop_buffer_pips: 2.0,
                ..RiskConfig::default()
            },
            Instrument::default(),
        );
        let plan = sizer.size(&setup, &EquityState::new(10_000.0)).unwrap();
        assert!((plan.stop_pips(0.0001) - 19.0).abs() < 1e-6);
    }

    #[test]
    fn buffer_lifts_tight_stop_into_bounds() {
        // Anchor 0.5 pips under the trigger close: too tight alone, 1.5 pips buffered.
        let trigger = bar(6, 1.1002, 1.1015, 1.1001, 1.1012);
        let mut plain = arm_long(detector(), 1.10115);
        assert!(plain.on_bar(&trigger, &update(6, TrendState::Up, vec![]), true).is_none());

        let mut buffered = arm_long(buffered_detector(1.0), 1.10115);
        let setup = buffered
            .on_bar(&trigger, &update(6, TrendState::Up, vec![]), true)
            .unwrap();
        assert!((setup.stop_level - 1.10115).abs() < 1e-12);
    }

    #[test]
    fn consumed_swing_does_not_retrigger() {
        let mut d = armed_long();
        assert!(d
            .on_bar(&bar(6, 1.1002, 1.1015, 1.1001, 1.1012), &update(6, TrendState::Up, vec![]), true)
            .is_some());
        let again = d.on_bar(&bar(7, 1.1012, 1.1016, 1.1010, 1.1014), &update(7, TrendState::Up, vec![]), true);
        assert!(again.is_none());
        assert_eq!(d.phase(), DetectorPhase::Watching);
    }

    #[test]
    fn newer_swing_replaces_level() {
        let mut d = armed_long();
        let newer = vec![swing(4, 1.1006, SwingKind::High)];
        d.on_bar(&bar(7, 1.1002, 1.1003, 1.0999, 1.1000), &update(7, TrendState::Up, newer), true);
        assert_eq!(d.breakout_level().map(|s| s.index), Some(4));
        let setup = d
            .on_bar(&bar(8, 1.1000, 1.1009, 1.0999, 1.1007), &update(8, TrendState::Up, vec![]), true)
            .unwrap();
        assert!((setup.breakout_level - 1.1006).abs() < 1e-12);
    }

    #[test]
    fn trend_flip_rearms_in_new_direction() {
        let mut d = armed_long();
        let out = d.on_bar(&bar(6, 1.1002, 1.1003, 1.0990, 1.0992), &update(6, TrendState::Down, vec![]), true);
        assert!(out.is_none());
        assert_eq!(d.bias(), Some(Direction::Short));
        // Swing low 1.0995 is above the 1.0992 close, so it cannot be the short level.
        assert!(d.breakout_level().is_none());

        let lower = vec![swing(4, 1.0998, SwingKind::High), swing(5, 1.0985, SwingKind::Low)];
        d.on_bar(&bar(7, 1.0992, 1.0996, 1.0988, 1.0990), &update(7, TrendState::Down, lower), true);
        let setup = d
            .on_bar(&bar(8, 1.0990, 1.0992, 1.0980, 1.0982), &update(8, TrendState::Down, vec![]), true)
            .unwrap();
        assert_eq!(setup.direction, Direction::Short);
        assert!((setup.stop_level - 1.0998).abs() < 1e-12);
    }

    #[test]
    fn no_anchor_means_no_setup() {
        let mut d = detector();
        let only_high = vec![swing(1, 1.1010, SwingKind::High)];
        d.on_bar(&bar(5, 1.1000, 1.1004, 1.0998, 1.1002), &update(5, TrendState::Up, only_high), true);
        let out = d.on_bar(&bar(6, 1.1002, 1.1015, 1.1001, 1.1012), &update(6, TrendState::Up, vec![]), true);
        assert!(out.is_none());
        assert_eq!(d.phase(), DetectorPhase::Watching);
    }
}
