//! Swing-point detection with a symmetric window and confirmation lag.
//!
//! Bar i is a swing high if its high is the strict maximum of highs over
//! [i-k, i+k] (swing low: strict minimum of lows). The decision for bar i is
//! made when bar i+k arrives, never earlier, and is never revised. The first
//! k bars lack a full left window and are never swings. One bar may be both.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::domain::{Bar, SwingKind, SwingPoint};

#[derive(Debug, Clone, Copy)]
struct WindowBar {
    index: usize,
    timestamp: DateTime<Utc>,
    high: f64,
    low: f64,
}

#[derive(Debug, Clone)]
pub struct SwingDetector {
    lookback: usize,
    window: VecDeque<WindowBar>,
    next_index: usize,
}

impl SwingDetector {
    /// A lookback of 0 is treated as 1.
    pub fn new(lookback: usize) -> Self {
        let lookback = lookback.max(1);
        Self {
            lookback,
            window: VecDeque::with_capacity(2 * lookback + 1),
            next_index: 0,
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Feed the next bar; returns swings confirmed by it (high first).
    pub fn update(&mut self, bar: &Bar) -> Vec<SwingPoint> {
        let width = 2 * self.lookback + 1;
        self.window.push_back(WindowBar {
            index: self.next_index,
            timestamp: bar.timestamp,
            high: bar.high,
            low: bar.low,
        });
        self.next_index += 1;
        if self.window.len() > width {
            self.window.pop_front();
        }
        if self.window.len() < width {
            return Vec::new();
        }

        let center = self.window[self.lookback];
        let others = self
            .window
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.lookback)
            .map(|(_, b)| b);

        let mut is_high = true;
        let mut is_low = true;
        for b in others {
            if b.high >= center.high {
                is_high = false;
            }
            if b.low <= center.low {
                is_low = false;
            }
        }

        let mut confirmed = Vec::new();
        if is_high {
            confirmed.push(SwingPoint {
                timestamp: center.timestamp,
                price: center.high,
                kind: SwingKind::High,
                index: center.index,
            });
        }
        if is_low {
            confirmed.push(SwingPoint {
                timestamp: center.timestamp,
                price: center.low,
                kind: SwingKind::Low,
                index: center.index,
            });
        }
        confirmed
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.lookback);
    }
}

/// All swings in a series, in confirmation order.
pub fn detect_swings(bars: &[Bar], lookback: usize) -> Vec<SwingPoint> {
    let mut detector = SwingDetector::new(lookback);
    bars.iter().flat_map(|b| detector.update(b)).collect()
}
