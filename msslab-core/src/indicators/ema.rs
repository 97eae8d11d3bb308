//! Exponential Moving Average (EMA), streaming.
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seed: EMA[period-1] = SMA of the first `period` values.
//! Undefined (`None`) before `period` values have been seen.

#[derive(Debug, Clone, PartialEq)]
pub struct EmaState {
    period: usize,
    alpha: f64,
    seed_sum: f64,
    count: usize,
    value: Option<f64>,
}

impl EmaState {
    /// A period of 0 is treated as 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            count: 0,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Feed one value; returns the EMA after it, if warmed up.
    pub fn update(&mut self, x: f64) -> Option<f64> {
        self.count += 1;
        match self.value {
            Some(prev) => {
                self.value = Some(self.alpha * x + (1.0 - self.alpha) * prev);
            }
            None => {
                self.seed_sum += x;
                if self.count == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.period);
    }
}

/// EMA over a whole slice, one entry per input value.
pub fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut state = EmaState::new(period);
    values.iter().map(|&v| state.update(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn ema_period_1_equals_input() {
        let result = ema_series(&[100.0, 200.0, 300.0], 1);
        assert_approx(result[0].unwrap(), 100.0, DEFAULT_EPSILON);
        assert_approx(result[1].unwrap(), 200.0, DEFAULT_EPSILON);
        assert_approx(result[2].unwrap(), 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 0.5; seed at index 2 = SMA(10,11,12) = 11
        // EMA[3] = 0.5*13 + 0.5*11 = 12; EMA[4] = 0.5*14 + 0.5*12 = 13
        let result = ema_series(&[10.0, 11.0, 12.0, 13.0, 14.0], 3);
        assert!(result[0].is_none());
        assert!(result[1].is_none());
        assert_approx(result[2].unwrap(), 11.0, DEFAULT_EPSILON);
        assert_approx(result[3].unwrap(), 12.0, DEFAULT_EPSILON);
        assert_approx(result[4].unwrap(), 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_undefined_until_warm() {
        let mut ema = EmaState::new(50);
        for i in 0..49 {
            assert!(ema.update(1.1 + i as f64 * 1e-4).is_none());
        }
        assert!(ema.update(1.2).is_some());
        assert!(ema.is_ready());
    }

    #[test]
    fn ema_constant_input_is_constant() {
        let result = ema_series(&[1.2345; 30], 10);
        for v in result.iter().skip(9) {
            assert_approx(v.unwrap(), 1.2345, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn zero_period_behaves_as_one() {
        let ema = EmaState::new(0);
        assert_eq!(ema.period(), 1);
    }

    #[test]
    fn reset_forgets_history() {
        let mut ema = EmaState::new(2);
        ema.update(1.0);
        ema.update(2.0);
        ema.reset();
        assert!(ema.value().is_none());
        assert!(ema.update(5.0).is_none());
        assert_approx(ema.update(7.0).unwrap(), 6.0, DEFAULT_EPSILON);
    }
}
