//! Series preprocessor: raw rows in, validated `Bar`s out.
//!
//! Checks, in row order: finite values, strictly increasing timestamps, OHLC
//! sanity. Gaps are reported, never filled.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{DataError, RawRow};
use crate::domain::Bar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Fraction of rows allowed to violate OHLC invariants. Violating rows
    /// within the tolerance are dropped. 0.0 rejects any violation.
    pub ohlc_violation_tolerance: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            ohlc_violation_tolerance: 0.0,
        }
    }
}

/// A spacing between consecutive bars larger than the nominal interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    /// Index (in the output bar sequence) of the bar after the gap.
    pub index: usize,
    pub previous: DateTime<Utc>,
    pub next: DateTime<Utc>,
    /// Estimated number of bars missing at the nominal interval.
    pub missing_bars: i64,
}

#[derive(Debug, Clone)]
pub struct PreprocessedSeries {
    pub bars: Vec<Bar>,
    pub gaps: Vec<Gap>,
    /// Row numbers dropped for OHLC violations (within tolerance).
    pub dropped_rows: Vec<usize>,
    /// Smallest positive spacing observed; `None` for a single bar.
    pub nominal_interval: Option<Duration>,
}

impl PreprocessedSeries {
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|b| b.timestamp)
    }
}

/// Validate and normalize raw rows.
///
/// Deterministic, and all-or-nothing: either every emitted bar satisfies the
/// OHLC invariant or a `DataError` is returned.
pub fn preprocess(rows: &[RawRow], config: &PreprocessConfig) -> Result<PreprocessedSeries, DataError> {
    if rows.is_empty() {
        return Err(DataError::Empty);
    }

    let mut previous: Option<DateTime<Utc>> = None;
    let mut candidates: Vec<(usize, Bar)> = Vec::with_capacity(rows.len());
    let mut violations: Vec<usize> = Vec::new();

    for raw in rows {
        check_finite(raw)?;

        if let Some(prev) = previous {
            if raw.timestamp < prev {
                return Err(DataError::NonMonotonic {
                    row: raw.row,
                    previous: prev,
                    current: raw.timestamp,
                });
            }
            if raw.timestamp == prev {
                return Err(DataError::Duplicate {
                    row: raw.row,
                    timestamp: raw.timestamp,
                });
            }
        }
        previous = Some(raw.timestamp);

        let bar = Bar {
            timestamp: raw.timestamp,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
        };
        if bar.is_sane() {
            candidates.push((raw.row, bar));
        } else {
            violations.push(raw.row);
        }
    }

    if !violations.is_empty() {
        let total = rows.len();
        let allowed = (config.ohlc_violation_tolerance.max(0.0) * total as f64).floor() as usize;
        if violations.len() > allowed {
            return Err(DataError::OhlcViolations {
                count: violations.len(),
                total,
                first_row: violations[0],
            });
        }
        tracing::warn!(
            dropped = violations.len(),
            total,
            first_row = violations[0],
            "dropping rows that violate OHLC invariants"
        );
    }

    let bars: Vec<Bar> = candidates.into_iter().map(|(_, bar)| bar).collect();
    if bars.is_empty() {
        return Err(DataError::Empty);
    }

    let nominal_interval = nominal_interval(&bars);
    let gaps = match nominal_interval {
        Some(nominal) => find_gaps(&bars, nominal),
        None => Vec::new(),
    };
    if !gaps.is_empty() {
        tracing::warn!(gaps = gaps.len(), "series contains gaps; bars are not interpolated");
    }

    Ok(PreprocessedSeries {
        bars,
        gaps,
        dropped_rows: violations,
        nominal_interval,
    })
}

fn check_finite(raw: &RawRow) -> Result<(), DataError> {
    let fields = [
        ("open", raw.open),
        ("high", raw.high),
        ("low", raw.low),
        ("close", raw.close),
    ];
    for (column, value) in fields {
        if !value.is_finite() {
            return Err(DataError::NonFinite {
                row: raw.row,
                column: column.to_string(),
            });
        }
    }
    if let Some(v) = raw.volume {
        if !v.is_finite() {
            return Err(DataError::NonFinite {
                row: raw.row,
                column: "volume".to_string(),
            });
        }
    }
    Ok(())
}

fn nominal_interval(bars: &[Bar]) -> Option<Duration> {
    bars.windows(2)
        .map(|w| w[1].timestamp - w[0].timestamp)
        .filter(|d| *d > Duration::zero())
        .min()
}

fn find_gaps(bars: &[Bar], nominal: Duration) -> Vec<Gap> {
    let nominal_secs = nominal.num_seconds().max(1);
    bars.windows(2)
        .enumerate()
        .filter_map(|(i, w)| {
            let spacing = w[1].timestamp - w[0].timestamp;
            if spacing > nominal {
                Some(Gap {
                    index: i + 1,
                    previous: w[0].timestamp,
                    next: w[1].timestamp,
                    missing_bars: spacing.num_seconds() / nominal_secs - 1,
                })
            } else {
                None
            }
        })
        .collect()
}
