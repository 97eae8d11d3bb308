//! Bar loading for the runner.
//!
//! Reads a CSV file through the core row reader and runs the series
//! preprocessor over it. Any `DataError` is fatal: the caller never gets a
//! partial bar sequence.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use msslab_core::data::{preprocess, read_csv_file, DataError, PreprocessConfig, PreprocessedSeries};

/// A validated series plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub source: PathBuf,
    pub rows_read: usize,
    pub series: PreprocessedSeries,
}

/// Data-quality summary of a loaded series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub source: String,
    pub rows_read: usize,
    pub bars: usize,
    pub dropped_rows: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub nominal_interval_secs: Option<i64>,
    pub gaps: usize,
    pub missing_bars: i64,
    pub largest_gap_secs: Option<i64>,
}

impl LoadedSeries {
    pub fn summary(&self) -> DataSummary {
        let s = &self.series;
        DataSummary {
            source: self.source.display().to_string(),
            rows_read: self.rows_read,
            bars: s.bars.len(),
            dropped_rows: s.dropped_rows.len(),
            first_timestamp: s.first_timestamp(),
            last_timestamp: s.last_timestamp(),
            nominal_interval_secs: s.nominal_interval.map(|d| d.num_seconds()),
            gaps: s.gaps.len(),
            missing_bars: s.gaps.iter().map(|g| g.missing_bars).sum(),
            largest_gap_secs: s
                .gaps
                .iter()
                .map(|g| g.next - g.previous)
                .max()
                .map(|d: Duration| d.num_seconds()),
        }
    }
}

/// Read and validate a bar file.
pub fn load_series(path: &Path, config: &PreprocessConfig) -> Result<LoadedSeries, DataError> {
    let rows = read_csv_file(path)?;
    let rows_read = rows.len();
    let series = preprocess(&rows, config)?;

    if !series.dropped_rows.is_empty() {
        tracing::warn!(
            path = %path.display(),
            dropped = series.dropped_rows.len(),
            "rows dropped during preprocessing"
        );
    }
    tracing::info!(
        path = %path.display(),
        rows = rows_read,
        bars = series.bars.len(),
        gaps = series.gaps.len(),
        "loaded bar series"
    );

    Ok(LoadedSeries {
        source: path.to_path_buf(),
        rows_read,
        series,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_and_summarizes_a_series_with_a_gap() {
        let f = write_csv(
            "time,open,high,low,close,volume\n\
             2024-01-02 08:00,1.1000,1.1005,1.0995,1.1002,10\n\
             2024-01-02 08:01,1.1002,1.1006,1.1000,1.1004,12\n\
             2024-01-02 08:05,1.1004,1.1008,1.1001,1.1007,9\n",
        );
        let loaded = load_series(f.path(), &PreprocessConfig::default()).unwrap();
        let summary = loaded.summary();
        assert_eq!(summary.rows_read, 3);
        assert_eq!(summary.bars, 3);
        assert_eq!(summary.dropped_rows, 0);
        assert_eq!(summary.nominal_interval_secs, Some(60));
        assert_eq!(summary.gaps, 1);
        assert_eq!(summary.missing_bars, 3);
        assert_eq!(summary.largest_gap_secs, Some(240));
    }

    #[test]
    fn tolerated_ohlc_violations_are_dropped() {
        let f = write_csv(
            "time,open,high,low,close\n\
             2024-01-02 08:00,1.1000,1.1005,1.0995,1.1002\n\
             2024-01-02 08:01,1.1002,1.1000,1.1001,1.1004\n\
             2024-01-02 08:02,1.1004,1.1008,1.1001,1.1007\n\
             2024-01-02 08:03,1.1007,1.1009,1.1003,1.1005\n",
        );
        let strict = load_series(f.path(), &PreprocessConfig::default());
        assert!(matches!(strict, Err(DataError::OhlcViolations { count: 1, .. })));

        let lenient = PreprocessConfig {
            ohlc_violation_tolerance: 0.25,
        };
        let loaded = load_series(f.path(), &lenient).unwrap();
        assert_eq!(loaded.series.bars.len(), 3);
        assert_eq!(loaded.summary().dropped_rows, 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_series(Path::new("/no/such/bars.csv"), &PreprocessConfig::default()).unwrap_err();
        assert!(matches!(err, DataError::Io(_)));
    }
}
