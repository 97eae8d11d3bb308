//! Data layer: raw row ingestion and the series preprocessor.
//!
//! - `csv_reader`: tolerant CSV parsing into `RawRow`s (column aliases, several
//!   timestamp formats).
//! - `preprocess`: validation into a canonical, gap-annotated `Bar` sequence.
//!
//! Any error here is fatal for a run: the simulation never starts on data
//! that failed validation.

pub mod csv_reader;
pub mod preprocess;

pub use csv_reader::{parse_timestamp, read_csv_file, read_rows};
pub use preprocess::{preprocess, Gap, PreprocessConfig, PreprocessedSeries};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// One unvalidated input row. `row` is the 1-based data row number (header excluded).
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub row: usize,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("row {row}: cannot parse column '{column}' from '{value}'")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: non-finite value in column '{column}'")]
    NonFinite { row: usize, column: String },

    #[error("row {row}: timestamp {current} is earlier than previous {previous}")]
    NonMonotonic {
        row: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("row {row}: duplicate timestamp {timestamp}")]
    Duplicate {
        row: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("{count} of {total} rows violate OHLC invariants (first at row {first_row})")]
    OhlcViolations {
        count: usize,
        total: usize,
        first_row: usize,
    },

    #[error("bar {index} at {timestamp} violates OHLC invariants")]
    InvalidBar {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("input contains no usable rows")]
    Empty,
}
