//! CSV ingestion into `RawRow`s.
//!
//! Column names are matched case-insensitively. `time` or `timestamp` is
//! required along with `open/high/low/close`; `volume` or `tick_volume` is
//! optional and any other column is ignored.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};

use super::{DataError, RawRow};

const TIME_ALIASES: [&str; 2] = ["time", "timestamp"];
const VOLUME_ALIASES: [&str; 2] = ["volume", "tick_volume"];
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
];

struct Columns {
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, DataError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let require = |name: &str| find(&[name]).ok_or_else(|| DataError::MissingColumn(name.to_string()));

        Ok(Self {
            time: find(&TIME_ALIASES).ok_or_else(|| DataError::MissingColumn("time".to_string()))?,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find(&VOLUME_ALIASES),
        })
    }
}

/// Parse a UTC timestamp in any of the accepted formats.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, `YYYY.MM.DD HH:MM[:SS]` (MT5
/// export style), or integer Unix seconds. Naive forms are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    None
}

fn parse_field(record: &csv::StringRecord, idx: usize, column: &str, row: usize) -> Result<f64, DataError> {
    let raw = record.get(idx).unwrap_or("").trim();
    raw.parse::<f64>().map_err(|_| DataError::Parse {
        row,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

/// Read rows from any CSV source. Row numbers are 1-based, header excluded.
pub fn read_rows<R: Read>(source: R) -> Result<Vec<RawRow>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source);
    let columns = Columns::from_headers(reader.headers()?)?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 1;

        let time_raw = record.get(columns.time).unwrap_or("");
        let timestamp = parse_timestamp(time_raw).ok_or_else(|| DataError::Parse {
            row,
            column: "time".to_string(),
            value: time_raw.to_string(),
        })?;

        let volume = match columns.volume {
            Some(idx) => match record.get(idx).map(str::trim) {
                None | Some("") => None,
                Some(_) => Some(parse_field(&record, idx, "volume", row)?),
            },
            None => None,
        };

        rows.push(RawRow {
            row,
            timestamp,
            open: parse_field(&record, columns.open, "open", row)?,
            high: parse_field(&record, columns.high, "high", row)?,
            low: parse_field(&record, columns.low, "low", row)?,
            close: parse_field(&record, columns.close, "close", row)?,
            volume,
        });
    }
    Ok(rows)
}

/// Read rows from a CSV file on disk.
pub fn read_csv_file(path: &Path) -> Result<Vec<RawRow>, DataError> {
    let file = File::open(path)?;
    read_rows(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reads_mt5_style_export() {
        let csv = "time,open,high,low,close,tick_volume,spread\n\
                   2024.01.02 08:00,1.1000,1.1005,1.0998,1.1003,120,1\n\
                   2024.01.02 08:01,1.1003,1.1007,1.1001,1.1006,95,1\n";
        let rows = read_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, 1);
        assert_eq!(rows[0].timestamp, Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap());
        assert_eq!(rows[1].volume, Some(95.0));
    }

    #[test]
    fn header_match_is_case_insensitive_and_volume_optional() {
        let csv = "Timestamp,Open,High,Low,Close\n2024-01-02T08:00:00Z,1.1,1.2,1.0,1.15\n";
        let rows = read_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].volume, None);
        assert_eq!(rows[0].close, 1.15);
    }

    #[test]
    fn missing_column_is_named() {
        let csv = "time,open,high,close\n2024-01-02 08:00,1,1,1\n";
        match read_rows(csv.as_bytes()) {
            Err(DataError::MissingColumn(name)) => assert_eq!(name, "low"),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn bad_number_reports_row_and_column() {
        let csv = "time,open,high,low,close\n\
                   2024-01-02 08:00,1.1,1.2,1.0,1.15\n\
                   2024-01-02 08:01,1.1,abc,1.0,1.15\n";
        match read_rows(csv.as_bytes()) {
            Err(DataError::Parse { row, column, value }) => {
                assert_eq!(row, 2);
                assert_eq!(column, "high");
                assert_eq!(value, "abc");
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 8, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-02 08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 08:30"), Some(expected));
        assert_eq!(parse_timestamp("2024.01.02 08:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp(&expected.timestamp().to_string()), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
