use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::info;
use std::io::Read;
use std::path::Path;

use crate::signal::RawRow;

/// Read headerless `time,voltage` rows from a CSV file.
///
/// Ragged rows are kept; a missing field becomes an empty string and is dropped later by
/// cleaning.
pub fn read_rows(path: &Path) -> Result<Vec<RawRow>> {
    info!("start analysing {}", path.display());
    let reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    collect_rows(reader)
}

/// Parse headerless `time,voltage` rows from CSV text.
pub fn parse_rows(text: &str) -> Result<Vec<RawRow>> {
    let reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    collect_rows(reader)
}

fn collect_rows<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<RawRow>> {
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading record {}", idx))?;
        rows.push(row_from_record(&record));
    }
    Ok(rows)
}

fn row_from_record(record: &StringRecord) -> RawRow {
    RawRow::new(
        record.get(0).unwrap_or_default(),
        record.get(1).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_ragged_rows() {
        let rows = parse_rows("0,0.1\n0.1, -0.2\n0.2\n,0.4\n0.3,abc,extra\n").unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[1], RawRow::new("0.1", "-0.2"));
        assert_eq!(rows[2], RawRow::new("0.2", ""));
        assert_eq!(rows[3], RawRow::new("", "0.4"));
        assert_eq!(rows[4], RawRow::new("0.3", "abc"));
    }

    #[test]
    fn reads_sample_strip() {
        let path = sample_path("test_data/sine_72bpm.csv");
        let rows = read_rows(&path).expect("read sample");
        assert_eq!(rows.len(), 1004);
        assert_eq!(rows[0], RawRow::new("0.00", "0.000000"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_rows(Path::new("does/not/exist.csv")).unwrap_err();
        assert!(format!("{:#}", err).contains("does/not/exist.csv"));
    }

    fn sample_path(relative: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .and_then(|p| p.parent())
            .expect("workspace root")
            .join(relative)
    }
}
