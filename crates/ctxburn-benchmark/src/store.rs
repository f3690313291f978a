//! Line-oriented record store: one JSON object per line, append only.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::Path;

use ctxburn_core::{PerformanceRecord, RawRecord, Result};
use serde::Serialize;

use crate::reporter::Reporter;

/// Append one record as a single line, creating parent directories.
///
/// The line is written with one `write_all` and synced, so a crash can at
/// worst leave a partial final line, which [`load_records`] skips.
pub fn append_record(record: &PerformanceRecord, store_path: &Path) -> Result<()> {
    append_line(record, store_path)
}

pub(crate) fn append_line<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut line = serde_json::to_string(value)?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.sync_data()?;
    Ok(())
}

/// Read every parseable record in file order.
///
/// Blank lines are ignored. Lines that are not UTF-8, or not a JSON object
/// with the expected field types, are skipped with a warning. Any other read
/// failure (a directory path, a device error) is returned.
pub fn load_records(store_path: &Path, reporter: &dyn Reporter) -> Result<Vec<RawRecord>> {
    let reader = BufReader::new(File::open(store_path)?);
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_num = idx + 1;
        let line = match line {
            Ok(line) => line,
            // The bad bytes are consumed, so the next read moves on.
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                reporter.warn(&format!("Failed to read line {}: {}", line_num, e));
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse_line(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => reporter.warn(&format!("Failed to parse line {}: {}", line_num, e)),
        }
    }

    Ok(records)
}

fn parse_line(line: &str) -> std::result::Result<RawRecord, String> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    // serde would happily read a JSON array positionally into the struct.
    if !value.is_object() {
        return Err("expected a JSON object".to_string());
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}
