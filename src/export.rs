//! File outputs: CSV tables and pretty-printed JSON dumps.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;

use crate::error::{HarvestError, Result};
use crate::extract::Row;

/// UTF-8 byte order mark, so spreadsheet tools pick the right encoding.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
    }
    Ok(())
}

/// Write `rows` as CSV with the given column order. Cells a row lacks are
/// left empty.
pub fn write_csv(path: &Path, columns: &[String], rows: &[Row]) -> Result<()> {
    ensure_parent(path)?;
    let mut file = File::create(path).map_err(|e| HarvestError::io(path, e))?;
    file.write_all(UTF8_BOM).map_err(|e| HarvestError::io(path, e))?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(
            columns
                .iter()
                .map(|c| row.get(c).map(String::as_str).unwrap_or_default()),
        )?;
    }
    writer.flush().map_err(|e| HarvestError::io(path, e))?;

    info!(path = %path.display(), rows = rows.len(), columns = columns.len(), "CSV written");
    Ok(())
}

/// Save `value` as pretty JSON, creating parent directories.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content).map_err(|e| HarvestError::io(path, e))?;
    info!(path = %path.display(), "JSON saved");
    Ok(())
}

/// Make a bot name usable as a file or directory name.
///
/// Letters, digits, `_`, `-` and `.` are kept; everything else (spaces
/// included) becomes `_`.
pub fn sanitize_name(name: &str) -> String {
    let safe: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        "unnamed".to_string()
    } else {
        safe
    }
}

/// `<db_dir>/<safe name>_results_<YYYYmmdd_HHMM>.csv`
pub fn timestamped_csv_path(db_dir: &Path, name: &str, now: NaiveDateTime) -> PathBuf {
    db_dir.join(format!(
        "{}_results_{}.csv",
        sanitize_name(name),
        now.format("%Y%m%d_%H%M")
    ))
}
