//! Typed CSV snapshots exchanged between stages.
//!
//! Writes go to a temporary file in the destination directory and are renamed
//! into place, so a reader never sees a half-written snapshot.

use std::io::Write;
use std::path::Path;

use revenue_core::error::{Result, RevenueError};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

/// Serialize `rows` with a header row and atomically replace `path`.
///
/// The header is written even when `rows` is empty.
pub fn write_snapshot<T: Serialize>(path: &Path, columns: &[&str], rows: &[T]) -> Result<()> {
    let mut tmp = temp_file_for(path)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(tmp.as_file_mut());
        writer
            .write_record(columns)
            .map_err(|e| csv_write_error(path, e))?;
        for row in rows {
            writer.serialize(row).map_err(|e| csv_write_error(path, e))?;
        }
        writer.flush().map_err(|e| RevenueError::write(path, e))?;
    }
    persist(tmp, path)?;
    debug!(path = %path.display(), rows = rows.len(), "snapshot written");
    Ok(())
}

/// Read a snapshot, checking its header against `columns` and decoding every
/// record into `T`.
pub fn read_snapshot<T: DeserializeOwned>(path: &Path, columns: &[&str]) -> Result<Vec<T>> {
    let origin = path.display().to_string();
    let mut reader = match csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
    {
        Ok(r) => r,
        Err(e) => return Err(open_error(path, e)),
    };

    let headers = reader
        .headers()
        .map_err(|e| RevenueError::schema(&origin, format!("unreadable header: {e}")))?
        .clone();
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .collect();
    if !missing.is_empty() {
        return Err(RevenueError::schema(
            &origin,
            format!("missing columns: {}", missing.join(", ")),
        ));
    }

    let mut rows = Vec::new();
    for result in reader.deserialize::<T>() {
        let row = result.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or_default();
            RevenueError::schema(&origin, format!("line {line}: {e}"))
        })?;
        rows.push(row);
    }
    debug!(path = %origin, rows = rows.len(), "snapshot read");
    Ok(rows)
}

/// Atomically replace `path` with `bytes`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = temp_file_for(path)?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| RevenueError::write(path, e))?;
    persist(tmp, path)
}

fn temp_file_for(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| RevenueError::write(path, e))?;
    NamedTempFile::new_in(dir).map_err(|e| RevenueError::write(path, e))
}

fn persist(tmp: NamedTempFile, path: &Path) -> Result<()> {
    tmp.as_file()
        .sync_all()
        .map_err(|e| RevenueError::write(path, e))?;
    tmp.persist(path)
        .map_err(|e| RevenueError::write(path, e.error))?;
    Ok(())
}

fn open_error(path: &Path, err: csv::Error) -> RevenueError {
    match err.into_kind() {
        csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            RevenueError::MissingInput {
                path: path.to_path_buf(),
            }
        }
        csv::ErrorKind::Io(io) => RevenueError::Io(io),
        other => RevenueError::schema(path.display().to_string(), format!("{other:?}")),
    }
}

fn csv_write_error(path: &Path, err: csv::Error) -> RevenueError {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => RevenueError::write(path, io),
        other => RevenueError::write(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{other:?}")),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use revenue_core::types::DailyRevenue;

    fn day(d: u32, revenue: f64) -> DailyRevenue {
        DailyRevenue {
            sale_date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            total_revenue: revenue,
        }
    }

    #[test]
    fn header_written_for_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_revenue.csv");
        write_snapshot::<DailyRevenue>(&path, &DailyRevenue::COLUMNS, &[]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "sale_date,total_revenue\n");
        let rows: Vec<DailyRevenue> = read_snapshot(&path, &DailyRevenue::COLUMNS).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn snapshot_uses_iso_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("daily_revenue.csv");
        write_snapshot(&path, &DailyRevenue::COLUMNS, &[day(1, 15.0), day(2, 2.5)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "sale_date,total_revenue\n2024-01-01,15.0\n2024-01-02,2.5\n"
        );
    }

    #[test]
    fn overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_revenue.csv");
        write_snapshot(&path, &DailyRevenue::COLUMNS, &[day(1, 1.0)]).unwrap();
        write_snapshot(&path, &DailyRevenue::COLUMNS, &[day(3, 3.0)]).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let rows: Vec<DailyRevenue> = read_snapshot(&path, &DailyRevenue::COLUMNS).unwrap();
        assert_eq!(rows, vec![day(3, 3.0)]);
    }

    #[test]
    fn missing_file_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_snapshot::<DailyRevenue>(
            &dir.path().join("absent.csv"),
            &DailyRevenue::COLUMNS,
        )
        .unwrap_err();
        assert!(matches!(err, RevenueError::MissingInput { .. }));
    }

    #[test]
    fn missing_column_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_revenue.csv");
        std::fs::write(&path, "sale_date,revenue\n2024-01-01,3.0\n").unwrap();

        let err = read_snapshot::<DailyRevenue>(&path, &DailyRevenue::COLUMNS).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_ERROR");
        assert!(err.to_string().contains("total_revenue"));
    }

    #[test]
    fn non_numeric_value_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_revenue.csv");
        std::fs::write(
            &path,
            "sale_date,total_revenue\n2024-01-01,3.0\n2024-01-02,lots\n",
        )
        .unwrap();

        let err = read_snapshot::<DailyRevenue>(&path, &DailyRevenue::COLUMNS).unwrap_err();
        assert!(matches!(err, RevenueError::Schema { .. }));
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn unwritable_destination_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let err = write_atomic(&blocker.join("chart.svg"), b"<svg/>").unwrap_err();
        assert_eq!(err.code(), "WRITE_ERROR");
    }
}
