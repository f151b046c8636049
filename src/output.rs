//! Local persistence for extracted datasets.
//!
//! Artifacts land in a per-date subfolder of the user's downloads folder,
//! e.g. `~/Downloads/2024-05-01/otc_db_2024-05-01.csv`.

use crate::table::Table;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolves the user's downloads folder.
///
/// Falls back to `<home>/Downloads` on platforms that report no dedicated
/// download directory; errors if neither can be determined.
pub fn downloads_dir() -> Result<PathBuf> {
    if let Some(dir) = dirs::download_dir() {
        return Ok(dir);
    }
    dirs::home_dir()
        .map(|home| home.join("Downloads"))
        .context("could not determine a downloads folder on this platform")
}

/// Ensures `<base>/<YYYY-MM-DD>/` exists and returns it.
///
/// Uses create-if-absent, so a second call for the same date is a no-op
/// rather than an error. `base` defaults to [`downloads_dir`].
pub fn ensure_dated_folder(base: Option<&Path>, date: NaiveDate) -> Result<PathBuf> {
    let base = match base {
        Some(dir) => dir.to_path_buf(),
        None => downloads_dir()?,
    };

    let folder = base.join(date.format("%Y-%m-%d").to_string());
    fs::create_dir_all(&folder)
        .with_context(|| format!("failed to create output folder {}", folder.display()))?;
    debug!(folder = %folder.display(), "Output folder ready");

    Ok(folder)
}

/// Writes a table as CSV to `path`, overwriting any previous file.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    let file =
        fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    table.write_csv(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_ensure_dated_folder_creates_dated_subfolder() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = ensure_dated_folder(Some(tmp.path()), date()).unwrap();

        assert!(folder.is_dir());
        assert_eq!(folder.file_name().unwrap(), "2024-05-01");
    }

    #[test]
    fn test_ensure_dated_folder_twice_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let first = ensure_dated_folder(Some(tmp.path()), date()).unwrap();

        // existing contents survive the second call
        let marker = first.join("marker.txt");
        fs::write(&marker, "kept").unwrap();

        let second = ensure_dated_folder(Some(tmp.path()), date()).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(marker).unwrap(), "kept");
    }

    #[test]
    fn test_write_table_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.csv");

        let table = Table {
            headers: vec!["reg_no".to_string(), "service_code".to_string()],
            rows: vec![vec!["PB0001234/5".to_string(), "PB0001234:5".to_string()]],
        };
        write_table(&path, &table).unwrap();

        let back = Table::from_csv_bytes(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_write_table_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.csv");

        let mut table = Table::new(vec!["x".to_string()]);
        table.rows.push(vec!["1".to_string()]);
        write_table(&path, &table).unwrap();

        table.rows.push(vec!["2".to_string()]);
        write_table(&path, &table).unwrap();

        let back = Table::from_csv_bytes(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(back.row_count(), 2);
    }
}
