//! In-memory tabular dataset shared by the OTC pipeline and the timetable
//! extract exports.
//!
//! A [`Table`] is CSV-shaped: an ordered list of string headers plus rows of
//! string cells, one cell per header. Merge and normalize operations always
//! preserve row order.

use anyhow::{Result, bail};
use std::collections::HashSet;
use std::io::Write;

/// UTF-8 byte-order mark that some gov.uk exports prepend to their CSVs.
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    /// Parses CSV bytes into a table, tolerating a leading UTF-8 BOM.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not valid UTF-8 CSV or a row has a
    /// different field count than the header row.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut rdr = csv::Reader::from_reader(bytes);
        let headers = rdr.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Table { headers, rows })
    }

    /// Writes the table as comma-delimited CSV with a header row and no
    /// index column.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Concatenates same-schema tables, preserving input order.
    ///
    /// Every table must carry exactly the headers of the first one; a ragged
    /// merge is never produced. An empty input yields an empty table.
    pub fn concat(tables: Vec<Table>) -> Result<Table> {
        let mut iter = tables.into_iter();
        let Some(mut merged) = iter.next() else {
            return Ok(Table::default());
        };

        for table in iter {
            if table.headers != merged.headers {
                bail!(
                    "column mismatch between sources: expected {:?}, found {:?}",
                    merged.headers,
                    table.headers
                );
            }
            merged.rows.extend(table.rows);
        }

        Ok(merged)
    }

    /// Lowercases every header and replaces spaces with underscores.
    /// Idempotent: normalizing twice equals normalizing once.
    ///
    /// # Errors
    ///
    /// Fails if two distinct headers would collapse to the same normalized
    /// name, rather than letting one silently shadow the other.
    pub fn normalize_headers(&mut self) -> Result<()> {
        let normalized: Vec<String> = self.headers.iter().map(|h| normalize_header(h)).collect();

        let mut seen = HashSet::new();
        for name in &normalized {
            if !seen.insert(name.as_str()) {
                bail!("two columns collapse to the same normalized name {name:?}");
            }
        }

        self.headers = normalized;
        Ok(())
    }

    /// Appends a column; `values` must hold exactly one entry per row.
    pub fn add_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            bail!(
                "column {name:?} has {} values for {} rows",
                values.len(),
                self.rows.len()
            );
        }
        self.headers.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Removes exact full-row duplicates, keeping the first occurrence and
    /// leaving the order of the remaining rows untouched.
    pub fn dedup_rows(&mut self) {
        let mut seen = HashSet::new();
        self.rows.retain(|row| seen.insert(row.clone()));
    }
}

/// Lowercase + spaces-to-underscores, the column naming downstream storage
/// expects.
pub fn normalize_header(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}
