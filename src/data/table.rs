//! In-memory CSV table.
//!
//! Every cell is kept as a string; the datasets are small and the pipeline
//! only ever adds columns or rewrites cells in place.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, warn};

use crate::error::DataError;

/// A headered CSV table of string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    skipped_rows: usize,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
            skipped_rows: 0,
        }
    }

    /// Read a headered CSV file.
    ///
    /// Rows whose field count differs from the header are skipped and
    /// counted in [`Table::skipped_rows`].
    pub fn read_csv(path: &Path) -> Result<Self, DataError> {
        if !path.exists() {
            return Err(DataError::NotFound(path.to_path_buf()));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(DataError::Malformed {
                path: path.to_path_buf(),
                reason: "missing header row".into(),
            });
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut table = Table::new(name, headers);

        for (idx, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    warn!(path = %path.display(), row = idx + 1, error = %e, "Skipping unreadable row");
                    table.skipped_rows += 1;
                    continue;
                }
            };
            if record.len() != table.headers.len() {
                warn!(
                    path = %path.display(),
                    row = idx + 1,
                    expected = table.headers.len(),
                    found = record.len(),
                    "Skipping malformed row"
                );
                table.skipped_rows += 1;
                continue;
            }
            table.rows.push(record.iter().map(str::to_string).collect());
        }

        debug!(
            path = %path.display(),
            rows = table.rows.len(),
            skipped = table.skipped_rows,
            "Read CSV"
        );
        Ok(table)
    }

    /// Write header and rows, creating parent directories as needed.
    pub fn write_csv(&self, path: &Path) -> Result<(), DataError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = WriterBuilder::new().from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        debug!(path = %path.display(), rows = self.rows.len(), "Wrote CSV");
        Ok(())
    }

    /// Table name, used in log lines and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column names in order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// All rows, each with one cell per column.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows dropped while reading because they were malformed.
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Position of column `name`, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Position of column `name`, or `MissingColumn`.
    pub fn require_column(&self, name: &str) -> Result<usize, DataError> {
        self.column_index(name).ok_or_else(|| DataError::MissingColumn {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    /// Cell at `row` in column `name`; `None` if either is absent.
    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.column_index(name)?;
        self.rows.get(row).map(|r| r[col].as_str())
    }

    /// Overwrite the cell at `row` in column `name`.
    pub fn set(&mut self, row: usize, name: &str, value: impl Into<String>) -> Result<(), DataError> {
        let col = self.require_column(name)?;
        let len = self.rows.len();
        let cells = self.rows.get_mut(row).ok_or_else(|| DataError::RowShape {
            table: self.name.clone(),
            reason: format!("row {row} out of range ({len} rows)"),
        })?;
        cells[col] = value.into();
        Ok(())
    }

    /// Append a column filled with `default`. An existing column is left as is.
    pub fn add_column(&mut self, name: &str, default: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(default.to_string());
        }
        self.headers.len() - 1
    }

    /// Append a row; it must have one cell per column.
    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), DataError> {
        if row.len() != self.headers.len() {
            return Err(DataError::RowShape {
                table: self.name.clone(),
                reason: format!("row has {} cells, expected {}", row.len(), self.headers.len()),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Remove rows identical to an earlier row. Returns how many were removed.
    pub fn drop_duplicates(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen = HashSet::with_capacity(before);
        self.rows.retain(|row| seen.insert(row.clone()));
        before - self.rows.len()
    }

    /// Replace empty cells in each named column with its default.
    pub fn fill_missing(&mut self, defaults: &[(&str, &str)]) -> Result<usize, DataError> {
        let mut filled = 0;
        for (column, default) in defaults {
            let col = self.require_column(column)?;
            for row in &mut self.rows {
                if row[col].is_empty() {
                    row[col] = (*default).to_string();
                    filled += 1;
                }
            }
        }
        Ok(filled)
    }

    /// Write the character count of `source` into `target`.
    pub fn derive_length(&mut self, source: &str, target: &str) -> Result<(), DataError> {
        let src = self.require_column(source)?;
        let dst = self.add_column(target, "0");
        for row in &mut self.rows {
            row[dst] = row[src].chars().count().to_string();
        }
        Ok(())
    }

    /// Lowercase each value, then uppercase its first character.
    pub fn capitalize_column(&mut self, name: &str) -> Result<(), DataError> {
        let col = self.require_column(name)?;
        for row in &mut self.rows {
            row[col] = capitalize(&row[col]);
        }
        Ok(())
    }

    /// Split into the first `floor(ratio * len)` rows and the rest, in order.
    pub fn split_at_ratio(&self, ratio: f64) -> (Table, Table) {
        let ratio = ratio.clamp(0.0, 1.0);
        let cut = (self.rows.len() as f64 * ratio).floor() as usize;
        let (head, tail) = self.rows.split_at(cut);
        (self.with_rows(head.to_vec()), self.with_rows(tail.to_vec()))
    }

    /// Copy of the first `n` rows.
    pub fn head(&self, n: usize) -> Table {
        self.with_rows(self.rows.iter().take(n).cloned().collect())
    }

    fn with_rows(&self, rows: Vec<Vec<String>>) -> Table {
        Table {
            name: self.name.clone(),
            headers: self.headers.clone(),
            rows,
            skipped_rows: 0,
        }
    }
}

fn capitalize(value: &str) -> String {
    let lowered = value.to_lowercase();
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
