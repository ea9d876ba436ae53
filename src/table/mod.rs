//! CSV tables with a required-column check.
//!
//! Files are read and written through `tokio::fs`; the `csv` crate only ever
//! sees in-memory buffers.

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{} is missing required column(s): {}", .path.display(), .missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("{} row {row}: invalid {column} value '{value}': {reason}", .path.display())]
    InvalidValue {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
        reason: String,
    },
}

/// A parsed CSV file
#[derive(Debug, Clone)]
pub struct Table {
    path: PathBuf,
    columns: HashMap<String, usize>,
    records: Vec<StringRecord>,
}

/// A single data row, addressed by column name
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    /// 1-indexed line number in the file (header is line 1)
    pub number: usize,
    columns: &'a HashMap<String, usize>,
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    /// Trimmed cell value; `None` when the column is absent or the cell is blank
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.columns
            .get(column)
            .and_then(|&idx| self.record.get(idx))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl Table {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.records.iter().enumerate().map(|(idx, record)| Row {
            number: idx + 2,
            columns: &self.columns,
            record,
        })
    }

    /// Build an `InvalidValue` error pointing at a cell of this table
    pub fn invalid_value(
        &self,
        row: &Row<'_>,
        column: &str,
        value: &str,
        reason: impl Into<String>,
    ) -> TableError {
        TableError::InvalidValue {
            path: self.path.clone(),
            row: row.number,
            column: column.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Read a CSV file and check that every required column is present.
///
/// Header names are matched case-insensitively.
pub async fn read_table(path: &Path, required_columns: &[&str]) -> Result<Table, TableError> {
    let content = fs::read(path).await.map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_table(path, &content, required_columns)
}

fn parse_table(path: &Path, content: &[u8], required_columns: &[&str]) -> Result<Table, TableError> {
    let csv_error = |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(strip_bom(content));

    let headers = reader.headers().map_err(csv_error)?.clone();
    let columns = build_header_map(&headers);

    let missing: Vec<String> = required_columns
        .iter()
        .filter(|c| !columns.contains_key(**c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(TableError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }

    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_error)?;

    Ok(Table {
        path: path.to_path_buf(),
        columns,
        records,
    })
}

/// Write a CSV file, creating parent directories and overwriting any existing file.
///
/// Returns the bytes written so callers can fingerprint the export.
pub async fn write_table<R, S>(path: &Path, headers: &[&str], rows: R) -> Result<Vec<u8>, TableError>
where
    R: IntoIterator<Item = Vec<S>>,
    S: AsRef<[u8]>,
{
    let csv_error = |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let io_error = |source| TableError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(headers).map_err(csv_error)?;
    for row in rows {
        writer.write_record(&row).map_err(csv_error)?;
    }
    let content = writer
        .into_inner()
        .map_err(|e| io_error(e.into_error()))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }
    }
    fs::write(path, &content).await.map_err(io_error)?;

    Ok(content)
}

/// Build a map of lower-cased header names to column indices
fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect()
}

fn strip_bom(content: &[u8]) -> &[u8] {
    content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content)
}
