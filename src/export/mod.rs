//! Export functionality for package size reports.
//!
//! This module provides exporters for writing a snapshot, or any filtered
//! view of it, in various formats: CSV, JSON, and Markdown.

pub mod csv;
pub mod json;
pub mod markdown;

use crate::aggregate::{PackageRecord, Summary};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// JSON format - machine-readable, full data
    Json,
    /// CSV format - spreadsheet-friendly
    #[default]
    Csv,
    /// Markdown format - documentation/reporting
    Markdown,
}

impl ExportFormat {
    /// Infers the format from a file extension, if it names one.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            _ => Err(format!(
                "Unknown export format: '{}'. Valid formats: json, csv, markdown",
                s
            )),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Errors surfaced to the user when an export fails.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The target could not be created or written.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Data container for export operations.
///
/// Borrows the records to write, in the order they should appear.
#[derive(Debug, Clone)]
pub struct ExportData<'a> {
    /// Records in output order
    pub records: &'a [PackageRecord],
    /// Totals over `records`
    pub summary: Summary,
}

impl<'a> ExportData<'a> {
    /// Create new export data; the summary is computed from `records`.
    pub fn new(records: &'a [PackageRecord]) -> Self {
        Self {
            records,
            summary: Summary::of(records),
        }
    }
}

/// Trait for exporters.
pub trait Exporter {
    /// Export the data to the given writer.
    fn export<W: Write>(&self, data: &ExportData<'_>, writer: &mut W) -> io::Result<()>;
}

/// Export data in the specified format.
pub fn export<W: Write>(
    format: ExportFormat,
    data: &ExportData<'_>,
    writer: &mut W,
) -> io::Result<()> {
    match format {
        ExportFormat::Json => json::JsonExporter.export(data, writer),
        ExportFormat::Csv => csv::CsvExporter.export(data, writer),
        ExportFormat::Markdown => markdown::MarkdownExporter.export(data, writer),
    }
}

/// Export data to a string.
pub fn export_to_string(format: ExportFormat, data: &ExportData<'_>) -> io::Result<String> {
    let mut buffer = Vec::new();
    export(format, data, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Writes `records` to the file at `path`, creating or truncating it.
pub fn export_to_path(
    format: ExportFormat,
    records: &[PackageRecord],
    path: &Path,
) -> Result<(), ExportError> {
    let write_error = |source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    export(format, &ExportData::new(records), &mut writer).map_err(write_error)?;
    writer.flush().map_err(write_error)?;

    info!(
        "Exported {} records as {} to {}",
        records.len(),
        format,
        path.display()
    );
    Ok(())
}

/// Writes `records` as CSV with the `name,version,location,size_bytes` header.
pub fn export_csv(records: &[PackageRecord], path: &Path) -> Result<(), ExportError> {
    export_to_path(ExportFormat::Csv, records, path)
}
