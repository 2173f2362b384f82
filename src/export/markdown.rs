//! Markdown export implementation.
//!
//! Exports package records in Markdown format for documentation and reporting.

use super::{ExportData, Exporter};
use crate::aggregate::{format_size, rank};
use std::io::{self, Write};

/// Number of entries in the "Largest Packages" section.
const LARGEST_COUNT: usize = 10;

/// Markdown exporter implementation.
pub struct MarkdownExporter;

impl MarkdownExporter {
    /// Escape pipes so a value stays inside its table cell.
    fn escape_cell(value: &str) -> String {
        value.replace('|', "\\|").replace('\n', " ")
    }
}

impl Exporter for MarkdownExporter {
    fn export<W: Write>(&self, data: &ExportData<'_>, writer: &mut W) -> io::Result<()> {
        // Title
        writeln!(writer, "# Python Package Size Report")?;
        writeln!(writer)?;

        // Summary section
        writeln!(writer, "## Summary")?;
        writeln!(writer)?;
        writeln!(writer, "| Metric | Value |")?;
        writeln!(writer, "|--------|-------|")?;
        writeln!(writer, "| Packages | {} |", data.summary.count)?;
        writeln!(
            writer,
            "| Total Size | {} |",
            format_size(data.summary.total_size_bytes)
        )?;
        writeln!(
            writer,
            "| Average Size | {} |",
            format_size(data.summary.average_size_bytes)
        )?;
        writeln!(writer)?;

        // Largest packages
        let largest = rank(data.records, LARGEST_COUNT);
        if !largest.is_empty() {
            writeln!(writer, "## Largest Packages")?;
            writeln!(writer)?;
            for (i, record) in largest.iter().enumerate() {
                writeln!(
                    writer,
                    "{}. **{}** {} ({})",
                    i + 1,
                    Self::escape_cell(&record.name),
                    Self::escape_cell(&record.version),
                    record.pretty_size()
                )?;
            }
            writeln!(writer)?;
        }

        // All packages, in the order given
        writeln!(writer, "## Packages ({})", data.records.len())?;
        writeln!(writer)?;
        if data.records.is_empty() {
            writeln!(writer, "No packages found.")?;
        } else {
            writeln!(writer, "| Package | Version | Size | Location |")?;
            writeln!(writer, "|---------|---------|------|----------|")?;
            for record in data.records {
                writeln!(
                    writer,
                    "| {} | {} | {} | {} |",
                    Self::escape_cell(&record.name),
                    Self::escape_cell(&record.version),
                    record.pretty_size(),
                    Self::escape_cell(&record.location.to_string_lossy())
                )?;
            }
        }
        writeln!(writer)?;

        // Footer
        writeln!(writer, "---")?;
        writeln!(writer, "*Generated by viperview*")?;

        Ok(())
    }
}
