//! CSV export implementation.
//!
//! Exports package records in CSV format for spreadsheet use.

use super::{ExportData, Exporter};
use std::io::{self, Write};

/// Header row written before any record.
pub const CSV_HEADER: &str = "name,version,location,size_bytes";

/// CSV exporter implementation.
pub struct CsvExporter;

impl CsvExporter {
    /// Escape a field value for CSV format.
    ///
    /// Wraps the value in quotes if it contains commas, quotes, or line breaks.
    fn escape_field(value: &str) -> String {
        if value.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}

impl Exporter for CsvExporter {
    fn export<W: Write>(&self, data: &ExportData<'_>, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "{}", CSV_HEADER)?;

        for record in data.records {
            writeln!(
                writer,
                "{},{},{},{}",
                Self::escape_field(&record.name),
                Self::escape_field(&record.version),
                Self::escape_field(&record.location.to_string_lossy()),
                record.size_bytes
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::PackageRecord;

    fn export_records(records: &[PackageRecord]) -> String {
        let mut output = Vec::new();
        CsvExporter
            .export(&ExportData::new(records), &mut output)
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_csv_export_basic() {
        let records = vec![
            PackageRecord::new("numpy", "1.26.4", "/sp/numpy", 1024),
            PackageRecord::new("pip", "24.0", "/sp/pip", 2048),
            PackageRecord::new("six", "1.16.0", "/sp/six.py", 7),
        ];
        let csv_str = export_records(&records);
        let lines: Vec<&str> = csv_str.lines().collect();

        // Header + 3 records
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "name,version,location,size_bytes");
        assert_eq!(lines[1], "numpy,1.26.4,/sp/numpy,1024");
        assert_eq!(lines[3], "six,1.16.0,/sp/six.py,7");
    }

    #[test]
    fn test_csv_export_empty() {
        assert_eq!(export_records(&[]), "name,version,location,size_bytes\n");
    }

    #[test]
    fn test_csv_export_keeps_given_order() {
        let records = vec![
            PackageRecord::new("zeta", "1", "/z", 1),
            PackageRecord::new("alpha", "1", "/a", 999),
        ];
        let csv_str = export_records(&records);
        let lines: Vec<&str> = csv_str.lines().collect();
        assert!(lines[1].starts_with("zeta,"));
        assert!(lines[2].starts_with("alpha,"));
    }

    #[test]
    fn test_csv_escape_field() {
        // No escaping needed
        assert_eq!(CsvExporter::escape_field("simple"), "simple");

        // Contains comma
        assert_eq!(
            CsvExporter::escape_field("has,comma"),
            "\"has,comma\""
        );

        // Contains quotes
        assert_eq!(
            CsvExporter::escape_field("has\"quote"),
            "\"has\"\"quote\""
        );

        // Contains newline
        assert_eq!(
            CsvExporter::escape_field("has\nnewline"),
            "\"has\nnewline\""
        );

        // Contains carriage return
        assert_eq!(CsvExporter::escape_field("a\rb"), "\"a\rb\"");
    }

    #[test]
    fn test_csv_export_special_characters() {
        let records = vec![PackageRecord::new(
            "odd-pkg",
            "1.0, local",
            "/home/me/My \"Envs\"/sp/odd",
            10,
        )];
        let csv_str = export_records(&records);

        assert!(csv_str.contains("\"1.0, local\""));
        assert!(csv_str.contains("\"/home/me/My \"\"Envs\"\"/sp/odd\""));
    }
}
