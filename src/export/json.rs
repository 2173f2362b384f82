//! JSON export implementation.
//!
//! Exports package records in JSON format for machine-readable output.

use super::{ExportData, Exporter};
use crate::aggregate::{PackageRecord, Summary};
use serde::Serialize;
use std::io::{self, Write};

/// JSON exporter implementation.
pub struct JsonExporter;

/// Root JSON export structure.
#[derive(Serialize)]
struct JsonExport<'a> {
    summary: Summary,
    packages: &'a [PackageRecord],
}

impl Exporter for JsonExporter {
    fn export<W: Write>(&self, data: &ExportData<'_>, writer: &mut W) -> io::Result<()> {
        let export = JsonExport {
            summary: data.summary,
            packages: data.records,
        };

        let json = serde_json::to_string_pretty(&export)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        writeln!(writer, "{}", json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export_json(records: &[PackageRecord]) -> serde_json::Value {
        let mut output = Vec::new();
        JsonExporter
            .export(&ExportData::new(records), &mut output)
            .unwrap();
        serde_json::from_slice(&output).unwrap()
    }

    #[test]
    fn test_json_export_summary() {
        let records = vec![
            PackageRecord::new("A", "1", "/sp/a", 100),
            PackageRecord::new("B", "1", "/sp/b", 300),
            PackageRecord::new("C", "1", "/sp/c", 200),
        ];
        let parsed = export_json(&records);

        assert_eq!(parsed["summary"]["count"], 3);
        assert_eq!(parsed["summary"]["total_size_bytes"], 600);
        assert_eq!(parsed["summary"]["average_size_bytes"], 200);
    }

    #[test]
    fn test_json_export_packages_list() {
        let records = vec![PackageRecord::new("requests", "2.31.0", "/sp/requests", 4096)];
        let parsed = export_json(&records);

        let packages = parsed["packages"].as_array().unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0]["name"], "requests");
        assert_eq!(packages[0]["version"], "2.31.0");
        assert_eq!(packages[0]["location"], "/sp/requests");
        assert_eq!(packages[0]["size_bytes"], 4096);
    }

    #[test]
    fn test_json_export_empty() {
        let parsed = export_json(&[]);
        assert_eq!(parsed["summary"]["count"], 0);
        assert_eq!(parsed["summary"]["average_size_bytes"], 0);
        assert!(parsed["packages"].as_array().unwrap().is_empty());
    }
}
