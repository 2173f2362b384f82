//! Snapshot of an environment's package sizes and the queries over it.
//!
//! A [`Snapshot`] is built once per aggregation pass and never mutated;
//! filtering, ranking and sorting all return fresh record lists.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::sizing::{format_size, ReadFailure};

/// One installed package with its measured size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRecord {
    /// The project name, unique within a snapshot.
    pub name: String,

    /// Version string as reported by the registry.
    pub version: String,

    /// Installed root that was walked.
    pub location: PathBuf,

    /// Sum of the regular files under `location`.
    pub size_bytes: u64,
}

impl PackageRecord {
    /// Creates a new PackageRecord instance.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        location: impl Into<PathBuf>,
        size_bytes: u64,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            location: location.into(),
            size_bytes,
        }
    }

    /// Human-readable size, e.g. "12.3 MiB".
    pub fn pretty_size(&self) -> String {
        format_size(self.size_bytes)
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={} ({})", self.name, self.version, self.pretty_size())
    }
}

/// Count, total and mean of a set of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Number of records.
    pub count: usize,
    /// Exact sum of every record's `size_bytes`.
    pub total_size_bytes: u64,
    /// `total_size_bytes / count`, or 0 for an empty set.
    pub average_size_bytes: u64,
}

impl Summary {
    /// Computes the summary of an arbitrary record slice.
    pub fn of(records: &[PackageRecord]) -> Self {
        let count = records.len();
        let total_size_bytes: u64 = records.iter().map(|r| r.size_bytes).sum();
        let average_size_bytes = if count == 0 {
            0
        } else {
            total_size_bytes / count as u64
        };
        Self {
            count,
            total_size_bytes,
            average_size_bytes,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} packages | Total: {} | Average: {}",
            self.count,
            format_size(self.total_size_bytes),
            format_size(self.average_size_bytes)
        )
    }
}

/// Immutable result of one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Vec<PackageRecord>,
    summary: Summary,
    failures: Vec<ReadFailure>,
}

impl Snapshot {
    /// Builds a snapshot; totals are derived from `records` here so they
    /// always agree with them.
    pub fn new(records: Vec<PackageRecord>, failures: Vec<ReadFailure>) -> Self {
        let summary = Summary::of(&records);
        Self {
            records,
            summary,
            failures,
        }
    }

    /// Records in registry discovery order.
    pub fn records(&self) -> &[PackageRecord] {
        &self.records
    }

    /// Count, total and average over every record.
    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// Number of packages in the snapshot.
    pub fn count(&self) -> usize {
        self.summary.count
    }

    /// Sum of all package sizes in bytes.
    pub fn total_size_bytes(&self) -> u64 {
        self.summary.total_size_bytes
    }

    /// Mean package size in bytes, 0 when empty.
    pub fn average_size_bytes(&self) -> u64 {
        self.summary.average_size_bytes
    }

    /// Entries that could not be read during the pass.
    pub fn failures(&self) -> &[ReadFailure] {
        &self.failures
    }

    /// Whether the registry reported no packages.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up a record by exact name.
    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.records.iter().find(|r| r.name == name)
    }
}

/// Orders by size descending, then name ascending.
fn by_size_desc(a: &PackageRecord, b: &PackageRecord) -> Ordering {
    b.size_bytes
        .cmp(&a.size_bytes)
        .then_with(|| a.name.cmp(&b.name))
}

/// Returns the `n` largest records, biggest first, ties by name.
///
/// Asking for more than the snapshot holds returns every record.
pub fn top_n(snapshot: &Snapshot, n: usize) -> Vec<PackageRecord> {
    rank(snapshot.records(), n)
}

/// [`top_n`] over an arbitrary record slice, e.g. a filtered view.
pub fn rank(records: &[PackageRecord], n: usize) -> Vec<PackageRecord> {
    let mut ranked = records.to_vec();
    ranked.sort_by(by_size_desc);
    ranked.truncate(n);
    ranked
}

/// Returns the records whose name contains `query`, ignoring case.
///
/// Snapshot order is preserved and an empty query keeps every record.
pub fn filter(snapshot: &Snapshot, query: &str) -> Vec<PackageRecord> {
    filter_records(snapshot.records(), query)
}

/// [`filter`] over an arbitrary record slice.
pub fn filter_records(records: &[PackageRecord], query: &str) -> Vec<PackageRecord> {
    if query.is_empty() {
        return records.to_vec();
    }
    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|r| r.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Display order for a record list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Registry discovery order.
    #[default]
    Discovery,
    /// Largest first, ties by name.
    Size,
    /// Name ascending, case-insensitive.
    Name,
}

impl SortKey {
    /// The next key in the UI's cycle.
    pub fn next(self) -> Self {
        match self {
            SortKey::Discovery => SortKey::Size,
            SortKey::Size => SortKey::Name,
            SortKey::Name => SortKey::Discovery,
        }
    }

    /// Lower-case name shown in the UI and accepted on the command line.
    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Discovery => "discovery",
            SortKey::Size => "size",
            SortKey::Name => "name",
        }
    }

    /// Sorts `records` in place; discovery order leaves them untouched.
    pub fn apply(self, records: &mut [PackageRecord]) {
        match self {
            SortKey::Discovery => {}
            SortKey::Size => records.sort_by(by_size_desc),
            SortKey::Name => records.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then_with(|| a.name.cmp(&b.name))
            }),
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discovery" | "none" => Ok(SortKey::Discovery),
            "size" => Ok(SortKey::Size),
            "name" => Ok(SortKey::Name),
            _ => Err(format!(
                "Unknown sort key: '{}'. Valid keys: discovery, size, name",
                s
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc_snapshot() -> Snapshot {
        Snapshot::new(
            vec![
                PackageRecord::new("A", "1.0", "/sp/a", 100),
                PackageRecord::new("B", "2.0", "/sp/b", 300),
                PackageRecord::new("C", "3.0", "/sp/c", 200),
            ],
            Vec::new(),
        )
    }

    fn names(records: &[PackageRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_snapshot_totals() {
        let snap = abc_snapshot();
        assert_eq!(snap.count(), 3);
        assert_eq!(snap.total_size_bytes(), 600);
        assert_eq!(snap.average_size_bytes(), 200);
    }

    #[test]
    fn test_empty_snapshot_average_is_zero() {
        let snap = Snapshot::new(Vec::new(), Vec::new());
        assert_eq!(snap.count(), 0);
        assert_eq!(snap.total_size_bytes(), 0);
        assert_eq!(snap.average_size_bytes(), 0);
        assert!(snap.is_empty());
    }

    #[test]
    fn test_average_uses_integer_division() {
        let snap = Snapshot::new(
            vec![
                PackageRecord::new("x", "1", "/x", 1),
                PackageRecord::new("y", "1", "/y", 2),
            ],
            Vec::new(),
        );
        assert_eq!(snap.average_size_bytes(), 1);
    }

    #[test]
    fn test_top_n_scenario() {
        let snap = abc_snapshot();
        let top = top_n(&snap, 2);
        assert_eq!(names(&top), vec!["B", "C"]);
        assert_eq!(top[0].size_bytes, 300);
        assert_eq!(top[1].size_bytes, 200);
    }

    #[test]
    fn test_top_n_more_than_count() {
        let snap = abc_snapshot();
        let top = top_n(&snap, 10);
        assert_eq!(names(&top), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_top_n_ties_by_name() {
        let snap = Snapshot::new(
            vec![
                PackageRecord::new("zeta", "1", "/z", 50),
                PackageRecord::new("alpha", "1", "/a", 50),
                PackageRecord::new("mid", "1", "/m", 70),
            ],
            Vec::new(),
        );
        assert_eq!(names(&top_n(&snap, 3)), vec!["mid", "alpha", "zeta"]);
    }

    #[test]
    fn test_top_n_zero() {
        assert!(top_n(&abc_snapshot(), 0).is_empty());
    }

    #[test]
    fn test_top_n_does_not_reorder_snapshot() {
        let snap = abc_snapshot();
        let _ = top_n(&snap, 3);
        assert_eq!(names(snap.records()), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_filter_empty_query_is_identity() {
        let snap = abc_snapshot();
        assert_eq!(filter(&snap, ""), snap.records().to_vec());
    }

    #[test]
    fn test_filter_case_insensitive_substring() {
        let snap = Snapshot::new(
            vec![
                PackageRecord::new("NumPy", "1", "/n", 1),
                PackageRecord::new("pandas", "1", "/p", 1),
                PackageRecord::new("numexpr", "1", "/e", 1),
            ],
            Vec::new(),
        );
        assert_eq!(names(&filter(&snap, "NUM")), vec!["NumPy", "numexpr"]);
        assert_eq!(names(&filter(&snap, "das")), vec!["pandas"]);
        assert!(filter(&snap, "zzz").is_empty());
    }

    #[test]
    fn test_filter_is_substring_not_fuzzy() {
        let snap = Snapshot::new(
            vec![PackageRecord::new("requests", "1", "/r", 1)],
            Vec::new(),
        );
        assert!(filter(&snap, "rqs").is_empty());
    }

    #[test]
    fn test_summary_of_filtered() {
        let snap = abc_snapshot();
        let filtered = filter_records(snap.records(), "b");
        let summary = Summary::of(&filtered);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.total_size_bytes, 300);
        assert_eq!(summary.average_size_bytes, 300);
    }

    #[test]
    fn test_summary_display() {
        let summary = abc_snapshot().summary();
        assert_eq!(
            summary.to_string(),
            "3 packages | Total: 600 Bytes | Average: 200 Bytes"
        );
    }

    #[test]
    fn test_sort_key_apply() {
        let mut records = vec![
            PackageRecord::new("beta", "1", "/b", 1),
            PackageRecord::new("Alpha", "1", "/a", 5),
            PackageRecord::new("gamma", "1", "/g", 3),
        ];

        SortKey::Discovery.apply(&mut records);
        assert_eq!(names(&records), vec!["beta", "Alpha", "gamma"]);

        SortKey::Size.apply(&mut records);
        assert_eq!(names(&records), vec!["Alpha", "gamma", "beta"]);

        SortKey::Name.apply(&mut records);
        assert_eq!(names(&records), vec!["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_sort_key_cycle_and_parse() {
        assert_eq!(SortKey::Discovery.next(), SortKey::Size);
        assert_eq!(SortKey::Size.next(), SortKey::Name);
        assert_eq!(SortKey::Name.next(), SortKey::Discovery);

        assert_eq!("SIZE".parse::<SortKey>().unwrap(), SortKey::Size);
        assert_eq!("name".parse::<SortKey>().unwrap(), SortKey::Name);
        assert!("weight".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_record_display() {
        let rec = PackageRecord::new("numpy", "1.26.4", "/sp/numpy", 2048);
        assert_eq!(rec.to_string(), "numpy==1.26.4 (2.0 KiB)");
    }
}
