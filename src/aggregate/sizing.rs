//! On-disk size measurement for installed packages.
//!
//! Walks a package's install root and sums the lengths of the regular files
//! beneath it. Every unit of work produces either a size or a
//! [`ReadFailure`]; failures fold to zero bytes and are kept on the side so
//! a single unreadable file never aborts a pass.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

use super::CancelToken;

/// A file or directory that could not be sized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFailure {
    /// The path that failed, or the walk root when the error carried none.
    pub path: PathBuf,
    /// Human readable cause (permission denied, not found, ...).
    pub reason: String,
}

impl ReadFailure {
    /// Records that `path` could not be read because of `reason`.
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ReadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Outcome of sizing one package root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeReport {
    /// Sum of the lengths of every readable regular file.
    pub bytes: u64,
    /// Regular files that were counted.
    pub files: u64,
    /// Entries that contributed zero bytes because they could not be read.
    pub failures: Vec<ReadFailure>,
}

impl SizeReport {
    fn absorb(&mut self, entry: Result<u64, ReadFailure>) {
        match entry {
            Ok(len) => {
                self.bytes += len;
                self.files += 1;
            }
            Err(failure) => {
                debug!("Unreadable entry counted as 0 bytes: {}", failure);
                self.failures.push(failure);
            }
        }
    }
}

/// Returned when the cancel token fired mid-walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

/// Sizes a single directory entry.
///
/// `Ok(None)` means the entry is not a regular file (directory, symlink,
/// socket, ...) and contributes nothing.
fn entry_size(entry: &DirEntry) -> Option<Result<u64, ReadFailure>> {
    let file_type = entry.file_type();
    if file_type.is_symlink() {
        trace!("Not following symlink {}", entry.path().display());
        return None;
    }
    if !file_type.is_file() {
        return None;
    }
    Some(
        entry
            .metadata()
            .map(|m| m.len())
            .map_err(|e| ReadFailure::new(entry.path(), e.to_string())),
    )
}

/// Measures the total size of the regular files under `root`.
///
/// Symlinks below the root are never followed, so a package cannot pull in
/// another package's files or loop forever. A root that is itself a regular
/// file (a single-module distribution) counts that file. A missing or
/// unreadable root yields zero bytes and one failure.
pub fn measure(root: &Path, cancel: &CancelToken) -> Result<SizeReport, Interrupted> {
    let mut report = SizeReport::default();

    for entry in WalkDir::new(root).follow_links(false) {
        if cancel.is_cancelled() {
            return Err(Interrupted);
        }
        match entry {
            Ok(entry) => {
                if let Some(size) = entry_size(&entry) {
                    report.absorb(size);
                }
            }
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                let reason = err
                    .io_error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| err.to_string());
                report.absorb(Err(ReadFailure::new(path, reason)));
            }
        }
    }

    Ok(report)
}

/// Format bytes into a human-readable string using binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    const BASE: f64 = 1024.0;

    if bytes == 1 {
        return "1 Byte".to_string();
    }
    if bytes < 1024 {
        return format!("{} Bytes", bytes);
    }

    let mut value = bytes as f64 / BASE;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < BASE {
            break;
        }
        value /= BASE;
        unit = next;
    }
    format!("{:.1} {}", value, unit)
}

/// Size in mebibytes, as plotted on the chart axis.
pub fn to_mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_measure_sums_nested_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), vec![0u8; 100]).unwrap();
        fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        fs::write(dir.path().join("sub/b.py"), vec![0u8; 50]).unwrap();
        fs::write(dir.path().join("sub/deeper/c.so"), vec![0u8; 7]).unwrap();

        let report = measure(dir.path(), &CancelToken::new()).unwrap();
        assert_eq!(report.bytes, 157);
        assert_eq!(report.files, 3);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_measure_single_file_root() {
        let dir = TempDir::new().unwrap();
        let module = dir.path().join("six.py");
        fs::write(&module, vec![0u8; 42]).unwrap();

        let report = measure(&module, &CancelToken::new()).unwrap();
        assert_eq!(report.bytes, 42);
        assert_eq!(report.files, 1);
    }

    #[test]
    fn test_measure_missing_root_is_zero_with_failure() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");

        let report = measure(&missing, &CancelToken::new()).unwrap();
        assert_eq!(report.bytes, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, missing);
    }

    #[test]
    fn test_measure_empty_dir() {
        let dir = TempDir::new().unwrap();
        let report = measure(dir.path(), &CancelToken::new()).unwrap();
        assert_eq!(report, SizeReport::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_measure_does_not_follow_symlinks() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("big.bin"), vec![0u8; 1000]).unwrap();

        let pkg = TempDir::new().unwrap();
        fs::write(pkg.path().join("own.py"), vec![0u8; 10]).unwrap();
        std::os::unix::fs::symlink(outside.path().join("big.bin"), pkg.path().join("link.bin"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), pkg.path().join("linkdir")).unwrap();
        std::os::unix::fs::symlink(pkg.path().join("nowhere"), pkg.path().join("broken"))
            .unwrap();

        let report = measure(pkg.path(), &CancelToken::new()).unwrap();
        assert_eq!(report.bytes, 10);
        assert_eq!(report.files, 1);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_measure_cancelled() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), b"x").unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(measure(dir.path(), &cancel), Err(Interrupted));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(1), "1 Byte");
        assert_eq!(format_size(1023), "1023 Bytes");
        assert_eq!(format_size(1024), "1.0 KiB");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(1024 * 1024), "1.0 MiB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }

    #[test]
    fn test_to_mib() {
        assert!((to_mib(1024 * 1024) - 1.0).abs() < f64::EPSILON);
        assert!((to_mib(0)).abs() < f64::EPSILON);
    }
}
