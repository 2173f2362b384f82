//! Shared types for package registries.
//!
//! This module defines the raw entry a registry reports for each installed
//! distribution, before any sizing has happened.

use std::fmt;
use std::path::PathBuf;

/// A distribution as reported by a package registry.
///
/// This is the unsized form: name, version and the install root that the
/// aggregator will later walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    /// The project name (e.g., "numpy", "typing-extensions").
    pub name: String,

    /// The version string exactly as reported, never parsed.
    pub version: String,

    /// Path to the package's installed root (directory or single module file).
    pub location: PathBuf,
}

impl InstalledPackage {
    /// Creates a new InstalledPackage instance.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for InstalledPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}=={} ({})",
            self.name,
            self.version,
            self.location.display()
        )
    }
}

/// Distribution metadata read from a `METADATA` or `PKG-INFO` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistMetadata {
    /// Value of the `Name:` header.
    pub name: Option<String>,

    /// Value of the `Version:` header.
    pub version: Option<String>,
}

impl DistMetadata {
    /// Returns true if both name and version were found.
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.version.is_some()
    }
}
