//! Package registry module for viperview.
//!
//! A registry is the read-only source of installed distributions the
//! aggregator sizes. It is always handed to the aggregator explicitly so
//! that a pass can run against a fake environment in tests.
//!
//! # Implementations
//!
//! - [`SitePackagesRegistry`] - reads `*.dist-info` / `*.egg-info` metadata
//!   from a Python environment's site-packages directories
//! - [`InterpreterRegistry`] - asks an interpreter for its site-packages
//!   directories on each query, then reads them like the above
//! - [`StaticRegistry`] - a fixed list, for tests and benchmarks
//!
//! # Example
//!
//! ```ignore
//! use viperview::registry::{PackageRegistry, SitePackagesRegistry};
//!
//! let registry = SitePackagesRegistry::from_interpreter("python3")?;
//! for pkg in registry.packages()? {
//!     println!("{}", pkg);
//! }
//! ```

pub mod site_packages;
pub mod types;

pub use site_packages::{
    default_interpreter, discover_site_packages, normalize_name, parse_metadata, resolve_location,
    InterpreterRegistry, SitePackagesRegistry,
};
pub use types::{DistMetadata, InstalledPackage};

/// Errors raised while querying a package registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The environment could not be found or queried at all.
    #[error("Python environment unavailable: {0}")]
    EnvironmentUnavailable(String),
}

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// A read-only, enumerable source of installed packages.
///
/// Implementations make no ordering promise; callers keep whatever order
/// `packages` returns as the discovery order.
pub trait PackageRegistry {
    /// Lists every installed package with its version and install root.
    fn packages(&self) -> RegistryResult<Vec<InstalledPackage>>;
}

impl<R: PackageRegistry + ?Sized> PackageRegistry for &R {
    fn packages(&self) -> RegistryResult<Vec<InstalledPackage>> {
        (**self).packages()
    }
}

impl<R: PackageRegistry + ?Sized> PackageRegistry for Box<R> {
    fn packages(&self) -> RegistryResult<Vec<InstalledPackage>> {
        (**self).packages()
    }
}

/// Registry holding a fixed package list.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    packages: Vec<InstalledPackage>,
}

impl StaticRegistry {
    /// Creates a registry that always reports `packages`.
    pub fn new(packages: Vec<InstalledPackage>) -> Self {
        Self { packages }
    }
}

impl PackageRegistry for StaticRegistry {
    fn packages(&self) -> RegistryResult<Vec<InstalledPackage>> {
        Ok(self.packages.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_registry_preserves_order() {
        let registry = StaticRegistry::new(vec![
            InstalledPackage::new("b", "1", "/b"),
            InstalledPackage::new("a", "1", "/a"),
        ]);
        let names: Vec<_> = registry
            .packages()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::EnvironmentUnavailable("no python".to_string());
        assert_eq!(err.to_string(), "Python environment unavailable: no python");
    }

    #[test]
    fn test_boxed_registry_delegates() {
        let boxed: Box<dyn PackageRegistry> = Box::new(StaticRegistry::new(vec![
            InstalledPackage::new("x", "0.1", "/x"),
        ]));
        assert_eq!(boxed.packages().unwrap().len(), 1);
    }
}
