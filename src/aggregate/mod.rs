//! Package size aggregation.
//!
//! This module turns a [`PackageRegistry`] into a [`Snapshot`]: every
//! reported package is sized by walking its install root, and totals are
//! derived from the resulting records.
//!
//! # Failure policy
//!
//! Only a registry that cannot be queried fails a pass
//! ([`AggregateError::EnvironmentUnavailable`]). Unreadable files, broken
//! symlinks and missing install roots contribute zero bytes and are listed
//! in [`Snapshot::failures`].
//!
//! # Example
//!
//! ```
//! use viperview::aggregate::{build_snapshot, top_n};
//! use viperview::registry::StaticRegistry;
//!
//! let snapshot = build_snapshot(&StaticRegistry::default()).unwrap();
//! assert_eq!(snapshot.count(), 0);
//! assert!(top_n(&snapshot, 20).is_empty());
//! ```

pub mod sizing;
pub mod snapshot;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::registry::{PackageRegistry, RegistryError};

// Re-export main types for convenience
pub use sizing::{format_size, measure, to_mib, ReadFailure, SizeReport};
pub use snapshot::{
    filter, filter_records, rank, top_n, PackageRecord, Snapshot, SortKey, Summary,
};

/// Errors that end an aggregation pass without a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// The package registry could not be queried.
    #[error("Python environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    /// The pass was stopped through its [`CancelToken`].
    #[error("Scan cancelled")]
    Cancelled,
}

impl From<RegistryError> for AggregateError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::EnvironmentUnavailable(reason) => {
                AggregateError::EnvironmentUnavailable(reason)
            }
        }
    }
}

/// Result type alias for aggregation.
pub type AggregateResult<T> = Result<T, AggregateError>;

/// Shared flag used to stop a running pass.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token for every clone.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether [`CancelToken::cancel`] has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Builds a snapshot of every package `registry` reports.
pub fn build_snapshot<R: PackageRegistry + ?Sized>(registry: &R) -> AggregateResult<Snapshot> {
    build_snapshot_with(registry, &CancelToken::new())
}

/// [`build_snapshot`] that stops with [`AggregateError::Cancelled`] once
/// `cancel` fires.
pub fn build_snapshot_with<R: PackageRegistry + ?Sized>(
    registry: &R,
    cancel: &CancelToken,
) -> AggregateResult<Snapshot> {
    let started = Instant::now();
    let packages = registry.packages()?;

    let mut records = Vec::with_capacity(packages.len());
    let mut failures = Vec::new();

    for pkg in packages {
        if cancel.is_cancelled() {
            return Err(AggregateError::Cancelled);
        }

        let report = measure(&pkg.location, cancel).map_err(|_| AggregateError::Cancelled)?;
        debug!(
            "Sized {} at {}: {} bytes in {} files ({} unreadable)",
            pkg.name,
            pkg.location.display(),
            report.bytes,
            report.files,
            report.failures.len()
        );

        failures.extend(report.failures);
        records.push(PackageRecord::new(
            pkg.name,
            pkg.version,
            pkg.location,
            report.bytes,
        ));
    }

    let snapshot = Snapshot::new(records, failures);
    info!(
        "Aggregated {} packages ({}) in {:.2?}, {} unreadable entries",
        snapshot.count(),
        format_size(snapshot.total_size_bytes()),
        started.elapsed(),
        snapshot.failures().len()
    );
    Ok(snapshot)
}
