//! Background aggregation for the interactive UI.
//!
//! A [`ScanWorker`] runs at most one aggregation pass at a time on its own
//! thread and reports the outcome through a channel. Refresh requests made
//! while a pass is in flight are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::aggregate::{build_snapshot_with, AggregateError, CancelToken, Snapshot};
use crate::registry::PackageRegistry;

/// Registry handle shareable with the scan thread.
pub type SharedRegistry = Arc<dyn PackageRegistry + Send + Sync>;

/// Messages sent from the scan thread to the UI thread.
#[derive(Debug)]
pub enum ScanEvent {
    /// A pass has begun.
    Started,
    /// A pass finished; the snapshot replaces whatever the UI holds.
    Finished(Snapshot),
    /// The environment could not be queried.
    Failed(String),
    /// The pass was cancelled before completing.
    Cancelled,
}

/// Runs aggregation passes off the UI thread, one at a time.
pub struct ScanWorker {
    registry: SharedRegistry,
    events_tx: Sender<ScanEvent>,
    events_rx: Receiver<ScanEvent>,
    in_flight: Arc<AtomicBool>,
    current: Option<(CancelToken, JoinHandle<()>)>,
}

impl ScanWorker {
    /// Creates an idle worker over `registry`.
    pub fn new(registry: SharedRegistry) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            registry,
            events_tx,
            events_rx,
            in_flight: Arc::new(AtomicBool::new(false)),
            current: None,
        }
    }

    /// Starts a pass unless one is already running.
    ///
    /// Returns `false` when the request was dropped.
    pub fn request_refresh(&mut self) -> bool {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Refresh ignored: a scan is already in flight");
            return false;
        }

        // The previous pass has cleared `in_flight`, so its thread is done.
        if let Some((_, handle)) = self.current.take() {
            if handle.join().is_err() {
                warn!("Previous scan thread panicked");
            }
        }

        let cancel = CancelToken::new();
        let registry = Arc::clone(&self.registry);
        let tx = self.events_tx.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let token = cancel.clone();

        let handle = thread::spawn(move || {
            // The UI may have gone away; nothing to do about a closed channel.
            let _ = tx.send(ScanEvent::Started);
            let event = match build_snapshot_with(registry.as_ref(), &token) {
                Ok(snapshot) => ScanEvent::Finished(snapshot),
                Err(AggregateError::Cancelled) => ScanEvent::Cancelled,
                Err(err) => ScanEvent::Failed(err.to_string()),
            };
            in_flight.store(false, Ordering::Release);
            let _ = tx.send(event);
        });

        self.current = Some((cancel, handle));
        true
    }

    /// Whether a pass is currently running.
    pub fn is_scanning(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Next pending event, without blocking.
    pub fn try_recv(&self) -> Option<ScanEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Next event, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ScanEvent> {
        self.events_rx.recv_timeout(timeout).ok()
    }

    /// Asks the running pass, if any, to stop.
    pub fn cancel(&self) {
        if let Some((token, _)) = &self.current {
            token.cancel();
        }
    }
}

impl Drop for ScanWorker {
    fn drop(&mut self) {
        if let Some((token, handle)) = self.current.take() {
            token.cancel();
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{InstalledPackage, RegistryError, RegistryResult, StaticRegistry};
    use std::fs;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(10);

    /// Blocks `packages` until the test releases it.
    struct GatedRegistry {
        gate: Receiver<()>,
        inner: StaticRegistry,
    }

    impl PackageRegistry for GatedRegistry {
        fn packages(&self) -> RegistryResult<Vec<InstalledPackage>> {
            let _ = self.gate.recv();
            self.inner.packages()
        }
    }

    struct BrokenRegistry;

    impl PackageRegistry for BrokenRegistry {
        fn packages(&self) -> RegistryResult<Vec<InstalledPackage>> {
            Err(RegistryError::EnvironmentUnavailable("no python".to_string()))
        }
    }

    fn wait_for_outcome(worker: &ScanWorker) -> ScanEvent {
        loop {
            match worker.recv_timeout(WAIT).expect("scan produced no event") {
                ScanEvent::Started => continue,
                other => return other,
            }
        }
    }

    #[test]
    fn test_worker_delivers_snapshot() {
        let site = TempDir::new().unwrap();
        let dir = site.path().join("pkg");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("mod.py"), vec![0u8; 64]).unwrap();

        let registry = StaticRegistry::new(vec![InstalledPackage::new("pkg", "1.0", dir)]);
        let mut worker = ScanWorker::new(Arc::new(registry));

        assert!(worker.request_refresh());
        match wait_for_outcome(&worker) {
            ScanEvent::Finished(snapshot) => {
                assert_eq!(snapshot.count(), 1);
                assert_eq!(snapshot.total_size_bytes(), 64);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_refresh_dropped_while_in_flight() {
        let (release, gate) = unbounded();
        let registry = GatedRegistry {
            gate,
            inner: StaticRegistry::default(),
        };
        let mut worker = ScanWorker::new(Arc::new(registry));

        assert!(worker.request_refresh());
        assert!(worker.is_scanning());
        assert!(!worker.request_refresh());

        release.send(()).unwrap();
        assert!(matches!(wait_for_outcome(&worker), ScanEvent::Finished(_)));
        assert!(!worker.is_scanning());

        // A new pass may start once the previous one finished.
        release.send(()).unwrap();
        assert!(worker.request_refresh());
        assert!(matches!(wait_for_outcome(&worker), ScanEvent::Finished(_)));
    }

    #[test]
    fn test_worker_reports_unavailable_environment() {
        let mut worker = ScanWorker::new(Arc::new(BrokenRegistry));
        assert!(worker.request_refresh());

        match wait_for_outcome(&worker) {
            ScanEvent::Failed(message) => assert!(message.contains("no python")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_cancel_running_pass() {
        let site = TempDir::new().unwrap();
        let (release, gate) = unbounded();
        let registry = GatedRegistry {
            gate,
            inner: StaticRegistry::new(vec![InstalledPackage::new(
                "pkg",
                "1.0",
                site.path().to_path_buf(),
            )]),
        };
        let mut worker = ScanWorker::new(Arc::new(registry));

        assert!(worker.request_refresh());
        worker.cancel();
        release.send(()).unwrap();

        assert!(matches!(wait_for_outcome(&worker), ScanEvent::Cancelled));
    }
}
