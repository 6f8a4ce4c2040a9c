use crate::model::HarvestOutcome;
use crate::traits::{MetadataProbe, ProbeError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument};

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Admission gate bounding the number of probes in flight.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// A held admission. Dropping it returns the permit on every exit path,
/// including cancellation of the future that holds it.
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    /// Returns `None` when `max_permits` is zero.
    pub fn new(max_permits: usize) -> Option<Self> {
        if max_permits == 0 {
            return None;
        }
        Some(Self {
            semaphore: Arc::new(Semaphore::new(max_permits)),
            max_permits,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits ever held at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Stops admitting. Held permits stay valid; pending and later
    /// `acquire` calls fail with `ProbeError::Admission`.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Suspends until a permit is available. Fails only once the limiter
    /// has been closed.
    pub async fn acquire(&self) -> Result<LimiterPermit, ProbeError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ProbeError::Admission(format!("Semaphore error: {}", e)))?;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Ok(LimiterPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Runs one probe while holding a permit.
    #[instrument(skip(self, probe), fields(probe_id = probe.probe_id()))]
    pub async fn run<P>(&self, probe: &P, path: &Path) -> Result<HarvestOutcome, ProbeError>
    where
        P: MetadataProbe + ?Sized,
    {
        let _permit = self.acquire().await?;
        debug!(path = %path.display(), in_flight = self.in_flight(), "Probe admitted");
        probe.probe(path).await
    }
}
