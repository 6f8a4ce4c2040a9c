//! Bounded-concurrency harvest coordinator.
//!
//! This module provides the [`HarvestCoordinator`] that turns an ordered list
//! of [`MediaItem`]s into an equally ordered list of [`HarvestResult`]s:
//! - One `tokio` task per item, admitted through a [`ConcurrencyLimiter`]
//! - Per-item failures absorbed as no-metadata outcomes
//! - Results written into a slot per input position, so completion order
//!   never affects output order
//! - Exactly one progress event per item, and a progress `finalize` on every
//!   exit path via [`ProgressGuard`]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::config::ConfigError;
use crate::executor::ConcurrencyLimiter;
use crate::harvest::progress::{ProgressGuard, ProgressSink};
use crate::model::{HarvestOutcome, HarvestResult, MediaItem, MissReason};
use crate::traits::{MetadataProbe, ProbeError};

// ============================================================================
// Errors
// ============================================================================

/// Errors that cross the coordinator boundary. Per-item problems never do.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    /// Invalid settings, detected before any probing starts
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The probe tool cannot be used at all
    #[error("Probe unavailable: {0}")]
    ProbeUnavailable(#[from] ProbeError),

    /// A harvest task panicked or lost its result
    #[error("Harvest task failed: {0}")]
    TaskFailed(String),
}

// ============================================================================
// Summary
// ============================================================================

/// Totals for one finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HarvestSummary {
    pub total: usize,
    pub tagged: usize,
    pub missing: HashMap<MissReason, usize>,
    pub elapsed: Duration,
}

impl HarvestSummary {
    pub fn from_results(results: &[HarvestResult], elapsed: Duration) -> Self {
        let mut summary = Self {
            total: results.len(),
            elapsed,
            ..Self::default()
        };
        for result in results {
            match result.outcome.miss_reason() {
                None => summary.tagged += 1,
                Some(reason) => *summary.missing.entry(reason).or_insert(0) += 1,
            }
        }
        summary
    }

    pub fn missing(&self, reason: MissReason) -> usize {
        self.missing.get(&reason).copied().unwrap_or(0)
    }

    /// Items whose probe ran but produced nothing.
    pub fn failed(&self) -> usize {
        self.missing(MissReason::ProbeFailed)
            + self.missing(MissReason::TimedOut)
            + self.missing(MissReason::Malformed)
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Runs a [`MetadataProbe`] over many files with a bounded number in flight.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use xspf_harvester::harvest::{FfprobeInvoker, HarvestCoordinator, SilentProgress};
///
/// let coordinator = HarvestCoordinator::new(FfprobeInvoker::default(), 8)?;
/// let results = coordinator
///     .harvest(items, Arc::new(SilentProgress::new()))
///     .await?;
/// ```
pub struct HarvestCoordinator<P: MetadataProbe> {
    probe: Arc<P>,
    limiter: Arc<ConcurrencyLimiter>,
    metadata_enabled: bool,
}

impl<P> HarvestCoordinator<P>
where
    P: MetadataProbe + 'static,
{
    /// Creates a coordinator allowing `concurrency` probes at once.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Config`] when `concurrency` is zero.
    pub fn new(probe: P, concurrency: usize) -> Result<Self, HarvestError> {
        let limiter = ConcurrencyLimiter::new(concurrency)
            .ok_or(ConfigError::InvalidConcurrency(concurrency))?;
        Ok(Self {
            probe: Arc::new(probe),
            limiter: Arc::new(limiter),
            metadata_enabled: true,
        })
    }

    /// Enables or disables probing. When disabled every item yields the
    /// no-metadata marker without touching the probe.
    pub fn with_metadata(mut self, enabled: bool) -> Self {
        self.metadata_enabled = enabled;
        self
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Harvests every item and returns results in input order.
    ///
    /// `progress` receives exactly one event per item and is finalized once
    /// before this returns, or when the returned future is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ProbeUnavailable`] when the probe tool cannot
    /// be started; outstanding tasks are aborted.
    #[instrument(skip_all, fields(items = items.len(), metadata = self.metadata_enabled))]
    pub async fn harvest<S>(
        &self,
        items: Vec<MediaItem>,
        progress: Arc<S>,
    ) -> Result<Vec<HarvestResult>, HarvestError>
    where
        S: ProgressSink + ?Sized + 'static,
    {
        let _finalize = ProgressGuard::new(Arc::clone(&progress));
        let start = std::time::Instant::now();

        if !self.metadata_enabled {
            let results: Vec<HarvestResult> = items
                .into_iter()
                .map(|item| {
                    let outcome = HarvestOutcome::missing(MissReason::Disabled);
                    progress.record_completion(&outcome);
                    HarvestResult {
                        ordinal: item.ordinal,
                        outcome,
                    }
                })
                .collect();
            info!(count = results.len(), "Metadata disabled, skipped probing");
            return Ok(results);
        }

        let total = items.len();
        let mut slots: Vec<Option<HarvestResult>> = (0..total).map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (slot, item) in items.into_iter().enumerate() {
            let probe = Arc::clone(&self.probe);
            let limiter = Arc::clone(&self.limiter);
            let progress = Arc::clone(&progress);
            tasks.spawn(async move {
                let outcome = limiter.run(probe.as_ref(), &item.path).await?;
                progress.record_completion(&outcome);
                Ok::<_, ProbeError>((
                    slot,
                    HarvestResult {
                        ordinal: item.ordinal,
                        outcome,
                    },
                ))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((slot, result))) => slots[slot] = Some(result),
                Ok(Err(e)) => {
                    warn!(error = %e, "Aborting harvest");
                    self.limiter.close();
                    tasks.abort_all();
                    return Err(HarvestError::ProbeUnavailable(e));
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(HarvestError::TaskFailed(e.to_string()));
                }
            }
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(slot, result)| {
                result.ok_or_else(|| HarvestError::TaskFailed(format!("no result for item {}", slot)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            count = results.len(),
            peak_in_flight = self.limiter.peak(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Harvest completed"
        );
        Ok(results)
    }
}

// ============================================================================
// Tests
// ============================================================================
