use crate::model::HarvestOutcome;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Systemic probe failures. Per-file failures are not errors; they come back
/// as [`HarvestOutcome::NoMetadata`].
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Probe tool could not be started ({program}): {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The concurrency limiter was closed after an earlier systemic failure.
    #[error("Probe admission failed: {0}")]
    Admission(String),
    #[error("IO error while talking to probe: {0}")]
    IoError(#[from] std::io::Error),
}

#[async_trait]
pub trait MetadataProbe: Send + Sync {
    /// Returns a short name for the probe (e.g., "ffprobe").
    fn probe_id(&self) -> &str;

    /// Extracts tags from one media file.
    async fn probe(&self, path: &Path) -> Result<HarvestOutcome, ProbeError>;
}
