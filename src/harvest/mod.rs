//! Harvest module - concurrent metadata extraction for playlist building.
//!
//! - **Probe**: one external `ffprobe` call per file via [`FfprobeInvoker`]
//! - **Pipeline**: bounded, order-preserving fan-out via [`HarvestCoordinator`]
//! - **Progress**: in-place terminal progress via [`TerminalProgress`]
//! - **Formats**: playlist serialization via [`formats::XspfPlaylist`]

pub mod formats;
pub mod pipeline;
pub mod probe;
pub mod progress;

pub use pipeline::{HarvestCoordinator, HarvestError, HarvestSummary};
pub use probe::{FfprobeInvoker, DEFAULT_PROBE_TIMEOUT};
pub use progress::{
    format_time, ProgressGuard, ProgressSink, ProgressSnapshot, ProgressState, SilentProgress,
    TerminalProgress,
};
