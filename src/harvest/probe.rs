//! ffprobe-backed [`MetadataProbe`].
//!
//! Each call spawns one short-lived `ffprobe` process asking for the
//! `title`, `artist`, `album` and `track` tags plus the container duration.
//! Anything that goes wrong with a single file (non-zero exit, garbage on
//! stdout, deadline exceeded) is reported as [`HarvestOutcome::NoMetadata`];
//! only a tool that cannot be started at all surfaces as [`ProbeError`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::model::{HarvestOutcome, MissReason, TagRecord};
use crate::traits::{MetadataProbe, ProbeError};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Invokes `ffprobe` once per file with a hard deadline.
#[derive(Debug, Clone)]
pub struct FfprobeInvoker {
    program: PathBuf,
    prefix_args: Vec<String>,
    timeout: Duration,
}

impl FfprobeInvoker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments placed before the probe arguments, for running the tool
    /// through a wrapper (`nice`, a shell script, ...).
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn build_args(&self, path: &Path) -> Vec<String> {
        let mut args = self.prefix_args.clone();
        args.extend(
            [
                "-hide_banner",
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_entries",
                "format_tags=title,artist,album,track",
                "-show_entries",
                "format=duration",
                "-i",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(path.to_string_lossy().to_string());
        args
    }
}

impl Default for FfprobeInvoker {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl MetadataProbe for FfprobeInvoker {
    fn probe_id(&self) -> &str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<HarvestOutcome, ProbeError> {
        let mut child = Command::new(&self.program)
            .args(self.build_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProbeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdout = child.stdout.take();
        let run = async {
            let mut buf = Vec::new();
            if let Some(out) = stdout.as_mut() {
                out.read_to_end(&mut buf).await?;
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, buf))
        };
        let finished = timeout(self.timeout, run).await;

        match finished {
            Ok(Ok((status, buf))) => {
                if !status.success() {
                    debug!(path = %path.display(), %status, "Probe exited unsuccessfully");
                    return Ok(HarvestOutcome::missing(MissReason::ProbeFailed));
                }
                match parse_probe_output(&buf) {
                    Some(tags) => Ok(HarvestOutcome::Tagged(tags)),
                    None => {
                        debug!(path = %path.display(), "Probe output malformed");
                        Ok(HarvestOutcome::missing(MissReason::Malformed))
                    }
                }
            }
            Ok(Err(e)) => Err(ProbeError::IoError(e)),
            Err(_) => {
                // Kill and reap so no orphan outlives the call.
                drop(stdout);
                if let Err(e) = child.kill().await {
                    warn!(path = %path.display(), error = %e, "Failed to kill timed-out probe");
                }
                debug!(
                    path = %path.display(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Probe timed out"
                );
                Ok(HarvestOutcome::missing(MissReason::TimedOut))
            }
        }
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    tags: BTreeMap<String, Value>,
    duration: Option<Value>,
}

/// Parses ffprobe's JSON report. Returns `None` when the report itself is
/// unusable; individual missing or odd fields are simply left out.
pub fn parse_probe_output(raw: &[u8]) -> Option<TagRecord> {
    let probe: ProbeOutput = serde_json::from_slice(raw).ok()?;
    let ProbeFormat { tags, duration } = probe.format;

    Some(TagRecord {
        title: tag_value(&tags, "title"),
        artist: tag_value(&tags, "artist"),
        album: tag_value(&tags, "album"),
        track_number: tag_value(&tags, "track").and_then(|t| parse_track_number(&t)),
        duration_millis: duration
            .and_then(value_as_string)
            .and_then(|d| parse_duration_millis(&d)),
    })
}

/// Exact lowercase key wins; otherwise the first case-insensitive match in
/// key order.
fn tag_value(tags: &BTreeMap<String, Value>, name: &str) -> Option<String> {
    tags.get(name)
        .or_else(|| {
            tags.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
        .cloned()
        .and_then(value_as_string)
}

fn value_as_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `"125.400000"` → `125400`. Fractional milliseconds are truncated.
/// Non-numeric, negative or non-finite values yield `None`.
pub fn parse_duration_millis(raw: &str) -> Option<u64> {
    let seconds: f64 = raw.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    // Absorb binary representation error (0.29 * 1000 = 289.99999999999994).
    Some((seconds * 1000.0 + MILLIS_EPSILON).floor() as u64)
}

const MILLIS_EPSILON: f64 = 1e-6;

/// Accepts `"7"` and `"7/12"`.
pub fn parse_track_number(raw: &str) -> Option<u32> {
    raw.split('/').next()?.trim().parse().ok()
}
