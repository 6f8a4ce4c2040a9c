use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use xspf_harvester::harvest::formats::XspfPlaylist;
use xspf_harvester::harvest::{
    format_time, FfprobeInvoker, HarvestCoordinator, HarvestSummary, ProgressSink,
    SilentProgress, TerminalProgress,
};
use xspf_harvester::{HarvestConfig, MediaScanner, MissReason, OutputTarget};

/// Command-line arguments for xspf-harvester
#[derive(Parser, Debug)]
#[command(name = "xspf-harvester")]
#[command(about = "Build an XSPF playlist from a directory of media files")]
#[command(version)]
struct Args {
    /// Directory to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Write the playlist to this file instead of stdout
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Prefix prepended to every track location
    #[arg(short = 'p', long = "prefix")]
    prefix: Option<String>,

    /// Playlist title
    #[arg(long)]
    title: Option<String>,

    /// Maximum number of concurrent probes
    #[arg(short = 'j', long = "jobs", env = "XSPF_HARVESTER_JOBS")]
    jobs: Option<usize>,

    /// Per-file probe timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Skip probing; emit locations only
    #[arg(long)]
    no_metadata: bool,

    /// Path to the ffprobe binary
    #[arg(long, env = "XSPF_HARVESTER_FFPROBE")]
    ffprobe: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "XSPF_HARVESTER_CONFIG")]
    config: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<(PathBuf, HarvestConfig)> {
        let mut config = match &self.config {
            Some(path) => HarvestConfig::from_toml_file(path)?,
            None => HarvestConfig::default(),
        };
        if self.file.is_some() {
            config.output = OutputTarget::from_option(self.file);
        }
        if let Some(prefix) = self.prefix {
            config.location_prefix = prefix;
        }
        if self.title.is_some() {
            config.title = self.title;
        }
        if let Some(jobs) = self.jobs {
            config.concurrency = jobs;
        }
        if let Some(timeout) = self.timeout {
            config.probe_timeout_secs = timeout;
        }
        if self.no_metadata {
            config.metadata = false;
        }
        if let Some(ffprobe) = self.ffprobe {
            config.ffprobe_path = ffprobe;
        }
        Ok((self.path, config))
    }
}

// Returning from main lets the runtime shut down and drop aborted probe
// tasks, which kills their children.
#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let (root, config) = Args::parse().into_config()?;
    config.validate().context("Configuration validation failed")?;

    let items = MediaScanner::new(&config.extensions)
        .follow_links(config.follow_links)
        .scan(&root)
        .with_context(|| format!("Failed to scan {}", root.display()))?;
    info!(root = %root.display(), files = items.len(), "Scan complete");

    let probe = FfprobeInvoker::new(&config.ffprobe_path).with_timeout(config.probe_timeout());
    let coordinator =
        HarvestCoordinator::new(probe, config.concurrency)?.with_metadata(config.metadata);

    let interactive = std::io::stderr().is_terminal();
    let progress: Arc<dyn ProgressSink> = if interactive {
        Arc::new(TerminalProgress::stderr(items.len()))
    } else {
        Arc::new(SilentProgress::new())
    };

    let start = Instant::now();
    let results = tokio::select! {
        harvested = coordinator.harvest(items.clone(), progress) => {
            harvested.context("Harvest failed")?
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, abandoning in-flight probes");
            anyhow::bail!("interrupted");
        }
    };
    let summary = HarvestSummary::from_results(&results, start.elapsed());

    let playlist = XspfPlaylist::assemble(
        &items,
        &results,
        &config.location_prefix,
        config.title.clone(),
    );
    playlist
        .write_to(&config.output)
        .context("Failed to write playlist")?;

    if summary.failed() > 0 {
        warn!(
            failed = summary.failed(),
            timed_out = summary.missing(MissReason::TimedOut),
            "Some files produced no metadata"
        );
    }
    if interactive {
        eprintln!(
            "{} tracks in {}\x1b[K",
            summary.total,
            format_time(summary.elapsed)
        );
    }
    Ok(())
}
