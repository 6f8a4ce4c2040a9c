//! Progress reporting for a harvest run.
//!
//! [`TerminalProgress`] redraws a single status line in place:
//!
//! ```text
//!    7/120 |#                   |  0min 03s |  0min 48s
//! ```
//!
//! The cursor is hidden on the first redraw and shown again by
//! [`ProgressSink::finalize`]. [`ProgressGuard`] ties `finalize` to scope so it
//! also runs when the harvest future is dropped or unwinds.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::model::HarvestOutcome;

pub const BAR_WIDTH: usize = 20;

const HIDE_CURSOR: &str = "\x1b[?25l";
const SHOW_CURSOR: &str = "\x1b[?25h";
const CLEAR_TO_EOL: &str = "\x1b[K";

/// Receives one completion event per harvested item.
///
/// Implementations must tolerate concurrent callers; events are serialized,
/// never merged or dropped.
pub trait ProgressSink: Send + Sync {
    fn record_completion(&self, outcome: &HarvestOutcome);

    /// Restores whatever the sink changed. Safe to call more than once.
    fn finalize(&self);
}

/// Counter state for one run.
#[derive(Debug, Clone)]
pub struct ProgressState {
    completed: usize,
    total: usize,
    started: Instant,
}

/// What a single redraw shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub remaining: Duration,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self::started_at(total, Instant::now())
    }

    pub fn started_at(total: usize, started: Instant) -> Self {
        Self {
            completed: 0,
            total,
            started,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Counts one completion. Returns `None` once the counter is saturated,
    /// which also covers a total of zero.
    pub fn advance(&mut self, now: Instant) -> Option<ProgressSnapshot> {
        if self.completed >= self.total {
            return None;
        }
        self.completed += 1;
        let elapsed = now.saturating_duration_since(self.started);
        let ratio = self.total as f64 / self.completed as f64 - 1.0;
        Some(ProgressSnapshot {
            completed: self.completed,
            total: self.total,
            elapsed,
            remaining: elapsed.mul_f64(ratio),
        })
    }
}

impl ProgressSnapshot {
    /// Renders the status line, including the trailing clear and `\r`.
    pub fn render(&self) -> String {
        let width = digits(self.total);
        let filled = self.completed * BAR_WIDTH / self.total.max(1);
        format!(
            "  {:>width$}/{} |{}{}| {} | {}{}\r",
            self.completed,
            self.total,
            "#".repeat(filled),
            " ".repeat(BAR_WIDTH - filled),
            format_time(self.elapsed),
            format_time(self.remaining),
            CLEAR_TO_EOL,
            width = width,
        )
    }
}

fn digits(mut n: usize) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

/// Formats whole seconds as ` 3min 07s`.
pub fn format_time(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:>2}min {:02}s", secs / 60, secs % 60)
}

fn emit<W: Write>(writer: &mut W, frame: &str) -> std::io::Result<()> {
    writer.write_all(frame.as_bytes())?;
    writer.flush()
}

struct TerminalInner<W> {
    state: ProgressState,
    writer: W,
    cursor_hidden: bool,
    finalized: bool,
}

/// In-place progress line for an interactive terminal.
pub struct TerminalProgress<W: Write + Send> {
    inner: Mutex<TerminalInner<W>>,
}

impl TerminalProgress<std::io::Stderr> {
    pub fn stderr(total: usize) -> Self {
        Self::new(total, std::io::stderr())
    }
}

impl<W: Write + Send> TerminalProgress<W> {
    pub fn new(total: usize, writer: W) -> Self {
        Self {
            inner: Mutex::new(TerminalInner {
                state: ProgressState::new(total),
                writer,
                cursor_hidden: false,
                finalized: false,
            }),
        }
    }

    pub fn completed(&self) -> usize {
        self.lock().state.completed()
    }

    fn lock(&self) -> MutexGuard<'_, TerminalInner<W>> {
        // A panic mid-redraw leaves the counter consistent; keep going.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> ProgressSink for TerminalProgress<W> {
    fn record_completion(&self, _outcome: &HarvestOutcome) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.finalized {
            return;
        }
        let Some(snapshot) = inner.state.advance(Instant::now()) else {
            return;
        };
        let mut frame = String::new();
        if !inner.cursor_hidden {
            frame.push_str(HIDE_CURSOR);
            inner.cursor_hidden = true;
        }
        frame.push_str(&snapshot.render());
        if let Err(e) = emit(&mut inner.writer, &frame) {
            debug!(error = %e, "Progress redraw failed");
        }
    }

    fn finalize(&self) {
        let mut inner = self.lock();
        if inner.finalized {
            return;
        }
        inner.finalized = true;
        if !inner.cursor_hidden {
            return;
        }
        inner.cursor_hidden = false;
        let frame = format!("\n{}", SHOW_CURSOR);
        if let Err(e) = emit(&mut inner.writer, &frame) {
            debug!(error = %e, "Failed to restore cursor");
        }
    }
}

/// Sink for non-interactive runs: counts events and logs at debug level.
#[derive(Debug, Default)]
pub struct SilentProgress {
    completed: AtomicUsize,
    finalized: AtomicBool,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl ProgressSink for SilentProgress {
    fn record_completion(&self, outcome: &HarvestOutcome) {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(completed = done, tagged = outcome.miss_reason().is_none(), "Item harvested");
    }

    fn finalize(&self) {
        if !self.finalized.swap(true, Ordering::SeqCst) {
            debug!(completed = self.completed(), "Progress finalized");
        }
    }
}

/// Calls [`ProgressSink::finalize`] when dropped.
pub struct ProgressGuard<S: ProgressSink + ?Sized> {
    sink: Arc<S>,
}

impl<S: ProgressSink + ?Sized> ProgressGuard<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self { sink }
    }
}

impl<S: ProgressSink + ?Sized> Drop for ProgressGuard<S> {
    fn drop(&mut self) {
        self.sink.finalize();
    }
}
