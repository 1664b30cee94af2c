//! Progress reporting for vectorization.
//!
//! Events are logged through `tracing` and, when a callback is attached,
//! handed to the caller (the CLI prints them).

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Stage of a vectorization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Extract,
    Chunk,
    Embed,
    Commit,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Extract => "extract",
            Phase::Chunk => "chunk",
            Phase::Embed => "embed",
            Phase::Commit => "commit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: Phase,

    /// Units done so far (documents, chunks or vectors)
    pub current: u64,

    /// Total expected units, if known
    pub total: Option<u64>,

    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: f64,
}

impl ProgressEvent {
    /// Completion percentage, when the total is known.
    pub fn percentage(&self) -> Option<f64> {
        self.total.map(|t| {
            if t > 0 {
                (self.current as f64 / t as f64) * 100.0
            } else {
                100.0
            }
        })
    }

    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };

        let pct = self
            .percentage()
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            started: Instant::now(),
        }
    }

    /// Reporter that only logs.
    pub fn noop() -> Self {
        Self {
            callback: None,
            started: Instant::now(),
        }
    }

    pub fn emit(&self, phase: Phase, current: u64, total: Option<u64>, message: impl Into<String>) {
        let event = ProgressEvent {
            phase,
            current,
            total,
            message: message.into(),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        };

        tracing::debug!(
            phase = %event.phase,
            current = event.current,
            total = ?event.total,
            elapsed_secs = event.elapsed_secs,
            "{}",
            event.message
        );

        if let Some(callback) = &self.callback {
            callback(&event);
        }
    }

    pub fn extract(&self, current: u64, total: Option<u64>, source: &str) {
        self.emit(
            Phase::Extract,
            current,
            total,
            format!("reading {}", source),
        );
    }

    pub fn chunk(&self, chunks_created: usize) {
        self.emit(
            Phase::Chunk,
            chunks_created as u64,
            None,
            format!("{} chunks created", chunks_created),
        );
    }

    pub fn embed(&self, current: usize, total: usize, model: &str) {
        self.emit(
            Phase::Embed,
            current as u64,
            Some(total as u64),
            format!("model={}", model),
        );
    }

    pub fn commit(&self, index_len: usize) {
        self.emit(
            Phase::Commit,
            index_len as u64,
            None,
            format!("index now holds {} entries", index_len),
        );
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}
