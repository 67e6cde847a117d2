//! Structured progress events.
//!
//! The core stages report progress through a sink instead of writing to an
//! output stream, so they stay testable without capturing console text.

use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// A pipeline stage started working on `rows` input rows.
    StageStarted { stage: &'static str, rows: usize },
    /// Periodic chunk progress: `processed` of `total` rows done.
    ChunkCompleted {
        stage: &'static str,
        processed: usize,
        total: usize,
        percent: u32,
    },
    /// One-time notice that the input is large enough to take a while.
    LargeInput { stage: &'static str, rows: usize },
    /// Points silently dropped by the inner containment join. This is the
    /// only signal that data was lost.
    Unmatched {
        stage: &'static str,
        dropped: usize,
        total: usize,
        percent: f64,
    },
}

pub trait ProgressSink {
    fn report(&mut self, event: Progress);
}

/// Forwards events to `tracing`. With `verbose` set, loss diagnostics are
/// promoted to info level.
#[derive(Debug, Default)]
pub struct LogSink {
    pub verbose: bool,
}

impl ProgressSink for LogSink {
    fn report(&mut self, event: Progress) {
        match event {
            Progress::StageStarted { stage, rows } => {
                info!(stage, rows, "stage started");
            }
            Progress::ChunkCompleted {
                stage,
                processed,
                total,
                percent,
            } => {
                info!(stage, processed, total, percent, "chunk progress");
            }
            Progress::LargeInput { stage, rows } => {
                warn!(stage, rows, "many points to locate, this is going to take a while");
            }
            Progress::Unmatched {
                stage,
                dropped,
                total,
                percent,
            } => {
                if self.verbose {
                    info!(
                        stage,
                        dropped, total, percent, "points not found within provided boundaries"
                    );
                } else {
                    debug!(
                        stage,
                        dropped, total, percent, "points not found within provided boundaries"
                    );
                }
            }
        }
    }
}

/// Discards all events. For library callers and tests.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&mut self, _event: Progress) {}
}

/// Records every event in order.
#[derive(Debug, Default)]
pub struct CaptureSink {
    pub events: Vec<Progress>,
}

impl ProgressSink for CaptureSink {
    fn report(&mut self, event: Progress) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_sink_does_not_panic() {
        let mut sink = LogSink { verbose: true };
        sink.report(Progress::StageStarted {
            stage: "locate",
            rows: 10,
        });
        sink.report(Progress::Unmatched {
            stage: "locate",
            dropped: 1,
            total: 10,
            percent: 10.0,
        });
    }

    #[test]
    fn test_capture_sink_records_in_order() {
        let mut sink = CaptureSink::default();
        sink.report(Progress::StageStarted {
            stage: "grid",
            rows: 0,
        });
        sink.report(Progress::LargeInput {
            stage: "locate",
            rows: 600_000,
        });
        assert_eq!(sink.events.len(), 2);
        assert!(matches!(sink.events[0], Progress::StageStarted { .. }));
    }
}
