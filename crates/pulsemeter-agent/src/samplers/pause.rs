//! Pause classifier.
//!
//! Rust has no collector of its own, so pauses are pushed by whichever
//! subsystem stops the world (arena compaction, ballast release, ...) through
//! a [`PauseReporter`]. Raw kinds use the classic runtime performance codes.

use std::time::Duration;

use tokio::sync::mpsc;

use pulsemeter_core::Histogram;

pub const PAUSE_KIND_MINOR: u32 = 1;
pub const PAUSE_KIND_MAJOR: u32 = 4;
pub const PAUSE_KIND_INCREMENTAL: u32 = 8;
pub const PAUSE_KIND_WEAK_CALLBACKS: u32 = 16;

const PAUSE_QUEUE_DEPTH: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseClass {
    Major,
    Minor,
    Incremental,
    Weak,
}

impl PauseClass {
    /// Unrecognized kinds fall into `Weak`.
    pub fn classify(kind: u32) -> Self {
        match kind {
            PAUSE_KIND_MAJOR => PauseClass::Major,
            PAUSE_KIND_MINOR => PauseClass::Minor,
            PAUSE_KIND_INCREMENTAL => PauseClass::Incremental,
            _ => PauseClass::Weak,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PauseClass::Major => "major",
            PauseClass::Minor => "minor",
            PauseClass::Incremental => "incremental",
            PauseClass::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseEvent {
    pub kind: u32,
    pub duration: Duration,
}

/// Cloneable sending side. Reporting never blocks; a full queue drops the event.
#[derive(Clone)]
pub struct PauseReporter(mpsc::Sender<PauseEvent>);

impl PauseReporter {
    pub fn report(&self, event: PauseEvent) {
        if let Err(e) = self.0.try_send(event) {
            tracing::warn!(kind = event.kind, error = %e, "pause event dropped");
        }
    }
}

pub fn pause_channel() -> (PauseReporter, mpsc::Receiver<PauseEvent>) {
    let (tx, rx) = mpsc::channel(PAUSE_QUEUE_DEPTH);
    (PauseReporter(tx), rx)
}

pub struct PauseClassifier {
    histogram: Histogram,
}

impl PauseClassifier {
    pub fn new(histogram: Histogram) -> Self {
        Self { histogram }
    }

    pub fn record(&self, event: PauseEvent) {
        let class = PauseClass::classify(event.kind);
        self.histogram
            .record_duration(event.duration, &[("kind", class.as_str())]);
    }

    /// Drain events until every reporter is dropped.
    pub async fn run(self, mut events: mpsc::Receiver<PauseEvent>) {
        while let Some(event) = events.recv().await {
            self.record(event);
        }
        tracing::debug!("pause reporters closed; classifier exiting");
    }
}
