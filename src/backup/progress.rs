//! Progress events and cooperative cancellation
//!
//! The engine writes progress into an `mpsc` channel the caller drains on
//! its own thread. Sends never block, and events are dropped when nobody is
//! listening.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// One step of a long-running export or restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub processed: usize,
    pub total: usize,
    pub stage: String,
}

/// Sending half of the progress stream
///
/// `processed` never decreases across the events of one reporter.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    sender: Option<Sender<ProgressEvent>>,
    processed: Cell<usize>,
    total: Cell<usize>,
}

impl ProgressReporter {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self {
            sender: Some(sender),
            ..Self::default()
        }
    }

    /// A reporter that drops every event
    pub fn silent() -> Self {
        Self::default()
    }

    /// Set the total number of steps
    pub fn set_total(&self, total: usize) {
        self.total.set(total.max(self.processed.get()));
    }

    /// Report progress at an absolute position
    pub fn report(&self, processed: usize, stage: &str) {
        let processed = processed.max(self.processed.get());
        self.processed.set(processed);
        if processed > self.total.get() {
            self.total.set(processed);
        }

        if let Some(sender) = &self.sender {
            // A closed receiver just means nobody is watching
            let _ = sender.send(ProgressEvent {
                processed,
                total: self.total.get(),
                stage: stage.to_string(),
            });
        }
    }

    /// Advance by one step
    pub fn step(&self, stage: &str) {
        self.report(self.processed.get() + 1, stage);
    }

    /// Re-emit the current position under a new stage label
    pub fn stage(&self, stage: &str) {
        self.report(self.processed.get(), stage);
    }

    /// Jump to the end
    pub fn finish(&self, stage: &str) {
        self.report(self.total.get(), stage);
    }

    pub fn processed(&self) -> usize {
        self.processed.get()
    }
}

/// Shared cancellation flag, polled between items
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
