//! Progress aggregation and batch event reporting
//!
//! The aggregation functions are pure: they translate byte counts and item
//! indices into a single 0–100 value. [`BatchReporter`] carries those values
//! to the presentation layer over an mpsc channel, so no UI state is ever
//! touched from a worker task. A [`ProgressGate`] keeps the emitted sequence
//! monotonic even when retries rewind internal byte counters.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Percent of the batch window used by the archive-build phase of a
/// compressed upload; the upload phase is scaled into the remaining band.
pub const ARCHIVE_PHASE_PERCENT: u8 = 10;

/// Reported while the archive is still being written.
pub const ARCHIVE_BUILDING_PERCENT: u8 = 5;

/// Progress of a single item: `clamp(floor(done / total * 100), 0, 100)`
///
/// A zero-byte item is complete by definition and reports 100.
pub fn single_percent(bytes_done: u64, bytes_total: u64) -> u8 {
    if bytes_total == 0 {
        return 100;
    }
    let percent = (bytes_done.min(bytes_total) * 100) / bytes_total;
    percent.min(100) as u8
}

/// Overall progress of a multi-item batch
///
/// `index` is the 0-based position of the current item (items before it are
/// fully done) and `item_percent` its own progress. Output only grows as
/// either argument grows and never exceeds 100.
pub fn overall_percent(index: usize, total_items: usize, item_percent: u8) -> u8 {
    if total_items == 0 {
        return 100;
    }
    let numerator = (index as u64) * 100 + u64::from(item_percent.min(100));
    let percent = numerator / (total_items as u64);
    percent.min(100) as u8
}

/// Map upload progress of a compressed batch into the post-archive band:
/// `10 + floor(upload_percent * 0.9)`
pub fn compressed_percent(upload_percent: u8) -> u8 {
    let upload = u64::from(upload_percent.min(100));
    (u64::from(ARCHIVE_PHASE_PERCENT) + (upload * 90) / 100) as u8
}

/// Monotonic filter over emitted percent values
///
/// Adapters may re-report lower values after an internal retry; the gate
/// drops anything that does not strictly increase the last emitted value,
/// which also guarantees 100 is emitted at most once.
#[derive(Debug, Default)]
pub struct ProgressGate {
    last: AtomicU8,
}

impl ProgressGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(percent)` when `percent` advances past every previously
    /// accepted value, `None` otherwise.
    pub fn advance(&self, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        (percent > previous).then_some(percent)
    }

    /// Last accepted value (0 if nothing was accepted yet).
    pub fn current(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

/// Events delivered to the UI progress sink
///
/// A batch emits any number of `Progress` events followed by exactly one
/// `Finished` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum BatchEvent {
    /// Aggregated batch progress, 0–100, monotonically non-decreasing
    Progress(u8),

    /// Terminal notification with a human-readable summary
    Finished { success: bool, message: String },
}

/// Sends [`BatchEvent`]s from the batch task to the presentation layer
#[derive(Clone)]
pub struct BatchReporter {
    sender: UnboundedSender<BatchEvent>,
    gate: Arc<ProgressGate>,
    finished: Arc<AtomicBool>,
}

impl BatchReporter {
    /// Create a reporter and the receiving end for the UI
    pub fn new() -> (Self, UnboundedReceiver<BatchEvent>) {
        let (sender, receiver) = unbounded_channel();
        (
            Self {
                sender,
                gate: Arc::new(ProgressGate::new()),
                finished: Arc::new(AtomicBool::new(false)),
            },
            receiver,
        )
    }

    /// Report aggregated progress; values that do not advance are dropped
    pub fn progress(&self, percent: u8) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        if let Some(accepted) = self.gate.advance(percent) {
            // Receiver may already be gone; nothing to do about it here.
            let _ = self.sender.send(BatchEvent::Progress(accepted));
        }
    }

    /// Emit the terminal notification; later calls are ignored
    pub fn finished(&self, success: bool, message: impl Into<String>) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.sender.send(BatchEvent::Finished {
            success,
            message: message.into(),
        });
    }
}
