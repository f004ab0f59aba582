/*!
 * Core transfer engine: batch orchestration, progress aggregation, retry
 */

pub mod batch;
pub mod compress;
pub mod progress;
pub mod retry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use batch::{BatchMode, BatchReport, BatchRequest, BatchStatus, Orchestrator, TransferItem};
pub use progress::{BatchEvent, BatchReporter};
pub use retry::{operation_timeout, RetryPolicy, Retryable};

/// Callback invoked with aggregated progress, 0–100
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// A progress callback that discards every value
pub fn null_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// Cooperative cancellation flag
///
/// The orchestrator checks it between items, the segmented-upload strategies
/// between parts. An in-flight request is allowed to finish or time out; it
/// is never forcibly killed.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the batch this flag belongs to
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Format a byte count for terminal batch messages ("1.5 MB")
pub fn format_size(size_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if size_bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", size_bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
