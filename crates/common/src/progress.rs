//! Transfer progress tracking.
//!
//! A `ProgressTracker` does pure byte bookkeeping for a single transfer and
//! drives the periodic status line. It supports two usage modes:
//!
//! - **Single-active-segment mode** - one segment is in flight at a time;
//!   `next_segment` folds the finished segment into a running offset and
//!   `set_segment_received` reports absolute bytes within the active
//!   segment. Used by the SDK-managed path, which fetches parts in
//!   sequence.
//! - **Cumulative mode** - `advance` simply adds completed bytes. Used by
//!   the segmented-HTTP path, where blocks complete in arbitrary order and
//!   "current segment" has no single meaning.
//!
//! Progress updates are safe to apply out of order; the transferred count
//! is monotonically non-decreasing until it reaches the total. The
//! completion line is emitted exactly once no matter how often `display`
//! is called afterwards.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

/// Byte-level progress bookkeeping for one transfer.
pub struct ProgressTracker {
    /// Total length of the object being transferred.
    total_length: u64,
    /// Bytes in fully completed prior segments (single-segment mode).
    segment_offset: AtomicU64,
    /// Size of the active segment (display only).
    segment_size: AtomicU64,
    /// Zero-based index of the active segment (display only).
    segment_index: AtomicUsize,
    /// Bytes received within the active segment, or the running total in
    /// cumulative mode.
    received_in_segment: AtomicU64,
    /// Whether the completion line has been emitted.
    done_displayed: AtomicBool,
    /// Transfer start time, for throughput computation.
    start: Instant,
}

impl ProgressTracker {
    /// Create a tracker for an object of known total length.
    pub fn new(total_length: u64) -> Self {
        Self {
            total_length,
            segment_offset: AtomicU64::new(0),
            segment_size: AtomicU64::new(0),
            segment_index: AtomicUsize::new(0),
            received_in_segment: AtomicU64::new(0),
            done_displayed: AtomicBool::new(false),
            start: Instant::now(),
        }
    }

    /// Begin the next sequential segment of `size` bytes.
    ///
    /// Folds the previous segment's size into the running offset and
    /// resets the per-segment counter. Single-active-segment mode only.
    pub fn next_segment(&self, size: u64) {
        let previous: u64 = self.segment_size.swap(size, Ordering::SeqCst);
        self.segment_offset.fetch_add(previous, Ordering::SeqCst);
        if previous > 0 {
            self.segment_index.fetch_add(1, Ordering::SeqCst);
        }
        self.received_in_segment.store(0, Ordering::SeqCst);
    }

    /// Report absolute bytes received within the active segment.
    pub fn set_segment_received(&self, bytes: u64) {
        self.received_in_segment.store(bytes, Ordering::SeqCst);
    }

    /// Add `delta` completed bytes. Cumulative mode.
    pub fn advance(&self, delta: u64) {
        self.received_in_segment.fetch_add(delta, Ordering::SeqCst);
    }

    /// Zero-based index of the active segment.
    pub fn segment_index(&self) -> usize {
        self.segment_index.load(Ordering::SeqCst)
    }

    /// Total bytes transferred so far.
    pub fn transferred_bytes(&self) -> u64 {
        self.segment_offset.load(Ordering::SeqCst)
            + self.received_in_segment.load(Ordering::SeqCst)
    }

    /// Whether every byte of the object has been transferred.
    pub fn is_complete(&self) -> bool {
        self.transferred_bytes() == self.total_length
    }

    /// Whether the completion line has already been emitted.
    pub fn completion_displayed(&self) -> bool {
        self.done_displayed.load(Ordering::SeqCst)
    }

    /// Emit one status line.
    ///
    /// Once the transfer is complete this emits the final line exactly
    /// once; subsequent calls are no-ops.
    pub fn display(&self) {
        if self.completion_displayed() {
            return;
        }

        let transferred: u64 = self.transferred_bytes();
        let percent: f64 = if self.total_length == 0 {
            100.0
        } else {
            transferred as f64 / self.total_length as f64 * 100.0
        };
        let elapsed: f64 = self.start.elapsed().as_secs_f64();
        let rate_mbs: f64 = if elapsed > 0.0 {
            transferred as f64 / (1024.0 * 1024.0) / elapsed
        } else {
            0.0
        };

        tracing::info!(
            "Received {} of {} ({:.1}%), {:.1} MBs/sec",
            transferred,
            self.total_length,
            percent,
            rate_mbs
        );

        if self.is_complete() {
            self.done_displayed.store(true, Ordering::SeqCst);
        }
    }

    /// Spawn the periodic display task.
    ///
    /// Emits a status line every `interval` until the transfer completes,
    /// then performs one last display and stops. The caller should abort
    /// the returned handle when the transfer ends early.
    pub fn start_display_timer(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let tracker: Arc<ProgressTracker> = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately and prints the 0% line.
            loop {
                ticker.tick().await;
                tracker.display();
                if tracker.is_complete() {
                    break;
                }
            }
        })
    }

    /// Stop the periodic display task and emit the final line.
    pub fn finish(&self, timer: JoinHandle<()>) {
        timer.abort();
        self.display();
    }
}
