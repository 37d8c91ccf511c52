//! Progress-callback trait and cancellation handle for captioning runs.
//!
//! Inject an [`Arc<dyn CaptionProgressCallback>`] via
//! [`crate::config::CaptionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline visits each candidate: a progress
//! fraction after every candidate, a warning for every per-image failure,
//! and a line for every caption produced.
//!
//! # Example
//!
//! ```rust
//! use edgequake_page2captions::{CaptionConfig, CaptionProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! struct WarningLog {
//!     lines: Mutex<Vec<String>>,
//! }
//!
//! impl CaptionProgressCallback for WarningLog {
//!     fn on_item_warning(&self, _index: usize, _total: usize, url: String, message: String) {
//!         self.lines.lock().unwrap().push(format!("{url}: {message}"));
//!     }
//! }
//!
//! let log = Arc::new(WarningLog { lines: Mutex::new(vec![]) });
//! let config = CaptionConfig::builder()
//!     .progress_callback(log as Arc<dyn CaptionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Called by the captioning pipeline as it visits each candidate.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events for one run are delivered from a single
/// task, in candidate order, even when `concurrency > 1`.
pub trait CaptionProgressCallback: Send + Sync {
    /// Called once before the first candidate is visited.
    ///
    /// # Arguments
    /// * `total_candidates`: number of `<img>` candidates in the run,
    ///   including those the URL filter will drop
    fn on_run_start(&self, total_candidates: usize) {
        let _ = total_candidates;
    }

    /// Called after a caption record has been appended.
    ///
    /// # Arguments
    /// * `index`  : 0-based candidate index
    /// * `total`  : total candidates
    /// * `url`    : resolved image URL
    /// * `caption`: the cleaned caption text
    fn on_item_captioned(&self, index: usize, total: usize, url: &str, caption: &str) {
        let _ = (index, total, url, caption);
    }

    /// Called when fetching, decoding, or captioning one image failed.
    ///
    /// # Arguments
    /// * `index`  : 0-based candidate index
    /// * `total`  : total candidates
    /// * `url`    : resolved image URL
    /// * `message`: human-readable error description
    fn on_item_warning(&self, index: usize, total: usize, url: String, message: String) {
        let _ = (index, total, url, message);
    }

    /// Called after every candidate, whatever its outcome.
    ///
    /// `fraction` is `(index + 1) / total`, always in `[0.0, 1.0]`.
    fn on_progress(&self, fraction: f64, index: usize, total: usize) {
        let _ = (fraction, index, total);
    }

    /// Called once after the last candidate (or after cancellation).
    ///
    /// # Arguments
    /// * `total_candidates`: candidates in the run
    /// * `processed`       : captions produced
    fn on_run_complete(&self, total_candidates: usize, processed: usize) {
        let _ = (total_candidates, processed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CaptionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CaptionConfig`].
pub type ProgressCallback = Arc<dyn CaptionProgressCallback>;

/// Cooperative cancellation flag shared between a caller and a running pipeline.
///
/// The pipeline checks it once per candidate before starting work on it, so a
/// fetch/decode/caption unit that has already begun always completes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Progress fraction for the candidate at `index` out of `total`.
pub(crate) fn fraction(index: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        ((index + 1) as f64 / total as f64).min(1.0)
    }
}
