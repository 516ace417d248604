//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConverterOptionsBuilder::progress_callback`] to receive
//! events as [`crate::convert::convert_batch`] works through its files. The
//! CLI drives its progress bar this way.
//!
//! # Example
//!
//! ```rust
//! use hwp_parser::{ConversionProgressCallback, ConverterOptions};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     failed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_file_error(&self, name: &str, error: &str) {
//!         self.failed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name}: {error}");
//!     }
//! }
//!
//! let options = ConverterOptions::builder()
//!     .progress_callback(Arc::new(CountingCallback { failed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch driver as it converts each file.
///
/// Files are converted concurrently, so `on_file_*` methods may be called
/// from several tasks at once. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any file is converted.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file's conversion starts.
    fn on_file_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when a file was converted and saved.
    ///
    /// # Arguments
    /// * `name`       : source file name
    /// * `output`     : where the result was written
    /// * `content_len`: characters (text) or bytes (odt) produced
    fn on_file_complete(&self, name: &str, output: &std::path::Path, content_len: usize) {
        let _ = (name, output, content_len);
    }

    /// Called when a file failed. The batch continues.
    fn on_file_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConverterOptions`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        total: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_files: usize) {
            self.total.store(total_files, Ordering::SeqCst);
        }

        fn on_file_start(&self, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _name: &str, _output: &Path, _content_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, _name: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total_files: usize, success_count: usize) {
            self.succeeded.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_file_start("a.hwp");
        cb.on_file_complete("a.hwp", Path::new("a.md"), 10);
        cb.on_file_error("b.hwp", "hwp5html failed");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(3);
        for name in ["a.hwp", "b.hwp", "c.hwp"] {
            tracker.on_file_start(name);
        }
        tracker.on_file_complete("a.hwp", Path::new("a.md"), 1);
        tracker.on_file_complete("b.hwp", Path::new("b.md"), 1);
        tracker.on_file_error("c.hwp", "boom");
        tracker.on_batch_complete(3, 2);

        assert_eq!(tracker.total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_file_start("x.hwp");
    }
}
