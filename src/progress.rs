//! Progress-callback trait for extraction run events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the run walks files and pages.
//!
//! Events arrive in run order: pages are processed strictly one after
//! another, so a callback sees `on_page_start(n)` → `on_question_saved` ×k →
//! `on_page_complete(n)` (or `on_page_error(n)`) before page `n + 1` starts.
//!
//! # Example
//!
//! ```rust
//! use pdf2questions::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     saved: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_question_saved(&self, page_num: usize, index: usize) {
//!         self.saved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Saved question {} from page {}", index + 1, page_num);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .api_key("key")
//!     .course_id("math-2")
//!     .progress_callback(Arc::new(CountingCallback { saved: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the extraction run as it processes each file and page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Page numbers are 1-indexed within their file.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once, before the first page is rendered.
    ///
    /// # Arguments
    /// * `total_files` — number of files in the run
    /// * `total_pages` — pages across all files
    fn on_run_start(&self, total_files: usize, total_pages: usize) {
        let _ = (total_files, total_pages);
    }

    /// Called when a file is opened.
    fn on_file_start(&self, path: &Path, year: i32, total_pages: usize) {
        let _ = (path, year, total_pages);
    }

    /// Called just before the page is sent for extraction.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called after a question has been handed to the sink.
    ///
    /// `index` is the 0-based position of the question on its page.
    fn on_question_saved(&self, page_num: usize, index: usize) {
        let _ = (page_num, index);
    }

    /// Called when a page was extracted and all its questions saved.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, questions: usize) {
        let _ = (page_num, total_pages, questions);
    }

    /// Called when a page failed.
    ///
    /// # Arguments
    /// * `error` — human-readable error description
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once at the end of the run, including a run that halted early.
    ///
    /// # Arguments
    /// * `total_questions` — questions extracted across all pages
    /// * `failed_pages`    — pages that ended in an error
    fn on_run_complete(&self, total_questions: usize, failed_pages: usize) {
        let _ = (total_questions, failed_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        pages: AtomicUsize,
        saved: AtomicUsize,
        errors: AtomicUsize,
        questions_total: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_question_saved(&self, _page_num: usize, _index: usize) {
            self.saved.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, total_questions: usize, _failed_pages: usize) {
            self.questions_total.store(total_questions, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(1, 5);
        cb.on_file_start(Path::new("a.pdf"), 2020, 5);
        cb.on_page_start(1, 5);
        cb.on_question_saved(1, 0);
        cb.on_page_complete(1, 5, 1);
        cb.on_page_error(2, 5, "some error");
        cb.on_run_complete(1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_page_start(1, 2);
        tracker.on_question_saved(1, 0);
        tracker.on_question_saved(1, 1);
        tracker.on_page_start(2, 2);
        tracker.on_page_error(2, 2, "all 2 API keys have failed");
        tracker.on_run_complete(2, 1);

        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.saved.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.questions_total.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(2, 10);
        cb.on_page_complete(1, 10, 3);
    }
}
