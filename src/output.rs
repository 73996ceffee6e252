//! Result types for an extraction run.

use crate::error::{ExtractionError, PageError};
use crate::question::QuestionRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happened to one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOutcome {
    pub file: PathBuf,
    pub year: i32,
    /// 1-indexed within `file`.
    pub page_num: usize,
    /// Questions extracted and saved from this page.
    pub questions: usize,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

impl PageOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Run-level counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_files: usize,
    pub total_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    /// Pages never attempted because the run halted first.
    pub skipped_pages: usize,
    pub total_questions: usize,
    /// Keys retired during the run.
    pub failed_keys: usize,
    pub total_duration_ms: u64,
    /// Time spent waiting on the rasteriser.
    pub render_duration_ms: u64,
    /// Time spent in extraction requests, retries included.
    pub extraction_duration_ms: u64,
    /// True when a page failure ended the run early.
    pub halted: bool,
}

/// Everything a run produced, in page order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub questions: Vec<QuestionRecord>,
    pub pages: Vec<PageOutcome>,
    pub stats: RunStats,
}

impl RunReport {
    /// The first page error, if any.
    pub fn first_error(&self) -> Option<&PageError> {
        self.pages.iter().find_map(|p| p.error.as_ref())
    }

    /// True when every page was attempted and none failed.
    pub fn is_complete(&self) -> bool {
        self.stats.failed_pages == 0 && self.stats.skipped_pages == 0
    }

    /// Turn any page failure into [`ExtractionError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, ExtractionError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(ExtractionError::PartialFailure {
                success: self.stats.processed_pages,
                failed: self.stats.failed_pages + self.stats.skipped_pages,
                total: self.stats.total_pages,
            })
        }
    }
}
