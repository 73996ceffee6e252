//! Error types for the pdf2questions library.
//!
//! Failures fall into four families, each with its own type so that every
//! layer only has to handle what it can actually recover from:
//!
//! * [`ExtractionError`] — **Fatal**: the run cannot proceed at all (bad
//!   input file, no API keys, the persistence sink rejected a record).
//!   Returned as `Err(ExtractionError)` from [`crate::run::run_extraction`].
//!
//! * [`PageError`] — **Non-fatal**: a single page failed. Stored inside
//!   [`crate::output::PageOutcome`] so callers can inspect partial success.
//!
//! * [`ClientError`] / [`ServiceError`] — what the
//!   [`crate::client::ExtractionClient`] reports for one page. Service errors
//!   are recovered by rotating to the next API key and only surface once the
//!   attempt budget is spent.
//!
//! * [`MarkupError`] — malformed diagram JSON or math that does not typeset.
//!   Rendering contains these locally and falls back to literal text; they are
//!   never propagated to the caller of the renderer.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2questions library.
#[derive(Debug, Error)]
pub enum ExtractionError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/dir-containing-libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// No usable API key was supplied for the run.
    #[error("No API keys configured.\nProvide at least one with --key or GEMINI_API_KEYS.")]
    NoApiKeys,

    /// The HTTP client for the vision backend could not be constructed.
    #[error("Vision backend '{backend}' could not be initialised: {detail}")]
    BackendInit { backend: String, detail: String },

    /// Some pages succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::RunReport::into_result`] when the caller
    /// wants to treat any page failure as an error.
    #[error("{failed}/{total} pages failed during extraction")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── Persistence errors ────────────────────────────────────────────────
    /// The question sink rejected a record; the run stops so no question is lost silently.
    #[error("Failed to persist question from page {page}: {source}")]
    SinkFailed {
        page: usize,
        #[source]
        source: SinkError,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The rasterised page could not be encoded as PNG.
    #[error("Page {page}: image encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },

    /// Every API key has been marked failed during this run.
    #[error("Page {page}: all {total} API keys have failed")]
    KeysExhausted { page: usize, total: usize },

    /// Every attempt allowed for the page failed.
    #[error("Page {page}: extraction failed after {attempts} attempts: {detail}")]
    ExtractionFailed {
        page: usize,
        attempts: usize,
        detail: String,
    },
}

impl PageError {
    /// Build the page-level error from what the client reported.
    pub fn from_client(page: usize, err: &ClientError) -> Self {
        match err {
            ClientError::KeysExhausted { total } => PageError::KeysExhausted {
                page,
                total: *total,
            },
            ClientError::ExtractionFailed { attempts, cause } => PageError::ExtractionFailed {
                page,
                attempts: *attempts,
                detail: cause.to_string(),
            },
        }
    }

    pub fn page(&self) -> usize {
        match self {
            PageError::EncodeFailed { page, .. }
            | PageError::KeysExhausted { page, .. }
            | PageError::ExtractionFailed { page, .. } => *page,
        }
    }
}

/// Outcome of [`crate::client::ExtractionClient::extract`] when no key produced a result.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// The pool had no active key left when an attempt was due.
    #[error("all {total} API keys have failed")]
    KeysExhausted { total: usize },

    /// The attempt budget ran out; `cause` is the last failure observed.
    #[error("extraction failed after {attempts} attempts: {cause}")]
    ExtractionFailed {
        attempts: usize,
        #[source]
        cause: ServiceError,
    },
}

/// A failed exchange with the external extraction service.
///
/// Every variant is treated as transient with respect to the run: the key
/// that produced it is retired and the next key is tried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    /// Connection-level failure (DNS, TLS, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Non-2xx HTTP status.
    #[error("API request failed: {status} - {body}")]
    Status { status: u16, body: String },

    /// 2xx, but the response envelope did not have the expected shape.
    #[error("invalid response envelope: {0}")]
    MalformedEnvelope(String),

    /// The model's text contained no `[...]` span.
    #[error("no JSON array found in model response")]
    NoJsonArray,

    /// The `[...]` span was not a valid array of question objects.
    #[error("malformed question JSON: {0}")]
    MalformedJson(String),
}

/// Content that could not be interpreted; rendering degrades to literal text.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MarkupError {
    /// Diagram JSON was present but did not deserialize.
    #[error("invalid diagram JSON: {0}")]
    InvalidDiagram(String),

    /// A math fragment could not be typeset.
    #[error("cannot typeset '{tex}': {detail}")]
    Typeset { tex: String, detail: String },
}

/// Failure inside a [`crate::sink::QuestionSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialisation error: {0}")]
    Json(#[from] serde_json::Error),

    /// A JSON Lines file contained a record that could not be read back.
    #[error("line {line}: {detail}")]
    BadRecord { line: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = ExtractionError::PartialFailure {
            success: 9,
            failed: 1,
            total: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
    }

    #[test]
    fn status_error_display() {
        let e = ServiceError::Status {
            status: 429,
            body: "quota".into(),
        };
        assert_eq!(e.to_string(), "API request failed: 429 - quota");
    }

    #[test]
    fn page_error_from_exhausted_client() {
        let err = ClientError::KeysExhausted { total: 3 };
        let page = PageError::from_client(7, &err);
        assert_eq!(page, PageError::KeysExhausted { page: 7, total: 3 });
        assert_eq!(page.page(), 7);
        assert!(page.to_string().contains("all 3 API keys"));
    }

    #[test]
    fn page_error_keeps_last_cause() {
        let err = ClientError::ExtractionFailed {
            attempts: 2,
            cause: ServiceError::NoJsonArray,
        };
        match PageError::from_client(1, &err) {
            PageError::ExtractionFailed { attempts, detail, .. } => {
                assert_eq!(attempts, 2);
                assert!(detail.contains("no JSON array"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn sink_failure_display_names_page() {
        let e = ExtractionError::SinkFailed {
            page: 4,
            source: SinkError::Io(std::io::Error::other("disk full")),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 4"));
        assert!(msg.contains("disk full"));
    }
}
