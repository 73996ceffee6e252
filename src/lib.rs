//! # pdf2questions
//!
//! Extract structured exam questions from scanned PDF papers with a vision
//! model, and render the extracted markup (prose, LaTeX math, embedded
//! diagrams) back to HTML and SVG.
//!
//! ## Why this crate?
//!
//! Exam papers are mostly scans. Text extraction returns nothing useful and
//! OCR loses fractions, matrices and every figure. Instead each page is
//! rasterised and sent to a vision model with a fixed instruction that asks
//! for a JSON array of questions, math in KaTeX syntax and figures as small
//! diagram documents. This crate drives that model across many pages and a
//! pool of API keys, and then interprets what comes back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate local file or stage uploaded bytes
//!  ├─ 2. Render   rasterise page by page via pdfium (spawn_blocking)
//!  ├─ 3. Encode   PNG → base64 PageImage
//!  ├─ 4. Extract  one request in flight; rotate API keys on failure
//!  ├─ 5. Persist  annotate with course/slot/part/year, save to the sink
//!  └─ 6. Report   per-page outcomes + run stats
//!
//! question markup ─▶ tokenize ─▶ render ─▶ HTML (MathML + SVG)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2questions::{run_extraction, ExamFile, ExtractionConfig, JsonlSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .api_keys(["key-one", "key-two"])
//!         .course_id("physics-101")
//!         .build()?;
//!     let mut sink = JsonlSink::open("questions.jsonl").await?;
//!     let report = run_extraction(&[ExamFile::new("paper-2021.pdf", 2021)], &config, &mut sink).await?;
//!     eprintln!("{} questions from {} pages", report.stats.total_questions, report.stats.processed_pages);
//!     Ok(())
//! }
//! ```
//!
//! Rendering needs no network or pdfium:
//!
//! ```rust
//! use pdf2questions::ContentRenderer;
//!
//! let html = ContentRenderer::new().render_html(r"Find $x$ if \frac{x}{2} = 3");
//! assert!(html.contains("<math"));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2q` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2questions = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod client;
pub mod config;
pub mod diagram;
pub mod error;
pub mod keys;
pub mod markup;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod question;
pub mod render;
pub mod run;
pub mod sink;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{GeminiBackend, GenerationSettings, VisionBackend};
pub use client::{parse_questions, ExtractionClient};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, MarkingScheme, QuestionPlacement};
pub use diagram::{
    bounding_box, diagram_to_svg, layout, BoundingBox, DiagramDocument, DiagramElement, Layout,
    Primitive,
};
pub use error::{ClientError, ExtractionError, MarkupError, PageError, ServiceError, SinkError};
pub use keys::{ApiKey, KeyPool, PoolState};
pub use markup::{reconstruct, tokenize, ContentSegment, DisplayMode, MathEngine, MathMlEngine};
pub use output::{PageOutcome, RunReport, RunStats};
pub use pipeline::encode::PageImage;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use question::{ExtractedQuestion, QuestionOption, QuestionRecord};
pub use render::{render_preview_page, render_question_html, ContentRenderer, RenderNode};
pub use run::{extract_from_bytes, run_extraction, ExamFile, ExtractionRun};
pub use sink::{read_jsonl, JsonlSink, MemorySink, QuestionSink};
