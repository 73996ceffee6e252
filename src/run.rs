//! Extraction run driver: files → pages → client → sink.
//!
//! ## Ordering
//!
//! Files are processed in the order given and pages in page order, with a
//! single request in flight. The key pool is shared by every page of the
//! run, so a key retired on page 3 stays retired for page 40. Each question
//! is saved before the next page is rendered.
//!
//! ## When does a run stop early?
//!
//! * Key exhaustion on any page ends the run: no credential is left.
//! * Any other page failure ends the run unless
//!   [`ExtractionConfig::continue_on_page_error`] is set.
//! * A rasterisation or sink failure is fatal and returned as `Err`.
//!
//! A halted run still returns `Ok(RunReport)` with the failed page's error
//! in its [`PageOutcome`] and the remaining pages counted as skipped.

use crate::backend::{GeminiBackend, VisionBackend};
use crate::client::ExtractionClient;
use crate::config::ExtractionConfig;
use crate::error::{ExtractionError, PageError};
use crate::output::{PageOutcome, RunReport, RunStats};
use crate::pipeline::encode::{encode_page, PageImage};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::render::{self, RenderOptions, RenderedPage};
use crate::question::QuestionRecord;
use crate::sink::QuestionSink;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// One exam paper and the year its questions are filed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamFile {
    pub path: PathBuf,
    pub year: i32,
}

impl ExamFile {
    pub fn new(path: impl Into<PathBuf>, year: i32) -> Self {
        Self {
            path: path.into(),
            year,
        }
    }
}

/// Extract questions from every page of `files`, saving each to `sink`.
///
/// # Errors
/// Returns `Err` only for fatal errors: unreadable or invalid input files,
/// pdfium failures, a backend that cannot be built, or a sink that rejects
/// a record. Page-level failures are reported inside the [`RunReport`].
pub async fn run_extraction(
    files: &[ExamFile],
    config: &ExtractionConfig,
    sink: &mut dyn QuestionSink,
) -> Result<RunReport, ExtractionError> {
    let resolved = files
        .iter()
        .map(|f| input::resolve_local(&f.path).map(|r| (f.clone(), r)))
        .collect::<Result<Vec<_>, _>>()?;
    run_resolved(resolved, config, sink).await
}

/// Extract questions from an in-memory PDF, e.g. an upload.
///
/// The bytes are written to a managed temp file for the duration of the run.
pub async fn extract_from_bytes(
    bytes: &[u8],
    name: &str,
    year: i32,
    config: &ExtractionConfig,
    sink: &mut dyn QuestionSink,
) -> Result<RunReport, ExtractionError> {
    let staged = input::stage_bytes(bytes, name).await?;
    run_resolved(vec![(ExamFile::new(name, year), staged)], config, sink).await
}

async fn run_resolved(
    inputs: Vec<(ExamFile, ResolvedInput)>,
    config: &ExtractionConfig,
    sink: &mut dyn QuestionSink,
) -> Result<RunReport, ExtractionError> {
    let mut run = ExtractionRun::new(config, sink)?;

    // ── Step 1: Count pages ──────────────────────────────────────────────
    let mut counts = Vec::with_capacity(inputs.len());
    for (_, resolved) in &inputs {
        counts.push(render::page_count(resolved.path()).await?);
    }
    run.start(inputs.len(), counts.iter().sum());

    // ── Step 2: Render and extract, page by page ─────────────────────────
    let options = RenderOptions {
        scale: config.render_scale,
        max_pixels: config.max_rendered_pixels,
    };
    for ((file, resolved), total) in inputs.iter().zip(counts) {
        if run.is_halted() {
            run.skip_pages(total);
            continue;
        }
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(&file.path, file.year, total);
        }
        info!("Extracting {} ({} pages, year {})", file.path.display(), total, file.year);

        let mut pages = render::render_pages(resolved.path(), options);
        let mut seen = 0;
        loop {
            let wait = Instant::now();
            let Some(next) = pages.recv().await else {
                break;
            };
            run.stats.render_duration_ms += wait.elapsed().as_millis() as u64;
            let rendered = next?;
            seen += 1;
            run.process_rendered(file, total, rendered).await?;
            if run.is_halted() {
                break;
            }
        }
        run.skip_pages(total.saturating_sub(seen));
    }

    Ok(run.finish())
}

/// State of one run: the client (and with it the key pool), the sink and
/// what has been collected so far.
///
/// [`run_extraction`] drives this from rasterised pages; callers that already
/// have page images can drive it directly with [`ExtractionRun::process_page`].
pub struct ExtractionRun<'a> {
    config: &'a ExtractionConfig,
    sink: &'a mut dyn QuestionSink,
    client: ExtractionClient,
    questions: Vec<QuestionRecord>,
    pages: Vec<PageOutcome>,
    stats: RunStats,
    started: Instant,
    halted: bool,
}

impl<'a> ExtractionRun<'a> {
    /// Build the backend and a fresh key pool for one run.
    pub fn new(
        config: &'a ExtractionConfig,
        sink: &'a mut dyn QuestionSink,
    ) -> Result<Self, ExtractionError> {
        let pool = config.key_pool();
        if pool.is_empty() {
            return Err(ExtractionError::NoApiKeys);
        }
        let backend: Arc<dyn VisionBackend> = match config.backend {
            Some(ref b) => Arc::clone(b),
            None => Arc::new(GeminiBackend::from_config(config)?),
        };
        let client =
            ExtractionClient::new(backend, pool).with_max_attempts(config.max_attempts_per_page);
        Ok(Self {
            config,
            sink,
            client,
            questions: Vec::new(),
            pages: Vec::new(),
            stats: RunStats::default(),
            started: Instant::now(),
            halted: false,
        })
    }

    /// Record the run's size and fire `on_run_start`.
    pub fn start(&mut self, total_files: usize, total_pages: usize) {
        self.stats.total_files = total_files;
        self.stats.total_pages = total_pages;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(total_files, total_pages);
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    fn skip_pages(&mut self, n: usize) {
        self.stats.skipped_pages += n;
    }

    async fn process_rendered(
        &mut self,
        file: &ExamFile,
        total_pages: usize,
        rendered: RenderedPage,
    ) -> Result<(), ExtractionError> {
        match encode_page(rendered.page_num, &rendered.image) {
            Ok(page) => self.process_page(&file.path, file.year, total_pages, &page).await,
            Err(e) => {
                let error = PageError::EncodeFailed {
                    page: rendered.page_num,
                    detail: e.to_string(),
                };
                self.page_failed(&file.path, file.year, total_pages, rendered.page_num, 0, error);
                Ok(())
            }
        }
    }

    /// Extract one page and save its questions.
    ///
    /// # Errors
    /// Only a sink failure is returned; page failures are recorded in the
    /// report and may halt the run.
    pub async fn process_page(
        &mut self,
        file: &Path,
        year: i32,
        total_pages: usize,
        page: &PageImage,
    ) -> Result<(), ExtractionError> {
        let page_num = page.page_num;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_page_start(page_num, total_pages);
        }

        let start = Instant::now();
        let result = self.client.extract(page, &self.config.marking).await;
        let elapsed = start.elapsed().as_millis() as u64;
        self.stats.extraction_duration_ms += elapsed;

        let questions = match result {
            Ok(q) => q,
            Err(e) => {
                let error = PageError::from_client(page_num, &e);
                self.page_failed(file, year, total_pages, page_num, elapsed, error);
                return Ok(());
            }
        };

        let count = questions.len();
        for (index, question) in questions.into_iter().enumerate() {
            let record = QuestionRecord::new(question, &self.config.placement, year);
            self.sink
                .save(&record)
                .await
                .map_err(|source| ExtractionError::SinkFailed {
                    page: page_num,
                    source,
                })?;
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_question_saved(page_num, index);
            }
            self.questions.push(record);
        }

        self.stats.processed_pages += 1;
        self.stats.total_questions += count;
        self.pages.push(PageOutcome {
            file: file.to_path_buf(),
            year,
            page_num,
            questions: count,
            duration_ms: elapsed,
            error: None,
        });
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_page_complete(page_num, total_pages, count);
        }
        Ok(())
    }

    fn page_failed(
        &mut self,
        file: &Path,
        year: i32,
        total_pages: usize,
        page_num: usize,
        duration_ms: u64,
        error: PageError,
    ) {
        warn!("{} page {}: {}", file.display(), page_num, error);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_page_error(page_num, total_pages, &error.to_string());
        }
        let exhausted = matches!(error, PageError::KeysExhausted { .. });
        if exhausted || !self.config.continue_on_page_error {
            warn!("Halting run after {} page {}", file.display(), page_num);
            self.halted = true;
        }
        self.stats.failed_pages += 1;
        self.pages.push(PageOutcome {
            file: file.to_path_buf(),
            year,
            page_num,
            questions: 0,
            duration_ms,
            error: Some(error),
        });
    }

    /// Close the run and return its report.
    pub fn finish(mut self) -> RunReport {
        self.stats.halted = self.halted;
        self.stats.failed_keys = self.client.pool_state().failed_count();
        self.stats.total_duration_ms = self.started.elapsed().as_millis() as u64;
        info!(
            "Run complete: {} questions from {}/{} pages, {} failed, {} skipped, {}ms",
            self.stats.total_questions,
            self.stats.processed_pages,
            self.stats.total_pages,
            self.stats.failed_pages,
            self.stats.skipped_pages,
            self.stats.total_duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(self.stats.total_questions, self.stats.failed_pages);
        }
        RunReport {
            questions: self.questions,
            pages: self.pages,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::keys::ApiKey;
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted(Mutex<VecDeque<Result<String, ServiceError>>>);

    #[async_trait]
    impl VisionBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            _key: &ApiKey,
            _prompt: &str,
            _page: &PageImage,
        ) -> Result<String, ServiceError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ServiceError::NoJsonArray))
        }
    }

    fn config(keys: &[&str], replies: Vec<Result<String, ServiceError>>) -> ExtractionConfig {
        ExtractionConfig::builder()
            .api_keys(keys.iter().copied())
            .course_id("course-9")
            .slot("S2")
            .backend(Arc::new(Scripted(Mutex::new(replies.into()))))
            .build()
            .unwrap()
    }

    fn page(n: usize) -> PageImage {
        PageImage::from_png_bytes(n, b"png")
    }

    #[tokio::test]
    async fn questions_are_annotated_and_saved_in_order() {
        let cfg = config(
            &["k"],
            vec![
                Ok(r#"[{"question_statement":"A"},{"question_statement":"B"}]"#.into()),
                Ok(r#"[{"question_statement":"C","options":["x"]}]"#.into()),
            ],
        );
        let mut sink = MemorySink::new();
        let mut run = ExtractionRun::new(&cfg, &mut sink).unwrap();
        run.start(1, 2);
        run.process_page(Path::new("p.pdf"), 2019, 2, &page(1)).await.unwrap();
        run.process_page(Path::new("p.pdf"), 2019, 2, &page(2)).await.unwrap();
        let report = run.finish();

        assert_eq!(report.stats.processed_pages, 2);
        assert_eq!(report.stats.total_questions, 3);
        assert!(report.is_complete());
        let statements: Vec<_> = sink.records.iter().map(|r| r.question.question_statement.clone()).collect();
        assert_eq!(statements, vec!["A", "B", "C"]);
        let r = &sink.records[2];
        assert_eq!((r.course_id.as_str(), r.slot.as_deref(), r.year, r.categorized), ("course-9", Some("S2"), 2019, false));
        assert_eq!(report.questions, sink.records);
    }

    #[tokio::test]
    async fn page_failure_halts_by_default() {
        let cfg = config(&["k1"], vec![Ok("nothing".into())]);
        let mut sink = MemorySink::new();
        let mut run = ExtractionRun::new(&cfg, &mut sink).unwrap();
        run.process_page(Path::new("p.pdf"), 2020, 3, &page(1)).await.unwrap();
        assert!(run.is_halted());
        let report = run.finish();
        assert_eq!(report.stats.failed_pages, 1);
        assert!(report.stats.halted);
        assert!(matches!(
            report.first_error(),
            Some(PageError::ExtractionFailed { page: 1, attempts: 1, .. })
        ));
    }

    #[tokio::test]
    async fn continue_on_error_keeps_going_until_keys_run_out() {
        let mut cfg = config(
            &["k1", "k2"],
            vec![Err(ServiceError::Status { status: 500, body: "x".into() }), Ok("[]".into())],
        );
        cfg.continue_on_page_error = true;
        cfg.max_attempts_per_page = Some(1);
        let mut sink = MemorySink::new();
        let mut run = ExtractionRun::new(&cfg, &mut sink).unwrap();

        run.process_page(Path::new("p.pdf"), 2020, 3, &page(1)).await.unwrap();
        assert!(!run.is_halted(), "non-exhaustion failure is tolerated");
        run.process_page(Path::new("p.pdf"), 2020, 3, &page(2)).await.unwrap();
        assert!(!run.is_halted());

        let report = run.finish();
        assert_eq!(report.stats.failed_pages, 1);
        assert_eq!(report.stats.processed_pages, 1);
        assert_eq!(report.stats.failed_keys, 1);
    }

    #[tokio::test]
    async fn key_exhaustion_always_halts() {
        let mut cfg = config(&["k1"], vec![Err(ServiceError::Timeout { secs: 1 })]);
        cfg.continue_on_page_error = true;
        let mut sink = MemorySink::new();
        let mut run = ExtractionRun::new(&cfg, &mut sink).unwrap();

        run.process_page(Path::new("p.pdf"), 2020, 2, &page(1)).await.unwrap();
        assert!(!run.is_halted());
        run.process_page(Path::new("p.pdf"), 2020, 2, &page(2)).await.unwrap();
        assert!(run.is_halted());
        let report = run.finish();
        assert!(matches!(
            report.pages[1].error,
            Some(PageError::KeysExhausted { page: 2, total: 1 })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let cfg = config(&["k"], vec![]);
        let mut sink = MemorySink::new();
        let err = run_extraction(&[ExamFile::new("/no/such/exam.pdf", 2001)], &cfg, &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::FileNotFound { .. }));
    }
}
