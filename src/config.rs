//! Configuration types for question extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. The marking scheme and placement that
//! get stamped onto every question live here too, so one value fully
//! describes a batch.
//!
//! # Design choice: builder over constructor
//! Most callers set the keys, the course and maybe the marking scheme; the
//! sampling and rendering knobs have defaults that match the prompt. The
//! builder lets them ignore the rest.

use crate::backend::{VisionBackend, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::error::ExtractionError;
use crate::keys::KeyPool;
use crate::progress::ExtractionProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use pdf2questions::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .api_keys(["key-one", "key-two"])
///     .course_id("physics-101")
///     .build()
///     .unwrap();
/// assert_eq!(config.api_keys.len(), 2);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Service credentials in rotation order. Trimmed, blanks and
    /// duplicates removed.
    pub api_keys: Vec<String>,

    /// Model identifier. Default: `gemini-2.0-flash-exp`.
    pub model: String,

    /// API base URL, without the `/models/...` suffix.
    pub endpoint: String,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Transcription wants the most likely reading of every symbol, not
    /// variety.
    pub temperature: f32,

    /// Default: 32.
    pub top_k: u32,

    /// Default: 0.9.
    pub top_p: f32,

    /// Maximum tokens generated per page. Default: 16384.
    ///
    /// Pages with several embedded diagrams produce long JSON; a truncated
    /// reply has no closing `]` and fails to parse.
    pub max_output_tokens: u32,

    /// Per-request timeout in seconds. Default: 120.
    ///
    /// A timed-out request counts as a failure of the key that sent it.
    pub request_timeout_secs: u64,

    /// Upper bound on requests per page. Default: None (the pool size).
    pub max_attempts_per_page: Option<usize>,

    /// Page rasterisation factor. Range: 0.25–8. Default: 2.0.
    pub render_scale: f32,

    /// Maximum rendered image dimension in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Keep going after a page fails for a reason other than key
    /// exhaustion. Default: false (the first failed page ends the run).
    pub continue_on_page_error: bool,

    /// Marks and timing stamped onto every extracted question.
    pub marking: MarkingScheme,

    /// Course, slot and part stamped onto every persisted record.
    pub placement: QuestionPlacement,

    /// Pre-built backend. If None, a Gemini backend is built from the
    /// fields above.
    pub backend: Option<Arc<dyn VisionBackend>>,

    /// Optional progress callback. Default: None.
    pub progress_callback: Option<Arc<dyn ExtractionProgressCallback>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            temperature: 0.1,
            top_k: 32,
            top_p: 0.9,
            max_output_tokens: 16384,
            request_timeout_secs: 120,
            max_attempts_per_page: None,
            render_scale: 2.0,
            max_rendered_pixels: 4000,
            continue_on_page_error: false,
            marking: MarkingScheme::default(),
            placement: QuestionPlacement::default(),
            backend: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("api_keys", &format_args!("<{} redacted>", self.api_keys.len()))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("top_k", &self.top_k)
            .field("top_p", &self.top_p)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_attempts_per_page", &self.max_attempts_per_page)
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("continue_on_page_error", &self.continue_on_page_error)
            .field("marking", &self.marking)
            .field("placement", &self.placement)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// A fresh key pool for one run.
    pub fn key_pool(&self) -> KeyPool {
        KeyPool::new(&self.api_keys)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    /// Replace the key list.
    pub fn api_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.api_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Append one key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_keys.push(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn top_k(mut self, k: u32) -> Self {
        self.config.top_k = k.max(1);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.top_p = p.clamp(0.0, 1.0);
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn max_attempts_per_page(mut self, n: usize) -> Self {
        self.config.max_attempts_per_page = Some(n);
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn continue_on_page_error(mut self, v: bool) -> Self {
        self.config.continue_on_page_error = v;
        self
    }

    pub fn marking(mut self, marking: MarkingScheme) -> Self {
        self.config.marking = marking;
        self
    }

    pub fn placement(mut self, placement: QuestionPlacement) -> Self {
        self.config.placement = placement;
        self
    }

    pub fn course_id(mut self, id: impl Into<String>) -> Self {
        self.config.placement.course_id = id.into();
        self
    }

    pub fn slot(mut self, slot: impl Into<String>) -> Self {
        self.config.placement.slot = Some(slot.into());
        self
    }

    pub fn part(mut self, part: impl Into<String>) -> Self {
        self.config.placement.part = Some(part.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn VisionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ExtractionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ExtractionConfig, ExtractionError> {
        let pool = KeyPool::new(&self.config.api_keys);
        if pool.is_empty() {
            return Err(ExtractionError::NoApiKeys);
        }
        self.config.api_keys = pool.iter().map(|k| k.expose().to_string()).collect();

        let c = &self.config;
        if c.placement.course_id.trim().is_empty() {
            return Err(ExtractionError::InvalidConfig(
                "A course id is required".into(),
            ));
        }
        if !(0.25..=8.0).contains(&c.render_scale) {
            return Err(ExtractionError::InvalidConfig(format!(
                "Render scale must be 0.25–8, got {}",
                c.render_scale
            )));
        }
        if c.max_attempts_per_page == Some(0) {
            return Err(ExtractionError::InvalidConfig(
                "Max attempts per page must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Batch metadata ───────────────────────────────────────────────────────

/// Marks and timing applied to every question of a batch.
///
/// These are never read back from the model: a batch must be scored
/// consistently even if the model echoes something else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkingScheme {
    /// e.g. `MCQ`, `MSQ`, `NAT`.
    pub question_type: String,
    pub correct_marks: f64,
    pub incorrect_marks: f64,
    pub skipped_marks: f64,
    pub partial_marks: f64,
    pub time_minutes: f64,
}

impl Default for MarkingScheme {
    fn default() -> Self {
        Self {
            question_type: "MCQ".to_string(),
            correct_marks: 4.0,
            incorrect_marks: -1.0,
            skipped_marks: 0.0,
            partial_marks: 0.0,
            time_minutes: 3.0,
        }
    }
}

/// Where persisted questions belong.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPlacement {
    pub course_id: String,
    pub slot: Option<String>,
    pub part: Option<String>,
}
