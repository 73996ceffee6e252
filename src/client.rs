//! Extraction client: one page image in, typed questions out.
//!
//! ## Attempt loop
//!
//! ```text
//! for attempt in 1..=budget:
//!     key  ← pool.next()            (exhausted → KeysExhausted)
//!     text ← backend.generate(key)  (error → retire key, try next)
//!     json ← first '[' … last ']'   (missing/invalid → retire key, try next)
//!     return questions              (marks stamped from config)
//! → ExtractionFailed(last cause)
//! ```
//!
//! `budget` is the pool size, optionally lowered by
//! [`ExtractionConfig::max_attempts_per_page`](crate::config::ExtractionConfig).
//! There is no backoff: every retry goes out with a different credential.
//!
//! A malformed reply retires the key that produced it. That is harsh for a
//! one-off bad generation but keeps the run bounded: no key is ever retried
//! within a run, so a page costs at most `budget` requests.

use crate::backend::VisionBackend;
use crate::config::MarkingScheme;
use crate::error::{ClientError, ServiceError};
use crate::keys::{KeyPool, PoolState};
use crate::pipeline::encode::PageImage;
use crate::prompts::EXTRACTION_PROMPT;
use crate::question::{ExtractedQuestion, RawQuestion};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Greedy: from the first `[` to the last `]`, across lines.
static RE_JSON_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

/// Drives one [`VisionBackend`] through a [`KeyPool`] for a whole run.
pub struct ExtractionClient {
    backend: Arc<dyn VisionBackend>,
    pool: KeyPool,
    state: PoolState,
    max_attempts: Option<usize>,
}

impl ExtractionClient {
    pub fn new(backend: Arc<dyn VisionBackend>, pool: KeyPool) -> Self {
        Self {
            backend,
            pool,
            state: PoolState::default(),
            max_attempts: None,
        }
    }

    /// Resume from a previously captured pool state.
    pub fn with_state(mut self, state: PoolState) -> Self {
        self.state = state;
        self
    }

    /// Cap attempts per page below the pool size.
    pub fn with_max_attempts(mut self, max: Option<usize>) -> Self {
        self.max_attempts = max;
        self
    }

    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    pub fn pool_state(&self) -> &PoolState {
        &self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.pool.is_exhausted(&self.state)
    }

    fn budget(&self) -> usize {
        match self.max_attempts {
            Some(cap) => self.pool.len().min(cap),
            None => self.pool.len(),
        }
    }

    /// Extract every question on `page`.
    pub async fn extract(
        &mut self,
        page: &PageImage,
        marking: &MarkingScheme,
    ) -> Result<Vec<ExtractedQuestion>, ClientError> {
        let budget = self.budget();
        let mut last_error: Option<ServiceError> = None;
        let mut attempts = 0;

        while attempts < budget {
            let (index, key, next_state) = match self.pool.next(&self.state) {
                Ok((lease, next)) => (lease.index, lease.key.clone(), next),
                Err(exhausted) => {
                    warn!(page = page.page_num, "No active API key left");
                    return Err(ClientError::KeysExhausted {
                        total: exhausted.total,
                    });
                }
            };
            self.state = next_state;
            attempts += 1;
            debug!(
                page = page.page_num,
                key_index = index,
                attempt = attempts,
                backend = self.backend.name(),
                "Requesting extraction"
            );

            let outcome = match self
                .backend
                .generate(&key, EXTRACTION_PROMPT, page)
                .await
            {
                Ok(text) => parse_questions(&text, marking),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(questions) => {
                    info!(
                        page = page.page_num,
                        key_index = index,
                        questions = questions.len(),
                        "Page extracted"
                    );
                    return Ok(questions);
                }
                Err(e) => {
                    warn!(
                        page = page.page_num,
                        key_index = index,
                        "Attempt {attempts}/{budget} failed, retiring key: {e}"
                    );
                    self.state = self.pool.mark_failed_at(&self.state, index);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(cause) => Err(ClientError::ExtractionFailed { attempts, cause }),
            // Zero budget: an empty pool.
            None => Err(ClientError::KeysExhausted {
                total: self.pool.len(),
            }),
        }
    }
}

/// Find the JSON array in a model reply and map it to questions.
pub fn parse_questions(
    text: &str,
    marking: &MarkingScheme,
) -> Result<Vec<ExtractedQuestion>, ServiceError> {
    let span = RE_JSON_ARRAY
        .find(text)
        .ok_or(ServiceError::NoJsonArray)?
        .as_str();
    let raw: Vec<RawQuestion> =
        serde_json::from_str(span).map_err(|e| ServiceError::MalformedJson(e.to_string()))?;
    Ok(raw
        .into_iter()
        .map(|q| ExtractedQuestion::from_raw(q, marking))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ApiKey;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records which key each call used.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, ServiceError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, ServiceError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VisionBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            key: &ApiKey,
            _prompt: &str,
            _page: &PageImage,
        ) -> Result<String, ServiceError> {
            self.calls.lock().unwrap().push(key.expose().to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ServiceError::Transport("script ended".into())))
        }
    }

    fn page() -> PageImage {
        PageImage::from_png_bytes(1, b"png")
    }

    fn ok(text: &str) -> Result<String, ServiceError> {
        Ok(text.to_string())
    }

    #[tokio::test]
    async fn first_success_returns_questions() {
        let backend = Scripted::new(vec![ok(
            "Here you go:\n```json\n[{\"question_statement\":\"Q1\",\"options\":[\"a\",\"b\"]}]\n```",
        )]);
        let mut client = ExtractionClient::new(backend.clone(), KeyPool::new(["k1", "k2"]));
        let qs = client.extract(&page(), &MarkingScheme::default()).await.unwrap();
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].question_statement, "Q1");
        assert_eq!(qs[0].correct_marks, 4.0);
        assert_eq!(backend.calls(), vec!["k1"]);
        assert_eq!(client.pool_state().failed_count(), 0);
    }

    #[tokio::test]
    async fn failures_rotate_to_next_key_and_retire_the_failed_one() {
        let backend = Scripted::new(vec![
            Err(ServiceError::Status {
                status: 429,
                body: "quota".into(),
            }),
            ok("no array here"),
            ok("[]"),
        ]);
        let mut client = ExtractionClient::new(backend.clone(), KeyPool::new(["k1", "k2", "k3"]));
        let qs = client.extract(&page(), &MarkingScheme::default()).await.unwrap();
        assert!(qs.is_empty());
        assert_eq!(backend.calls(), vec!["k1", "k2", "k3"]);
        assert!(client.pool_state().is_failed(0));
        assert!(client.pool_state().is_failed(1));
        assert!(!client.pool_state().is_failed(2));
    }

    #[tokio::test]
    async fn all_attempts_failing_reports_last_cause() {
        let backend = Scripted::new(vec![
            Err(ServiceError::Timeout { secs: 1 }),
            ok("[{\"question_statement\": }]"),
        ]);
        let mut client = ExtractionClient::new(backend, KeyPool::new(["k1", "k2"]));
        match client.extract(&page(), &MarkingScheme::default()).await {
            Err(ClientError::ExtractionFailed { attempts, cause }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(cause, ServiceError::MalformedJson(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(client.is_exhausted());
    }

    #[tokio::test]
    async fn exhausted_pool_fails_without_calling_backend() {
        let backend = Scripted::new(vec![ok("[]")]);
        let pool = KeyPool::new(["k1", "k2"]);
        let state = pool.mark_failed_at(&pool.mark_failed_at(&PoolState::default(), 0), 1);
        let mut client = ExtractionClient::new(backend.clone(), pool).with_state(state);
        let err = client.extract(&page(), &MarkingScheme::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::KeysExhausted { total: 2 }));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn keys_failed_on_earlier_page_lead_to_exhaustion_midway() {
        let backend = Scripted::new(vec![
            Err(ServiceError::Transport("reset".into())),
            Err(ServiceError::Transport("reset".into())),
        ]);
        let pool = KeyPool::new(["k1", "k2", "k3"]);
        let state = pool.mark_failed_at(&PoolState::default(), 2);
        let mut client = ExtractionClient::new(backend.clone(), pool).with_state(state);
        let err = client.extract(&page(), &MarkingScheme::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::KeysExhausted { total: 3 }));
        assert_eq!(backend.calls(), vec!["k1", "k2"]);
    }

    #[tokio::test]
    async fn attempt_cap_limits_requests() {
        let backend = Scripted::new(vec![
            Err(ServiceError::NoJsonArray),
            Err(ServiceError::NoJsonArray),
        ]);
        let mut client = ExtractionClient::new(backend.clone(), KeyPool::new(["a", "b", "c"]))
            .with_max_attempts(Some(1));
        let err = client.extract(&page(), &MarkingScheme::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::ExtractionFailed { attempts: 1, .. }));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn rotation_continues_across_pages() {
        let backend = Scripted::new(vec![ok("[]"), ok("[]"), ok("[]")]);
        let mut client = ExtractionClient::new(backend.clone(), KeyPool::new(["a", "b"]));
        for _ in 0..3 {
            client.extract(&page(), &MarkingScheme::default()).await.unwrap();
        }
        assert_eq!(backend.calls(), vec!["a", "b", "a"]);
    }

    #[test]
    fn parse_uses_greedy_array_span() {
        let text = "prefix [{\"question_statement\":\"x [1]\"}] suffix";
        let qs = parse_questions(text, &MarkingScheme::default()).unwrap();
        assert_eq!(qs[0].question_statement, "x [1]");
    }

    #[test]
    fn parse_rejects_missing_statement() {
        let err = parse_questions("[{\"options\":[]}]", &MarkingScheme::default()).unwrap_err();
        assert!(matches!(err, ServiceError::MalformedJson(_)));
    }
}
