//! Vision backends: send one page image plus the instruction, get text back.
//!
//! [`VisionBackend`] is the seam between the extraction client and the
//! network. The client owns key rotation and response parsing; a backend
//! only performs one authenticated request with the key it is handed and
//! classifies what went wrong. Tests swap in a scripted backend.

use crate::config::ExtractionConfig;
use crate::error::{ExtractionError, ServiceError};
use crate::keys::ApiKey;
use crate::pipeline::encode::PageImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Longest error body kept in a [`ServiceError::Status`].
const MAX_ERROR_BODY: usize = 2000;

#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Short name for logs and errors.
    fn name(&self) -> &str;

    /// Submit `prompt` and `page` using `key`; return the model's text payload.
    async fn generate(
        &self,
        key: &ApiKey,
        prompt: &str,
        page: &PageImage,
    ) -> Result<String, ServiceError>;
}

/// Sampling parameters sent as `generationConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_k: 32,
            top_p: 0.9,
            max_output_tokens: 16384,
        }
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn build_request<'a>(
    prompt: &'a str,
    page: &'a PageImage,
    generation: GenerationSettings,
) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![RequestContent {
            parts: vec![
                RequestPart::Text { text: prompt },
                RequestPart::Image {
                    inline_data: InlineData {
                        mime_type: &page.mime_type,
                        data: &page.data,
                    },
                },
            ],
        }],
        generation_config: generation,
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
fn parse_envelope(body: &str) -> Result<String, ServiceError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::MalformedEnvelope(format!("not JSON: {e}")))?;
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| ServiceError::MalformedEnvelope("no candidate content".into()))?;
    content
        .parts
        .into_iter()
        .next()
        .and_then(|p| p.text)
        .ok_or_else(|| ServiceError::MalformedEnvelope("first part has no text".into()))
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

// ── Gemini ───────────────────────────────────────────────────────────────

/// Google Gemini `generateContent` over HTTPS.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    generation: GenerationSettings,
    timeout_secs: u64,
}

impl GeminiBackend {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        generation: GenerationSettings,
        timeout_secs: u64,
    ) -> Result<Self, ExtractionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractionError::BackendInit {
                backend: "gemini".into(),
                detail: e.to_string(),
            })?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            generation,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            GenerationSettings {
                temperature: config.temperature,
                top_k: config.top_k,
                top_p: config.top_p,
                max_output_tokens: config.max_output_tokens,
            },
            config.request_timeout_secs,
        )
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl VisionBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        key: &ApiKey,
        prompt: &str,
        page: &PageImage,
    ) -> Result<String, ServiceError> {
        let request = build_request(prompt, page, self.generation);
        debug!(page = page.page_num, model = %self.model, "POST generateContent");

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }
        parse_envelope(&body)
    }
}

impl GeminiBackend {
    fn classify(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page() -> PageImage {
        PageImage {
            page_num: 3,
            mime_type: "image/png".into(),
            data: "iVBORw0KGgo=".into(),
        }
    }

    #[test]
    fn request_body_matches_generate_content_shape() {
        let p = page();
        let body = serde_json::to_value(build_request("PROMPT", &p, GenerationSettings::default()))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{
                    "parts": [
                        {"text": "PROMPT"},
                        {"inline_data": {"mime_type": "image/png", "data": "iVBORw0KGgo="}}
                    ]
                }],
                "generationConfig": {
                    "temperature": 0.1f32,
                    "topK": 32,
                    "topP": 0.9f32,
                    "maxOutputTokens": 16384
                }
            })
        );
    }

    #[test]
    fn envelope_text_is_extracted() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"[{\"question_statement\":\"Q\"}]"}]}}]}"#;
        assert_eq!(parse_envelope(body).unwrap(), r#"[{"question_statement":"Q"}]"#);
    }

    #[test]
    fn envelope_without_candidates_is_malformed() {
        for body in [
            "{}",
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            "<html>",
        ] {
            assert!(
                matches!(parse_envelope(body), Err(ServiceError::MalformedEnvelope(_))),
                "{body}"
            );
        }
    }

    #[test]
    fn long_error_bodies_are_truncated_on_char_boundary() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate_body(body);
        assert!(cut.len() <= MAX_ERROR_BODY + '…'.len_utf8());
        assert!(cut.ends_with('…'));
        assert_eq!(truncate_body("short".into()), "short");
    }

    #[test]
    fn url_joins_endpoint_and_model() {
        let b = GeminiBackend::new(
            "https://example.test/v1beta/",
            "gemini-x",
            GenerationSettings::default(),
            5,
        )
        .unwrap();
        assert_eq!(b.url(), "https://example.test/v1beta/models/gemini-x:generateContent");
        assert_eq!(b.name(), "gemini");
    }
}
