//! Gemini summarization client.
//!
//! Builds a styled prompt from page text and makes a single
//! `generateContent` call. No retries, no streaming.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::credentials::Credential;

/// Default cap on the page text sent to the model, in characters
pub const DEFAULT_MAX_CHARS: usize = 20_000;

/// Appended to text cut at the character cap
pub const TRUNCATION_MARKER: &str = "...";

/// Returned when the API answered but produced no candidate text
pub const NO_SUMMARY: &str = "No summary available.";

const GENERIC_API_FAILURE: &str = "API request failed";

#[derive(Error, Debug)]
pub enum ApiError {
    /// Carries no request URL, since the URL holds the API key
    #[error("request to Gemini failed: {0}")]
    Network(reqwest::Error),
    #[error("Gemini rejected the API key: {0}")]
    InvalidKey(String),
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("failed to parse Gemini response: {0}")]
    Malformed(String),
}

impl ApiError {
    fn network(error: reqwest::Error) -> Self {
        Self::Network(error.without_url())
    }
}

/// The summary format the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStyle {
    Brief,
    Detailed,
    BulletPoints,
    Concise,
    /// Anything unrecognised gets the generic prompt
    General,
}

impl SummaryStyle {
    /// Parse a style name; unknown names map to [`SummaryStyle::General`]
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "brief" => Self::Brief,
            "detailed" => Self::Detailed,
            "bullet-points" => Self::BulletPoints,
            "concise" => Self::Concise,
            _ => Self::General,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Brief => "brief",
            Self::Detailed => "detailed",
            Self::BulletPoints => "bullet-points",
            Self::Concise => "concise",
            Self::General => "default",
        }
    }
}

impl FromStr for SummaryStyle {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A request for one summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    pub text: String,
    pub style: SummaryStyle,
}

impl SummaryRequest {
    /// Build a request, truncating `text` to `max_chars` characters
    pub fn new(text: &str, style: SummaryStyle, max_chars: usize) -> Self {
        Self {
            text: truncate(text, max_chars),
            style,
        }
    }

    /// The full prompt sent to the model
    pub fn prompt(&self) -> String {
        let text = &self.text;
        match self.style {
            SummaryStyle::Brief => format!(
                "Provide a brief summary of the following article in 50 words max:\n\n{text}"
            ),
            SummaryStyle::Detailed => format!(
                "Provide a detailed summary of the following article.\n\
                 - Structure the output in multiple short paragraphs.\n\
                 - Each paragraph should focus on a distinct key point or theme.\n\
                 - Ensure all major details are covered clearly.\n\n{text}"
            ),
            SummaryStyle::BulletPoints => format!(
                "Summarize the following article strictly in 5-7 key points.\n\
                 - Each point MUST start with \"- \" (dash and a space).\n\
                 - Leave one blank line after each point.\n\
                 - Do not use asterisks (*) or numbers.\n\n{text}"
            ),
            SummaryStyle::Concise => {
                format!("Summarize the following article in 2-3 sentences:\n\n{text}")
            }
            SummaryStyle::General => format!("Summarize the following article:\n\n{text}"),
        }
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}{}", &text[..end], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Anything that can turn page text into a summary
#[async_trait]
pub trait Summarize: Send + Sync {
    async fn summarize(
        &self,
        text: &str,
        credential: &Credential,
        style: SummaryStyle,
    ) -> Result<String, ApiError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<GeminiErrorInfo>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorInfo {
    #[serde(default)]
    reason: Option<String>,
}

/// Client for the Gemini `generateContent` endpoint
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f64,
    max_chars: usize,
}

impl GeminiClient {
    /// Build a client from the `[gemini]` and `[summary]` config sections
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.gemini.connect_timeout_secs))
            .timeout(Duration::from_secs(config.gemini.request_timeout_secs))
            .build()
            .map_err(ApiError::network)?;

        Ok(Self {
            client,
            base_url: config.gemini.base_url.trim_end_matches('/').to_string(),
            model: config.gemini.model.clone(),
            temperature: config.gemini.temperature,
            max_chars: config.summary.max_chars,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body(&self, prompt: String) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl Summarize for GeminiClient {
    async fn summarize(
        &self,
        text: &str,
        credential: &Credential,
        style: SummaryStyle,
    ) -> Result<String, ApiError> {
        let request = SummaryRequest::new(text, style, self.max_chars);
        let body = self.request_body(request.prompt());

        debug!(
            "Gemini generate_content: model={} style={} chars={}",
            self.model,
            style,
            request.text.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", credential.api_key())])
            .json(&body)
            .send()
            .await
            .map_err(ApiError::network)?;

        let status = response.status();
        let body = response.text().await.map_err(ApiError::network)?;

        if !status.is_success() {
            let error = classify_error(status.as_u16(), &body);
            warn!("Gemini returned {}: {}", status, error);
            return Err(error);
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::Malformed(e.to_string()))?;

        Ok(parsed.first_text().unwrap_or_else(|| NO_SUMMARY.to_string()))
    }
}

/// Turn a non-success response into a typed error
fn classify_error(status: u16, body: &str) -> ApiError {
    let detail = serde_json::from_str::<GeminiError>(body).ok().map(|e| e.error);

    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_API_FAILURE.to_string());

    let key_rejected = matches!(status, 401 | 403)
        || detail.as_ref().is_some_and(|d| {
            matches!(
                d.status.as_deref(),
                Some("PERMISSION_DENIED") | Some("UNAUTHENTICATED")
            ) || d
                .details
                .iter()
                .any(|info| info.reason.as_deref() == Some("API_KEY_INVALID"))
        });

    if key_rejected {
        ApiError::InvalidKey(message)
    } else {
        ApiError::Rejected { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        let mut config = Config::default();
        config.gemini.base_url = server.uri();
        GeminiClient::from_config(&config).unwrap()
    }

    fn key() -> Credential {
        Credential::new("test-key")
    }

    #[test]
    fn style_names_parse() {
        assert_eq!(SummaryStyle::from_name("brief"), SummaryStyle::Brief);
        assert_eq!(SummaryStyle::from_name("detailed"), SummaryStyle::Detailed);
        assert_eq!(SummaryStyle::from_name("bullet-points"), SummaryStyle::BulletPoints);
        assert_eq!("concise".parse::<SummaryStyle>(), Ok(SummaryStyle::Concise));
        assert_eq!(SummaryStyle::from_name(""), SummaryStyle::General);
        assert_eq!(SummaryStyle::from_name("limerick"), SummaryStyle::General);
    }

    #[test]
    fn short_text_passes_through_unchanged() {
        let text = "a".repeat(DEFAULT_MAX_CHARS);
        assert_eq!(truncate(&text, DEFAULT_MAX_CHARS), text);
    }

    #[test]
    fn long_text_is_cut_at_the_character_cap() {
        let text = format!("{}{}", "é".repeat(DEFAULT_MAX_CHARS), "tail");
        let truncated = truncate(&text, DEFAULT_MAX_CHARS);
        assert_eq!(truncated, format!("{}...", "é".repeat(DEFAULT_MAX_CHARS)));
        assert_eq!(truncated.chars().count(), DEFAULT_MAX_CHARS + 3);
    }

    #[test]
    fn prompt_embeds_truncated_text() {
        let request = SummaryRequest::new("abcdef", SummaryStyle::Concise, 3);
        assert_eq!(
            request.prompt(),
            "Summarize the following article in 2-3 sentences:\n\nabc..."
        );
    }

    #[test]
    fn bullet_prompt_requires_dash_points_without_numbers_or_asterisks() {
        let prompt = SummaryRequest::new("Body", SummaryStyle::BulletPoints, 100).prompt();
        assert!(prompt.contains("MUST start with \"- \""));
        assert!(prompt.contains("5-7 key points"));
        assert!(prompt.contains("Do not use asterisks (*) or numbers."));
        assert!(prompt.ends_with("\n\nBody"));
    }

    #[test]
    fn each_style_has_its_own_instruction() {
        let prompt = |style| SummaryRequest::new("X", style, 100).prompt();
        assert!(prompt(SummaryStyle::Brief).contains("50 words max"));
        assert!(prompt(SummaryStyle::Detailed).contains("multiple short paragraphs"));
        assert!(prompt(SummaryStyle::Concise).contains("2-3 sentences"));
        assert_eq!(
            prompt(SummaryStyle::General),
            "Summarize the following article:\n\nX"
        );
    }

    #[test]
    fn request_body_matches_gemini_schema() {
        let client = GeminiClient::from_config(&Config::default()).unwrap();
        let body = serde_json::to_value(client.request_body("P".to_string())).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "contents": [{ "parts": [{ "text": "P" }] }],
                "generationConfig": { "temperature": 0.2 }
            })
        );
    }

    #[tokio::test]
    async fn returns_first_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_json(serde_json::json!({
                "contents": [{ "parts": [{ "text": "Summarize the following article in 2-3 sentences:\n\nHello" }] }],
                "generationConfig": { "temperature": 0.2 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [
                    { "content": { "parts": [{ "text": "First" }, { "text": "ignored" }] } },
                    { "content": { "parts": [{ "text": "Second" }] } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let summary = client_for(&server)
            .summarize("Hello", &key(), SummaryStyle::Concise)
            .await
            .unwrap();
        assert_eq!(summary, "First");
    }

    #[tokio::test]
    async fn missing_candidates_yield_fallback_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "finishReason": "SAFETY" }]
            })))
            .mount(&server)
            .await;

        let summary = client_for(&server)
            .summarize("Hello", &key(), SummaryStyle::Brief)
            .await
            .unwrap();
        assert_eq!(summary, NO_SUMMARY);
    }

    #[tokio::test]
    async fn provider_message_is_surfaced_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .summarize("Hello", &key(), SummaryStyle::Concise)
            .await
            .unwrap_err();
        match err {
            ApiError::Rejected { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "Resource has been exhausted");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_error_body_uses_generic_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .summarize("Hello", &key(), SummaryStyle::Concise)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), GENERIC_API_FAILURE);
    }

    #[tokio::test]
    async fn permission_denied_is_an_invalid_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": { "message": "Permission denied" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .summarize("Hello", &key(), SummaryStyle::Concise)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidKey(ref m) if m == "Permission denied"));
    }

    #[test]
    fn bad_request_with_invalid_key_reason_is_an_invalid_key() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"@type":"type.googleapis.com/google.rpc.ErrorInfo","reason":"API_KEY_INVALID"}]}}"#;
        assert!(matches!(classify_error(400, body), ApiError::InvalidKey(_)));

        let other = r#"{"error":{"code":400,"message":"Bad input","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            classify_error(400, other),
            ApiError::Rejected { status: 400, .. }
        ));
    }

    #[tokio::test]
    async fn key_is_sent_encoded_in_the_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("key", "a&b#c+d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let summary = client_for(&server)
            .summarize("Hello", &Credential::new("a&b#c+d"), SummaryStyle::Concise)
            .await
            .unwrap();
        assert_eq!(summary, "ok");
    }

    #[tokio::test]
    async fn connection_failure_does_not_reveal_the_key() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut config = Config::default();
        config.gemini.base_url = format!("http://127.0.0.1:{port}");
        config.gemini.connect_timeout_secs = 2;
        let client = GeminiClient::from_config(&config).unwrap();

        let err = client
            .summarize("Hello", &Credential::new("SECRET-KEY-123"), SummaryStyle::Concise)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Network(_)));
        let debug = format!("{err:?}");
        assert!(!debug.contains("SECRET-KEY-123"), "{debug}");
        let shown = format!("Summarize failed: {}", crate::error::PipelineError::from(err));
        assert!(!shown.contains("SECRET-KEY-123"), "{shown}");
    }

    #[tokio::test]
    async fn garbage_success_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .summarize("Hello", &key(), SummaryStyle::Concise)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }
}
