//! Gemini REST implementation of [`SiteGenerator`].
//!
//! One `generateContent` call per generation, no retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::request::{build_request, RequestOptions};
use crate::response::parse_site;
use crate::{
    Attachment, ClientError, GeneratedSite, ModelErrorKind, SiteGenerator,
    INVALID_CREDENTIAL_MARKER,
};

/// Default model used for generation.
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

/// Default REST endpoint prefix.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    options: RequestOptions,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a client for `model` authenticated with `api_key`.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            options: RequestOptions::default(),
        }
    }

    /// Overrides the endpoint prefix (used for proxies and tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides request options such as the thinking budget.
    #[must_use]
    pub const fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Applies a whole-request timeout.
    ///
    /// Without one the transport defaults apply.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        match Client::builder().timeout(timeout).build() {
            Ok(client) => self.client = client,
            Err(e) => warn!(error = %e, "Failed to build HTTP client with timeout, keeping default"),
        }
        self
    }

    /// Returns the model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl SiteGenerator for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        prior: Option<&GeneratedSite>,
        attachments: &[Attachment],
    ) -> Result<GeneratedSite, ClientError> {
        let body = build_request(prompt, prior, attachments, self.options);

        info!(
            model = %self.model,
            refine = prior.is_some(),
            attachments = attachments.len(),
            "Sending generation request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ClientError::model(
                    ModelErrorKind::Network,
                    None,
                    format!("request to model service failed: {e}"),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, &body));
        }

        let raw = response.text().await.map_err(|e| {
            ClientError::model(
                ModelErrorKind::Network,
                Some(status.as_u16()),
                format!("failed to read model response: {e}"),
            )
        })?;

        let text = extract_text(decode_envelope(raw)?)?;
        debug!(length = text.len(), "Received model response");
        parse_site(&text)
    }
}

// ============================================================================
// Response envelope
// ============================================================================

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Concatenates the non-thought text parts of the first candidate.
/// Decodes the response envelope, keeping the raw body on failure.
fn decode_envelope(raw: String) -> Result<GenerateContentResponse, ClientError> {
    match serde_json::from_str(&raw) {
        Ok(envelope) => Ok(envelope),
        Err(e) => {
            error!(error = %e, raw = %raw, "Model response envelope is not valid JSON");
            Err(ClientError::parse(
                format!("unexpected response envelope: {e}"),
                raw,
            ))
        }
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ClientError> {
    let text: String = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ClientError::parse(
            "model returned no text in the response candidates",
            text,
        ));
    }
    Ok(text)
}

/// Maps a non-success HTTP answer to a [`ClientError::Model`].
fn map_http_error(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorWrapper>(body).map_or_else(
        |_| body.to_string(),
        |wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        },
    );

    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelErrorKind::Authentication,
        StatusCode::NOT_FOUND if message.contains(INVALID_CREDENTIAL_MARKER) => {
            ModelErrorKind::Authentication
        }
        StatusCode::TOO_MANY_REQUESTS => ModelErrorKind::RateLimit,
        s if s.is_server_error() => ModelErrorKind::Server,
        _ => ModelErrorKind::Other,
    };

    warn!(status = status.as_u16(), kind = %kind, "Model service returned an error");
    ClientError::model(kind, Some(status.as_u16()), message)
}
