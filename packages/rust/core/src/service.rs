//! External text-transformation service.
//!
//! [`TransformService`] is the seam the enrichment coordinator calls through;
//! [`MessagesService`] implements it against an Anthropic-style messages API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use galleryforge_shared::{CandidateArtifact, FailureReason, GalleryError, Result, ServiceConfig};

use crate::prompt::render_prompt;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Request payload for one enrichment call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentRequest {
    pub source_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub origin_location: String,
    pub body: String,
}

impl From<&CandidateArtifact> for EnrichmentRequest {
    fn from(artifact: &CandidateArtifact) -> Self {
        Self {
            source_name: artifact.source_name.clone(),
            title: artifact.title.clone(),
            description: artifact.description.clone(),
            category: artifact.category.as_str().to_string(),
            origin_location: artifact.origin_location.clone(),
            body: artifact.body.clone(),
        }
    }
}

/// Turns a request into the service's free-form reply text.
#[async_trait]
pub trait TransformService: Send + Sync {
    async fn transform(&self, request: &EnrichmentRequest) -> std::result::Result<String, FailureReason>;
}

// ---------------------------------------------------------------------------
// Messages API client
// ---------------------------------------------------------------------------

/// Client for an Anthropic-style `/v1/messages` endpoint.
pub struct MessagesService {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    headers: HeaderMap,
}

impl MessagesService {
    pub fn new(config: &ServiceConfig, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|_| GalleryError::config("API key contains invalid header characters"))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GalleryError::Enrichment(format!("failed to build service client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout,
            headers,
        })
    }
}

#[async_trait]
impl TransformService for MessagesService {
    async fn transform(&self, request: &EnrichmentRequest) -> std::result::Result<String, FailureReason> {
        let prompt = render_prompt(request);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user",
                content: vec![ContentBlock {
                    kind: "text",
                    text: &prompt,
                }],
            }],
        };

        debug!(title = %request.title, model = %self.model, "calling transformation service");

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FailureReason::Timeout(self.timeout)
                } else {
                    FailureReason::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(FailureReason::Service {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| FailureReason::Unparseable(format!("invalid response envelope: {e}")))?;

        let text = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(FailureReason::Unparseable("reply has no text content".into()));
        }
        Ok(text)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
struct ContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}
