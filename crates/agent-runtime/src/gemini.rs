//! Gemini LLM Provider
//!
//! Implementation of `LlmProvider` for Google's Generative Language API.
//! System messages are folded into the following user turn, since the chat
//! endpoint only knows `user` and `model` roles.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        Completion, CompletionStream, FinishReason, GenerationOptions, LlmProvider, ModelInfo,
        ProviderFactory, ProviderInfo, StreamChunk, TokenUsage,
    },
};
use async_trait::async_trait;
use futures::{future, stream, Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Models offered in the sidebar, in display order
pub const GEMINI_MODELS: [&str; 4] = [
    "gemini-1.5-pro",
    "gemini-1.5-flash",
    "gemini-2.0-flash-lite",
    "gemini-2.0-flash",
];

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini provider configuration
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API root, without the version segment
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: 120,
        }
    }
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("GEMINI_API_BASE")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(120);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<RemoteModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteModel {
    name: String,
    display_name: Option<String>,
    input_token_limit: Option<u32>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl UsageMetadata {
    fn to_usage(&self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_token_count,
            completion_tokens: self.candidates_token_count,
            total_tokens: self.total_token_count,
        }
    }
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    fn finish_reason(&self) -> Option<FinishReason> {
        let reason = self.candidates.first()?.finish_reason.as_deref()?;
        Some(match reason {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
                FinishReason::ContentFilter
            }
            _ => FinishReason::Error,
        })
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Gemini LLM provider bound to one API key
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

impl GeminiProvider {
    /// Create a provider with its own HTTP client
    pub fn new(api_key: impl Into<String>, config: GeminiConfig) -> Result<Self> {
        Ok(Self::with_client(build_client(&config)?, api_key, config))
    }

    /// Create a provider sharing an existing HTTP client
    pub fn with_client(client: Client, api_key: impl Into<String>, config: GeminiConfig) -> Self {
        Self {
            client,
            config,
            api_key: api_key.into(),
        }
    }

    fn model_path(model: &str) -> &str {
        model.strip_prefix("models/").unwrap_or(model)
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.base_url,
            Self::model_path(model),
            method
        )
    }

    /// Convert agent messages to Gemini contents
    fn convert_messages(messages: &[Message]) -> Vec<Content> {
        let mut contents: Vec<Content> = Vec::new();
        let mut pending_system: Vec<&str> = Vec::new();

        for message in messages {
            let role = match message.role {
                Role::System => {
                    pending_system.push(&message.content);
                    continue;
                }
                Role::User => "user",
                Role::Assistant => "model",
            };

            let mut text = String::new();
            if role == "user" && !pending_system.is_empty() {
                text.push_str(&pending_system.join("\n\n"));
                text.push_str("\n\n");
                pending_system.clear();
            }
            text.push_str(&message.content);

            // Consecutive turns from the same side are merged
            match contents.last_mut() {
                Some(last) if last.role.as_deref() == Some(role) => {
                    last.parts.push(Part { text: Some(text) });
                }
                _ => contents.push(Content {
                    role: Some(role.into()),
                    parts: vec![Part { text: Some(text) }],
                }),
            }
        }

        // A trailing system message still has to reach the model
        if !pending_system.is_empty() {
            contents.push(Content {
                role: Some("user".into()),
                parts: vec![Part {
                    text: Some(pending_system.join("\n\n")),
                }],
            });
        }

        contents
    }

    fn build_request(messages: &[Message], opts: &GenerationOptions) -> GenerateRequest {
        GenerateRequest {
            contents: Self::convert_messages(messages),
            generation_config: GenerationConfig {
                temperature: opts.temperature,
                top_p: opts.top_p,
                max_output_tokens: opts.max_tokens,
                stop_sequences: opts.stop_sequences.clone(),
            },
        }
    }

    /// Convert a Gemini response to an agent completion
    fn convert_completion(response: &GenerateResponse, model: &str) -> Result<Completion> {
        if response.candidates.is_empty() {
            let reason = response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone());
            return Err(AgentError::Provider(match reason {
                Some(reason) => format!("Prompt blocked by Gemini: {reason}"),
                None => "Gemini returned no candidates".into(),
            }));
        }

        Ok(Completion {
            content: response.text(),
            model: model.to_string(),
            usage: response.usage_metadata.as_ref().map(UsageMetadata::to_usage),
            finish_reason: response.finish_reason(),
        })
    }

    async fn post(&self, url: &str, body: &GenerateRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        check_status(response).await
    }
}

fn build_client(config: &GeminiConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| AgentError::Config(format!("HTTP client: {e}")))
}

fn map_transport_error(e: reqwest::Error) -> AgentError {
    if e.is_timeout() || e.is_connect() {
        AgentError::ProviderUnavailable(e.to_string())
    } else {
        AgentError::Provider(e.to_string())
    }
}

/// Map a non-success response to an agent error
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status, &body))
}

fn classify_error(status: StatusCode, body: &str) -> AgentError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| match e.error.status {
            Some(code) => format!("{code}: {}", e.error.message),
            None => e.error.message,
        })
        .unwrap_or_else(|_| format!("HTTP {status}"));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(message),
        StatusCode::BAD_REQUEST if body.contains("API_KEY_INVALID") => AgentError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(message),
        s if s.is_server_error() => AgentError::ProviderUnavailable(message),
        _ => AgentError::Provider(message),
    }
}

/// Pull complete `data:` lines out of `buffer`, leaving any partial line.
///
/// Lines are decoded only once whole, so a character split across network
/// reads stays intact.
fn drain_sse_events(buffer: &mut Vec<u8>) -> Vec<Result<StreamChunk>> {
    let mut chunks = Vec::new();

    while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=line_end).collect();
        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line.trim(),
            Err(e) => {
                chunks.push(Err(AgentError::Provider(format!("Stream is not UTF-8: {e}"))));
                continue;
            }
        };

        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };

        match serde_json::from_str::<GenerateResponse>(data.trim()) {
            Ok(event) => chunks.push(Ok(StreamChunk {
                delta: event.text(),
                done: event.finish_reason().is_some(),
                usage: event.usage_metadata.as_ref().map(UsageMetadata::to_usage),
            })),
            Err(e) => chunks.push(Err(AgentError::Provider(format!(
                "Malformed stream event: {e}"
            )))),
        }
    }

    chunks
}

/// SSE body bytes to completion chunks
fn decode_sse<S, B, E>(body: S) -> impl Stream<Item = Result<StreamChunk>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    body.scan(Vec::new(), |buffer, result| {
        let events = match result {
            Ok(bytes) => {
                buffer.extend_from_slice(bytes.as_ref());
                drain_sse_events(buffer)
            }
            Err(e) => vec![Err(AgentError::Provider(e.to_string()))],
        };
        future::ready(Some(stream::iter(events)))
    })
    .flatten()
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();

        Ok(ProviderInfo {
            name: "Gemini".into(),
            models,
            supports_streaming: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Gemini health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = Self::build_request(messages, options);
        let url = self.endpoint(&options.model, "generateContent");

        let response: GenerateResponse = self
            .post(&url, &request)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        Self::convert_completion(&response, &options.model)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let request = Self::build_request(messages, options);
        let url = format!("{}?alt=sse", self.endpoint(&options.model, "streamGenerateContent"));

        let response = self.post(&url, &request).await?;

        Ok(Box::pin(decode_sse(response.bytes_stream())))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/v1beta/models?pageSize=100", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        let list: ModelList = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        Ok(list
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods.is_empty()
                    || m.supported_generation_methods.iter().any(|g| g == "generateContent")
            })
            .map(|m| {
                let id = Self::model_path(&m.name).to_string();
                ModelInfo {
                    name: m.display_name.unwrap_or_else(|| id.clone()),
                    id,
                    context_length: m.input_token_limit,
                }
            })
            .collect())
    }
}

/// Builds a `GeminiProvider` per API key over one shared HTTP client
pub struct GeminiProviderFactory {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProviderFactory {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(&config)?,
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env())
    }
}

impl ProviderFactory for GeminiProviderFactory {
    fn create(&self, api_key: &str) -> Arc<dyn LlmProvider> {
        Arc::new(GeminiProvider::with_client(
            self.client.clone(),
            api_key,
            self.config.clone(),
        ))
    }
}
