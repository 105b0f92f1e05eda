//! Groq API Provider
//!
//! This module implements the LLMProvider trait for Groq's
//! OpenAI-compatible chat completions API, including streamed output.

use crate::config::ApiCredential;
use crate::error::{Result, SqlChatError};
use crate::llm::client::{LLMHttpClient, SseDecoder, SseEvent};
use crate::llm::provider::{GenerationParams, LLMProvider, LLMResponse, Message, TokenCallback};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// Groq API base URL
const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Groq API provider
#[derive(Debug)]
pub struct GroqProvider {
    /// Prebuilt headers carrying the API key
    headers: HeaderMap,
    /// Model to use (e.g., "gemma2-9b-it")
    model: String,
    /// HTTP client for making requests
    client: LLMHttpClient,
    /// Chat completions endpoint
    endpoint: String,
}

impl GroqProvider {
    /// Create a new Groq provider
    ///
    /// Fails when the credential cannot be used as a header or the HTTP
    /// client cannot be built.
    pub fn new(credential: &ApiCredential, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(SqlChatError::LlmClient("model identifier is empty".to_string()));
        }

        Ok(Self {
            headers: LLMHttpClient::build_headers(credential.expose())?,
            model,
            client: LLMHttpClient::new("Groq")?,
            endpoint: GROQ_API_BASE.to_string(),
        })
    }

    /// Endpoint requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(
        &self,
        messages: &[Message],
        params: Option<&GenerationParams>,
        stream: bool,
    ) -> GroqRequest {
        let defaults = GenerationParams::default();
        let params = params.unwrap_or(&defaults);

        GroqRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|msg| GroqMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                })
                .collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            stop: params.stop_sequences.clone(),
            stream,
        }
    }

    fn api_error(message: String) -> SqlChatError {
        SqlChatError::LLMApiError {
            provider: "Groq".to_string(),
            message,
            status: 0,
        }
    }
}

/// Build the language model client handed to the agent
pub fn create_client(credential: &ApiCredential, model_id: &str) -> Result<GroqProvider> {
    let provider = GroqProvider::new(credential, model_id)?;
    provider.validate_config()?;
    tracing::info!(model = model_id, key = %credential, "language model client ready");
    Ok(provider)
}

#[async_trait]
impl LLMProvider for GroqProvider {
    /// Generate a response from the Groq API
    async fn generate(
        &self,
        messages: &[Message],
        params: Option<&GenerationParams>,
    ) -> Result<LLMResponse> {
        let request = self.build_request(messages, params, false);
        let response_text = self
            .client
            .post_json(&self.endpoint, self.headers.clone(), &request)
            .await?;

        let groq_response: GroqResponse = serde_json::from_str(&response_text)
            .map_err(|e| Self::api_error(format!("Failed to parse response: {}", e)))?;

        let choice = groq_response.choices.first();
        Ok(LLMResponse {
            content: choice
                .and_then(|c| c.message.content.clone())
                .unwrap_or_default(),
            model: Some(groq_response.model),
            input_tokens: groq_response.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: groq_response.usage.as_ref().map(|u| u.completion_tokens),
            total_tokens: groq_response.usage.as_ref().map(|u| u.total_tokens),
            finish_reason: choice.and_then(|c| c.finish_reason.clone()),
        })
    }

    /// Stream a response, forwarding each content delta
    async fn generate_stream(
        &self,
        messages: &[Message],
        params: Option<&GenerationParams>,
        on_token: TokenCallback<'_>,
    ) -> Result<LLMResponse> {
        let request = self.build_request(messages, params, true);
        let response = self
            .client
            .post_stream(&self.endpoint, self.headers.clone(), &request)
            .await?;

        let mut accumulator = StreamAccumulator::default();
        let mut decoder = SseDecoder::new();
        let mut stream = response.bytes_stream();

        'outer: while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for event in decoder.push(&chunk) {
                if !accumulator.apply(event, on_token)? {
                    break 'outer;
                }
            }
        }
        if let Some(event) = decoder.finish() {
            accumulator.apply(event, on_token)?;
        }

        Ok(accumulator.into_response())
    }

    fn provider_name(&self) -> &str {
        "Groq"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn has_api_key(&self) -> bool {
        self.headers.contains_key(reqwest::header::AUTHORIZATION)
    }
}

/// Collects streamed deltas into a final response
#[derive(Debug, Default)]
struct StreamAccumulator {
    content: String,
    model: Option<String>,
    finish_reason: Option<String>,
    usage: Option<GroqUsage>,
}

impl StreamAccumulator {
    /// Apply one event; returns false once the stream is finished
    fn apply(&mut self, event: SseEvent, on_token: TokenCallback<'_>) -> Result<bool> {
        let data = match event {
            SseEvent::Done => return Ok(false),
            SseEvent::Data(data) => data,
        };

        let chunk: GroqStreamChunk = serde_json::from_str(&data)
            .map_err(|e| GroqProvider::api_error(format!("Failed to parse stream chunk: {}", e)))?;

        if let Some(error) = chunk.error {
            return Err(GroqProvider::api_error(error.message));
        }
        if self.model.is_none() {
            self.model = chunk.model;
        }
        if let Some(usage) = chunk.x_groq.and_then(|x| x.usage).or(chunk.usage) {
            self.usage = Some(usage);
        }
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                on_token(&text);
                self.content.push_str(&text);
            }
            if choice.finish_reason.is_some() {
                self.finish_reason = choice.finish_reason;
            }
        }
        Ok(true)
    }

    fn into_response(self) -> LLMResponse {
        LLMResponse {
            content: self.content,
            input_tokens: self.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: self.usage.as_ref().map(|u| u.completion_tokens),
            total_tokens: self.usage.as_ref().map(|u| u.total_tokens),
            model: self.model,
            finish_reason: self.finish_reason,
        }
    }
}

/// Groq API request format (OpenAI-compatible)
#[derive(Debug, Serialize)]
struct GroqRequest {
    model: String,
    messages: Vec<GroqMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    stream: bool,
}

/// Groq API message format
#[derive(Debug, Serialize, Clone)]
struct GroqMessage {
    role: String,
    content: String,
}

/// Groq API response format (OpenAI-compatible)
#[derive(Debug, Deserialize)]
struct GroqResponse {
    model: String,
    choices: Vec<GroqChoice>,
    usage: Option<GroqUsage>,
}

/// Choice in Groq response
#[derive(Debug, Deserialize, Clone)]
struct GroqChoice {
    message: GroqMessageResponse,
    finish_reason: Option<String>,
}

/// Message in Groq response
#[derive(Debug, Deserialize, Clone)]
struct GroqMessageResponse {
    content: Option<String>,
}

/// Token usage information
#[derive(Debug, Deserialize, Clone)]
struct GroqUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// One `chat.completion.chunk` from a streamed response
#[derive(Debug, Deserialize)]
struct GroqStreamChunk {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<GroqStreamChoice>,
    usage: Option<GroqUsage>,
    x_groq: Option<GroqExtension>,
    error: Option<GroqStreamError>,
}

#[derive(Debug, Deserialize)]
struct GroqStreamChoice {
    #[serde(default)]
    delta: GroqDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GroqDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqExtension {
    usage: Option<GroqUsage>,
}

#[derive(Debug, Deserialize)]
struct GroqStreamError {
    message: String,
}
