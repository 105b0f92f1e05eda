//! LLM HTTP Client
//!
//! This module provides the HTTP client used to reach LLM APIs, plus a
//! small decoder for server-sent event streams. Requests are sent once;
//! failures are reported to the caller without retrying.

use crate::error::{Result, SqlChatError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::Serialize;
use std::time::Duration;

/// Default timeout for HTTP requests (in seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// HTTP client for LLM API requests
#[derive(Clone, Debug)]
pub struct LLMHttpClient {
    /// Reqwest HTTP client
    client: Client,
    /// Provider name used in error messages
    provider: String,
}

impl LLMHttpClient {
    /// Create a new HTTP client with default settings
    pub fn new(provider: impl Into<String>) -> Result<Self> {
        Self::with_timeout(provider, DEFAULT_TIMEOUT_SECS)
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(provider: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SqlChatError::LlmClient(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            provider: provider.into(),
        })
    }

    /// Make a POST request and return the response body
    pub async fn post_json<T: Serialize>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &T,
    ) -> Result<String> {
        let response = self.send(url, headers, body).await?;
        Ok(response.text().await?)
    }

    /// Make a POST request and return the response for streaming
    pub async fn post_stream<T: Serialize>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &T,
    ) -> Result<Response> {
        self.send(url, headers, body).await
    }

    async fn send<T: Serialize>(&self, url: &str, headers: HeaderMap, body: &T) -> Result<Response> {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        Err(SqlChatError::LLMApiError {
            provider: self.provider.clone(),
            message,
            status: status.as_u16(),
        })
    }

    /// Build standard headers for API requests
    ///
    /// Fails when the key cannot be sent as a header value.
    pub fn build_headers(api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| SqlChatError::LlmClient("API key contains invalid characters".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }
}

/// One decoded server-sent event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Contents of a `data:` line
    Data(String),
    /// The `[DONE]` terminator
    Done,
}

/// Splits a byte stream into SSE `data:` payloads
///
/// Network chunks may end mid-line (or mid-character), so incomplete lines
/// are buffered as bytes until the next chunk arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect the complete events it finishes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = Self::parse_line(line.trim_end_matches(['\r', '\n'])) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that had no newline
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        Self::parse_line(String::from_utf8_lossy(&rest).trim())
    }

    fn parse_line(line: &str) -> Option<SseEvent> {
        let payload = line.strip_prefix("data:")?.trim_start();
        if payload == "[DONE]" {
            Some(SseEvent::Done)
        } else if payload.is_empty() {
            None
        } else {
            Some(SseEvent::Data(payload.to_string()))
        }
    }
}
