//! LLM Provider Trait
//!
//! This module defines the trait-based abstraction for LLM providers used
//! by the query agent, along with the message and parameter types.

use crate::error::{Result, SqlChatError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// LLM message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (sets behavior/context)
    System,
    /// User message (query or input)
    User,
    /// Assistant message (response)
    Assistant,
}

impl MessageRole {
    /// Wire name used by OpenAI-compatible APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// LLM message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: MessageRole,
    /// Message content
    pub content: String,
}

impl Message {
    /// The agent sends each step as a single user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// LLM response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Generated text content
    pub content: String,
    /// Number of tokens used (input)
    pub input_tokens: Option<u32>,
    /// Number of tokens used (output)
    pub output_tokens: Option<u32>,
    /// Total tokens used
    pub total_tokens: Option<u32>,
    /// Model used for generation
    pub model: Option<String>,
    /// Finish reason (e.g., "stop", "length")
    pub finish_reason: Option<String>,
}

impl LLMResponse {
    /// Create a new response
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Get total token count if available
    pub fn get_total_tokens(&self) -> Option<u32> {
        self.total_tokens.or_else(|| {
            self.input_tokens
                .and_then(|input| self.output_tokens.map(|output| input + output))
        })
    }
}

/// LLM generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 1.0, higher = more random)
    pub temperature: Option<f32>,
    /// Top-p sampling (0.0 - 1.0)
    pub top_p: Option<f32>,
    /// Stop sequences
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: Some(1024),
            temperature: Some(0.0),
            top_p: None,
            stop_sequences: None,
        }
    }
}

impl GenerationParams {
    /// Create new default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop generating at any of these sequences
    pub fn with_stop(mut self, stop: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.stop_sequences = Some(stop.into_iter().map(Into::into).collect());
        self
    }
}

/// Receives text fragments as a streamed response arrives
pub type TokenCallback<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Trait for LLM providers
///
/// This trait defines the interface the agent uses to talk to a model.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a complete response
    async fn generate(
        &self,
        messages: &[Message],
        params: Option<&GenerationParams>,
    ) -> Result<LLMResponse>;

    /// Generate a response, reporting each fragment as it arrives
    ///
    /// The default implementation reports the whole response as one fragment.
    async fn generate_stream(
        &self,
        messages: &[Message],
        params: Option<&GenerationParams>,
        on_token: TokenCallback<'_>,
    ) -> Result<LLMResponse> {
        let response = self.generate(messages, params).await?;
        on_token(&response.content);
        Ok(response)
    }

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Model identifier requests are sent with
    fn model(&self) -> &str;

    /// Check if the provider has an API key configured
    fn has_api_key(&self) -> bool;

    /// Validate the provider configuration
    fn validate_config(&self) -> Result<()> {
        if !self.has_api_key() {
            return Err(SqlChatError::LlmClient(format!(
                "{} API key is missing",
                self.provider_name()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Canned(&'static str);

    #[async_trait]
    impl LLMProvider for Canned {
        async fn generate(
            &self,
            _messages: &[Message],
            _params: Option<&GenerationParams>,
        ) -> Result<LLMResponse> {
            Ok(LLMResponse::new(self.0))
        }

        fn provider_name(&self) -> &str {
            "Canned"
        }

        fn model(&self) -> &str {
            "canned-1"
        }

        fn has_api_key(&self) -> bool {
            !self.0.is_empty()
        }
    }

    #[test]
    fn test_user_message_wire_format() {
        let json = serde_json::to_value(Message::user("u")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(MessageRole::Assistant.as_str(), "assistant");
    }

    #[test]
    fn test_generation_params_defaults() {
        let params = GenerationParams::new().with_stop(["\nObservation:"]);

        assert_eq!(params.max_tokens, Some(1024));
        assert_eq!(params.temperature, Some(0.0));
        assert_eq!(params.stop_sequences, Some(vec!["\nObservation:".to_string()]));
    }

    #[test]
    fn test_llm_response_tokens() {
        let response = LLMResponse {
            input_tokens: Some(10),
            output_tokens: Some(5),
            ..LLMResponse::new("Test")
        };
        assert_eq!(response.get_total_tokens(), Some(15));
    }

    #[tokio::test]
    async fn test_default_stream_emits_whole_content() {
        let seen = Mutex::new(Vec::new());
        let on_token = |t: &str| seen.lock().unwrap().push(t.to_string());

        let response = Canned("hello")
            .generate_stream(&[Message::user("hi")], None, &on_token)
            .await
            .unwrap();

        assert_eq!(response.content, "hello");
        assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_validate_config() {
        assert!(Canned("x").validate_config().is_ok());
        assert!(matches!(
            Canned("").validate_config(),
            Err(SqlChatError::LlmClient(_))
        ));
    }
}
