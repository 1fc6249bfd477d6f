use std::fmt;
use std::pin::Pin;

use futures_util::Stream;
use serde::{Deserialize, Serialize};

use super::message::{MessageContent, PromptMessage, ToolCall};
use super::tool::PromptMessageTool;
use crate::credentials::Credentials;
use crate::error::LlmError;

/// Opaque model parameters (temperature, `max_tokens`, `top_p`, ...)
pub type ModelParameters = serde_json::Map<String, serde_json::Value>;

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion
    pub completion_tokens: u32,
    /// Total tokens (prompt + completion)
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Build from estimator counts, saturating at `u32::MAX`
    pub fn from_counts(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self::new(
            u32::try_from(prompt_tokens).unwrap_or(u32::MAX),
            u32::try_from(completion_tokens).unwrap_or(u32::MAX),
        )
    }
}

/// Assistant output of one call or one chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.tool_calls.is_empty()
    }
}

impl From<AssistantMessage> for PromptMessage {
    fn from(message: AssistantMessage) -> Self {
        Self::Assistant {
            content: MessageContent::Text(message.content),
            name: None,
            tool_calls: message.tool_calls,
        }
    }
}

/// Terminal result of a non-streaming call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmResult {
    pub model: String,
    pub prompt_messages: Vec<PromptMessage>,
    pub message: AssistantMessage,
    pub usage: Usage,
}

/// One incremental unit of a streamed response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmResultChunk {
    pub model: String,
    /// Emission index, starting at zero
    pub index: u32,
    pub message: AssistantMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Present only on the final chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl LlmResultChunk {
    pub const fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Lazily produced chunk sequence; dropping it closes the connection
pub type LlmResultStream = Pin<Box<dyn Stream<Item = Result<LlmResultChunk, LlmError>> + Send>>;

/// Outcome of [`crate::LargeLanguageModel::invoke`]
pub enum InvokeResult {
    Complete(LlmResult),
    Stream(LlmResultStream),
}

impl fmt::Debug for InvokeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete(result) => f.debug_tuple("Complete").field(result).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Inbound invocation contract
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub model: String,
    pub credentials: Credentials,
    pub prompt_messages: Vec<PromptMessage>,
    pub model_parameters: ModelParameters,
    pub tools: Vec<PromptMessageTool>,
    pub stop: Vec<String>,
    pub stream: bool,
    pub user: Option<String>,
}

impl InvokeRequest {
    pub fn new(model: impl Into<String>, credentials: Credentials, prompt_messages: Vec<PromptMessage>) -> Self {
        Self {
            model: model.into(),
            credentials,
            prompt_messages,
            model_parameters: ModelParameters::new(),
            tools: Vec::new(),
            stop: Vec::new(),
            stream: false,
            user: None,
        }
    }

    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.model_parameters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn parameters(mut self, parameters: ModelParameters) -> Self {
        self.model_parameters.extend(parameters);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: Vec<PromptMessageTool>) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    #[must_use]
    pub const fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

/// Token usage of an embedding call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    pub tokens: u32,
    pub total_tokens: u32,
}

/// Result of [`crate::TextEmbeddingModel::invoke`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextEmbeddingResult {
    pub model: String,
    /// One vector per input text, in input order
    pub embeddings: Vec<Vec<f32>>,
    pub usage: EmbeddingUsage,
}
