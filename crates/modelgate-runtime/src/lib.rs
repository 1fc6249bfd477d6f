//! Model invocation runtime for `OpenAI`-shaped providers
//!
//! Normalizes prompt messages, token estimates, errors and streaming
//! responses across `OpenAI`-compatible endpoints, Azure `OpenAI` deployments
//! and the Tuya gateway dialect.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod catalog;
pub mod convert;
pub mod credentials;
pub mod error;
pub mod provider;
pub mod stream;
pub mod tokenizer;
pub mod types;

pub use credentials::Credentials;
pub use error::{ErrorMapping, InvokeErrorKind, LlmError, NativeError, NativeErrorClass};
pub use provider::embedding::TextEmbeddingModel;
pub use provider::llm::LargeLanguageModel;
pub use tokenizer::TokenEstimator;
pub use types::{
    AssistantMessage, ContentPart, InvokeRequest, InvokeResult, LlmResult, LlmResultChunk, LlmResultStream,
    MessageContent, PromptMessage, PromptMessageTool, Usage,
};
