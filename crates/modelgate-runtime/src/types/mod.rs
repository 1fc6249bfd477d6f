//! Provider-agnostic request, response and schema types

pub mod message;
pub mod result;
pub mod schema;
pub mod tool;

pub use message::{ContentPart, ImageDetail, MessageContent, PromptMessage, Role, ToolCall, ToolCallFunction};
pub use result::{
    AssistantMessage, EmbeddingUsage, InvokeRequest, InvokeResult, LlmResult, LlmResultChunk, LlmResultStream,
    ModelParameters, TextEmbeddingResult, Usage,
};
pub use schema::{AiModelEntity, FetchFrom, I18nObject, ModelFeature, ModelProperties, ParameterRule, PriceConfig};
pub use tool::PromptMessageTool;
