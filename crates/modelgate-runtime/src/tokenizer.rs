//! Approximate token accounting over a process-wide BPE tokenizer
//!
//! Counts are a heuristic used when a provider omits usage and for local
//! over-length checks. The per-message and per-tool accounting below must
//! stay stable since callers derive cost estimates from it.

use std::sync::OnceLock;

use serde_json::Value;
use tiktoken_rs::CoreBPE;

use crate::convert::messages::{MessageDialect, messages_to_wire};
use crate::types::{PromptMessage, PromptMessageTool};

/// Overhead added for every message
const TOKENS_PER_MESSAGE: usize = 3;
/// Extra token for a message carrying `name`
const TOKENS_PER_NAME: usize = 1;
/// Every reply is primed with the assistant role
const REPLY_PRIMER: usize = 3;
/// Overhead per enum value and per required field in a tool schema
const TOKENS_PER_SCHEMA_ITEM: usize = 3;

type Loader = fn() -> anyhow::Result<CoreBPE>;

/// Lazily constructed tokenizer shared by every caller
///
/// The loader runs at most once even under concurrent first use; later
/// reads take no lock. A failed load is remembered and counting falls back
/// to a byte-length heuristic.
pub struct SharedTokenizer {
    loader: Loader,
    bpe: OnceLock<Option<CoreBPE>>,
}

impl SharedTokenizer {
    pub const fn new(loader: Loader) -> Self {
        Self {
            loader,
            bpe: OnceLock::new(),
        }
    }

    /// Process-wide `cl100k_base` instance
    pub fn global() -> &'static Self {
        static GLOBAL: SharedTokenizer = SharedTokenizer::new(tiktoken_rs::cl100k_base);
        &GLOBAL
    }

    fn bpe(&self) -> Option<&CoreBPE> {
        self.bpe
            .get_or_init(|| match (self.loader)() {
                Ok(bpe) => Some(bpe),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load tokenizer, falling back to length estimate");
                    None
                }
            })
            .as_ref()
    }

    /// Number of tokens in `text`
    pub fn count(&self, text: &str) -> usize {
        self.bpe()
            .map_or_else(|| text.len() / 4, |bpe| bpe.encode_with_special_tokens(text).len())
    }
}

/// Token estimator over a shared tokenizer
#[derive(Clone, Copy)]
pub struct TokenEstimator<'a> {
    tokenizer: &'a SharedTokenizer,
}

impl TokenEstimator<'static> {
    /// Estimator over the process-wide tokenizer
    pub fn shared() -> Self {
        Self::new(SharedTokenizer::global())
    }
}

impl<'a> TokenEstimator<'a> {
    pub const fn new(tokenizer: &'a SharedTokenizer) -> Self {
        Self { tokenizer }
    }

    pub fn count(&self, text: &str) -> usize {
        self.tokenizer.count(text)
    }

    /// Estimate for a prompt, serialized in `dialect`, plus optional tools
    pub fn count_messages(&self, messages: &[PromptMessage], dialect: MessageDialect, tools: &[PromptMessageTool]) -> usize {
        self.count_wire_messages(&messages_to_wire(messages, dialect), dialect, tools)
    }

    /// Estimate for already serialized wire messages
    pub fn count_wire_messages(&self, messages: &[Value], dialect: MessageDialect, tools: &[PromptMessageTool]) -> usize {
        let mut tokens = 0;

        for message in messages.iter().filter_map(Value::as_object) {
            tokens += TOKENS_PER_MESSAGE;
            for (key, value) in message {
                if key == dialect.tool_calls_key {
                    tokens += self.count_tool_calls(value);
                } else {
                    tokens += self.count(&field_text(value));
                }

                if key == "name" {
                    tokens += TOKENS_PER_NAME;
                }
            }
        }

        tokens += REPLY_PRIMER;

        if !tools.is_empty() {
            tokens += self.count_tools(tools);
        }

        tokens
    }

    fn count_tool_calls(&self, calls: &Value) -> usize {
        let mut tokens = 0;
        for call in calls.as_array().into_iter().flatten().filter_map(Value::as_object) {
            for (key, value) in call {
                tokens += self.count(key);
                if key == "function" {
                    for (f_key, f_value) in value.as_object().into_iter().flatten() {
                        tokens += self.count(f_key);
                        tokens += self.count(&value_text(f_value));
                    }
                } else {
                    tokens += self.count(key);
                    tokens += self.count(&value_text(value));
                }
            }
        }
        tokens
    }

    /// Estimate for tool definitions
    pub fn count_tools(&self, tools: &[PromptMessageTool]) -> usize {
        let mut tokens = 0;

        for tool in tools {
            tokens += self.count("type");
            tokens += self.count("function");
            tokens += self.count("function");

            tokens += self.count("name");
            tokens += self.count(&tool.name);
            tokens += self.count("description");
            tokens += self.count(&tool.description);

            let parameters = &tool.parameters;
            tokens += self.count("parameters");
            if let Some(title) = parameters.get("title") {
                tokens += self.count("title");
                tokens += self.count(&value_text(title));
            }
            tokens += self.count("type");
            tokens += self.count(&parameters.get("type").map(value_text).unwrap_or_default());

            if let Some(properties) = parameters.get("properties") {
                tokens += self.count("properties");
                for (key, schema) in properties.as_object().into_iter().flatten() {
                    tokens += self.count(key);
                    for (field_key, field_value) in schema.as_object().into_iter().flatten() {
                        tokens += self.count(field_key);
                        if field_key == "enum" {
                            for item in field_value.as_array().into_iter().flatten() {
                                tokens += TOKENS_PER_SCHEMA_ITEM;
                                tokens += self.count(&value_text(item));
                            }
                        } else {
                            tokens += self.count(field_key);
                            tokens += self.count(&value_text(field_value));
                        }
                    }
                }
            }

            if let Some(required) = parameters.get("required") {
                tokens += self.count("required");
                for field in required.as_array().into_iter().flatten() {
                    tokens += TOKENS_PER_SCHEMA_ITEM;
                    tokens += self.count(&value_text(field));
                }
            }
        }

        tokens
    }
}

impl std::fmt::Debug for TokenEstimator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEstimator").finish_non_exhaustive()
    }
}

/// Countable text of a message field; part lists contribute only their text parts
fn field_text(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect(),
        other => value_text(other),
    }
}

/// Strings count raw, anything else as its JSON text
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
