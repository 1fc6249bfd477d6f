use serde_json::{Map, Value, json};

use crate::types::{ContentPart, MessageContent, PromptMessage, PromptMessageTool, ToolCall};

/// Field names that differ between wire dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDialect {
    /// Key holding an assistant message's tool-call list
    pub tool_calls_key: &'static str,
    /// Key holding a tool message's back-reference
    pub tool_call_id_key: &'static str,
}

impl MessageDialect {
    /// Standard `OpenAI` chat dialect
    pub const OPENAI: Self = Self {
        tool_calls_key: "tool_calls",
        tool_call_id_key: "tool_call_id",
    };

    /// Camel-cased dialect spoken by compatible gateways
    pub const GATEWAY: Self = Self {
        tool_calls_key: "toolCalls",
        tool_call_id_key: "toolCallId",
    };
}

/// Wire object for one prompt message
pub fn message_to_wire(message: &PromptMessage, dialect: MessageDialect) -> Map<String, Value> {
    let mut wire = Map::new();
    wire.insert("role".to_owned(), Value::from(message.role().as_str()));

    match message {
        PromptMessage::User { content, .. } => {
            wire.insert("content".to_owned(), user_content(content));
        }
        PromptMessage::System { content, .. } => {
            wire.insert("content".to_owned(), Value::from(content.as_text()));
        }
        PromptMessage::Assistant {
            content, tool_calls, ..
        } => {
            wire.insert("content".to_owned(), Value::from(content.as_text()));
            if !tool_calls.is_empty() {
                let calls = tool_calls.iter().map(tool_call_to_wire).collect();
                wire.insert(dialect.tool_calls_key.to_owned(), Value::Array(calls));
            }
        }
        PromptMessage::Tool {
            content, tool_call_id, ..
        } => {
            wire.insert("content".to_owned(), Value::from(content.as_text()));
            wire.insert(dialect.tool_call_id_key.to_owned(), Value::from(tool_call_id.as_str()));
        }
    }

    if let Some(name) = message.name() {
        wire.insert("name".to_owned(), Value::from(name));
    }

    wire
}

/// Wire objects for an ordered message list
pub fn messages_to_wire(messages: &[PromptMessage], dialect: MessageDialect) -> Vec<Value> {
    messages
        .iter()
        .map(|m| Value::Object(message_to_wire(m, dialect)))
        .collect()
}

fn user_content(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => Value::from(text.as_str()),
        MessageContent::Parts(parts) => Value::Array(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                    ContentPart::Image { url, detail } => json!({
                        "type": "image_url",
                        "image_url": { "url": url, "detail": detail.as_str() },
                    }),
                })
                .collect(),
        ),
    }
}

fn tool_call_to_wire(call: &ToolCall) -> Value {
    json!({
        "type": "function",
        "id": call.id,
        "function": {
            "name": call.function.name,
            "arguments": call.function.arguments,
        },
    })
}

/// Wire object for one tool definition
pub fn tool_to_wire(tool: &PromptMessageTool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        },
    })
}

pub fn tools_to_wire(tools: &[PromptMessageTool]) -> Vec<Value> {
    tools.iter().map(tool_to_wire).collect()
}
