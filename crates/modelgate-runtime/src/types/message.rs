use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Role tag of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// One turn of a conversation
///
/// A closed set of role variants; role-specific fields live only on the
/// variant that owns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase", deny_unknown_fields)]
pub enum PromptMessage {
    /// System instruction
    System {
        content: MessageContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// User turn, optionally multi-part
    User {
        content: MessageContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Assistant turn, optionally requesting tool calls
    Assistant {
        content: MessageContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Result of a tool call
    Tool {
        content: MessageContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Id of the assistant tool call this message answers
        tool_call_id: String,
    },
}

impl PromptMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System {
            content: MessageContent::Text(text.into()),
            name: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: MessageContent::Text(text.into()),
            name: None,
        }
    }

    /// User message made of ordered content parts
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidMessage`] if `parts` is empty.
    pub fn user_parts(parts: Vec<ContentPart>) -> Result<Self, LlmError> {
        let content = MessageContent::parts(parts)?;
        Ok(Self::User { content, name: None })
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: MessageContent::Text(text.into()),
            name: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: MessageContent::Text(text.into()),
            name: None,
            tool_calls,
        }
    }

    pub fn tool(text: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self::Tool {
            content: MessageContent::Text(text.into()),
            name: None,
            tool_call_id: tool_call_id.into(),
        }
    }

    /// Attach a participant name
    #[must_use]
    pub fn with_name(mut self, value: impl Into<String>) -> Self {
        match &mut self {
            Self::System { name, .. } | Self::User { name, .. } | Self::Assistant { name, .. } | Self::Tool { name, .. } => {
                *name = Some(value.into());
            }
        }
        self
    }

    /// Parse one message from its JSON form
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidMessage`] for an unknown role tag, missing
    /// fields, or an empty content-part list.
    pub fn from_value(value: serde_json::Value) -> Result<Self, LlmError> {
        let message: Self = serde_json::from_value(value).map_err(|e| LlmError::InvalidMessage(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    /// Parse an ordered message list from JSON text
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidMessage`] if the text is not a JSON array or
    /// any element fails [`PromptMessage::from_value`].
    pub fn parse_list(json: &str) -> Result<Vec<Self>, LlmError> {
        let values: Vec<serde_json::Value> =
            serde_json::from_str(json).map_err(|e| LlmError::InvalidMessage(e.to_string()))?;
        values.into_iter().map(Self::from_value).collect()
    }

    pub const fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
        }
    }

    pub const fn content(&self) -> &MessageContent {
        match self {
            Self::System { content, .. }
            | Self::User { content, .. }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::System { name, .. } | Self::User { name, .. } | Self::Assistant { name, .. } | Self::Tool { name, .. } => {
                name.as_deref()
            }
        }
    }

    /// Check structural invariants
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidMessage`] when content is an empty part list.
    pub fn validate(&self) -> Result<(), LlmError> {
        match self.content() {
            MessageContent::Parts(parts) if parts.is_empty() => Err(LlmError::InvalidMessage(format!(
                "{} message content parts must not be empty",
                self.role().as_str()
            ))),
            _ => Ok(()),
        }
    }
}

/// Message content: plain text or ordered typed parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Non-empty part list
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidMessage`] if `parts` is empty.
    pub fn parts(parts: Vec<ContentPart>) -> Result<Self, LlmError> {
        if parts.is_empty() {
            return Err(LlmError::InvalidMessage("content parts must not be empty".to_owned()));
        }
        Ok(Self::Parts(parts))
    }

    /// Text of the content; image parts contribute nothing
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect(),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// One typed part of multi-part content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        /// Image URL or base64 data URI
        url: String,
        #[serde(default)]
        detail: ImageDetail,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>, detail: ImageDetail) -> Self {
        Self::Image {
            url: url.into(),
            detail,
        }
    }
}

/// Resolution hint for image parts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    #[default]
    Low,
    High,
}

impl ImageDetail {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

/// A tool call requested by the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    /// Call type, always `function` today
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: ToolCallFunction,
}

impl ToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function name and JSON-encoded arguments of a tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: String,
}

fn default_call_type() -> String {
    "function".to_owned()
}
