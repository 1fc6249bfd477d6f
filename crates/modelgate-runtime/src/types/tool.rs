use serde::{Deserialize, Serialize};

/// Tool the model may call, described by a JSON-schema-like object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessageTool {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Parameter schema (`type`, `properties`, `required`, optional `title`)
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl PromptMessageTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: serde_json::Value) -> Self {
        let parameters = match parameters {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
