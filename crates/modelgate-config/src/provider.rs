use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;

/// Configuration for a single model provider
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider family
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Opaque credential record handed to the runtime
    #[serde(default)]
    pub credentials: IndexMap<String, String>,
}

/// Supported provider families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Generic OpenAI-compatible HTTP gateway
    OpenaiCompatible,
    /// Azure OpenAI deployments
    AzureOpenai,
    /// Tuya's Azure-style gateway with scene routing
    TuyaOpenai,
}

impl ProviderType {
    /// Credential keys that must be present for this provider family
    pub const fn required_credentials(self) -> &'static [&'static str] {
        match self {
            Self::OpenaiCompatible => &["endpoint_url"],
            Self::AzureOpenai => &["openai_api_key", "openai_api_base"],
            Self::TuyaOpenai => &["openai_api_key", "openai_api_base", "scene_id"],
        }
    }

    /// Configuration name of this provider family
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenaiCompatible => "openai_compatible",
            Self::AzureOpenai => "azure_openai",
            Self::TuyaOpenai => "tuya_openai",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion mode a model is addressed with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// Multi-turn chat messages
    #[default]
    Chat,
    /// Single-string legacy completion
    Completion,
}

impl ChatMode {
    /// Parse a credential `mode` value
    ///
    /// Returns `None` for anything other than `chat` or `completion`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "chat" => Some(Self::Chat),
            "completion" => Some(Self::Completion),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Completion => "completion",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
