use serde::{Deserialize, Serialize};

/// Localized label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct I18nObject {
    pub en_us: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zh_hans: Option<String>,
}

impl I18nObject {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            zh_hans: Some(label.clone()),
            en_us: label,
        }
    }
}

/// Capability flags advertised by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFeature {
    ToolCall,
    MultiToolCall,
    AgentThought,
    Vision,
    StreamToolCall,
}

/// Where a model schema came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchFrom {
    PredefinedModel,
    CustomizableModel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProperties {
    /// `chat` or `completion`
    pub mode: String,
    pub context_size: u32,
}

/// Constraint on one model parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRule {
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub required: bool,
}

/// Per-unit token pricing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceConfig {
    pub input: String,
    pub output: String,
    pub unit: String,
    pub currency: String,
}

/// Full schema of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiModelEntity {
    pub model: String,
    pub label: I18nObject,
    pub model_type: String,
    #[serde(default)]
    pub features: Vec<ModelFeature>,
    #[serde(default = "predefined")]
    pub fetch_from: FetchFrom,
    pub model_properties: ModelProperties,
    #[serde(default)]
    pub parameter_rules: Vec<ParameterRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PriceConfig>,
}

const fn predefined() -> FetchFrom {
    FetchFrom::PredefinedModel
}
