#![allow(clippy::must_use_candidate)]

mod env;
mod loader;
pub mod provider;
pub mod telemetry;

use indexmap::IndexMap;
use serde::Deserialize;

pub use provider::{ChatMode, ProviderConfig, ProviderType};
pub use telemetry::{ExportProtocol, ExporterConfig, LogFormat, TelemetryConfig};

/// Top-level modelgate configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Model providers keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}

impl Config {
    /// Look up a provider by name
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}
