use std::path::Path;

use crate::{ChatMode, Config};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a placeholder cannot be
    /// resolved, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is configured, a provider lacks a
    /// required credential, or telemetry settings are out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be configured");
        }

        for (name, provider) in &self.providers {
            if name.trim().is_empty() {
                anyhow::bail!("provider names must not be empty");
            }

            for key in provider.provider_type.required_credentials() {
                let present = provider.credentials.get(*key).is_some_and(|v| !v.is_empty());
                if !present {
                    anyhow::bail!(
                        "provider '{name}' ({}) is missing required credential '{key}'",
                        provider.provider_type
                    );
                }
            }

            if let Some(mode) = provider.credentials.get("mode")
                && ChatMode::parse(mode).is_none()
            {
                anyhow::bail!("provider '{name}' has unsupported mode '{mode}', expected 'chat' or 'completion'");
            }
        }

        if let Some(exporter) = self.telemetry.as_ref().and_then(|t| t.exporter.as_ref())
            && !(0.0..=1.0).contains(&exporter.sampling_rate)
        {
            anyhow::bail!("telemetry.exporter.sampling_rate must be between 0.0 and 1.0");
        }

        Ok(())
    }
}
