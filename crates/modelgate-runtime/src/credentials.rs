use std::fmt;

use indexmap::IndexMap;
use modelgate_config::ChatMode;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Opaque credential record supplied per invocation
///
/// Keys and meaning depend on the provider family; values are never logged.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(IndexMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Value for `key`; empty strings count as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Value for `key`, or a configuration error naming it
    pub fn require(&self, key: &str) -> Result<&str, LlmError> {
        self.get(key)
            .ok_or_else(|| LlmError::Configuration(format!("missing credential `{key}`")))
    }

    /// Completion mode; absent defaults to chat
    pub fn mode(&self) -> Result<ChatMode, LlmError> {
        match self.get("mode") {
            None => Ok(ChatMode::Chat),
            Some(value) => ChatMode::parse(value)
                .ok_or_else(|| LlmError::Configuration(format!("unsupported completion mode `{value}`"))),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

impl From<IndexMap<String, String>> for Credentials {
    fn from(map: IndexMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
