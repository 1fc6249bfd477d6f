//! Predefined model schemas and customizable-model resolution

use std::sync::LazyLock;

use serde::Deserialize;

use crate::error::LlmError;
use crate::types::{AiModelEntity, FetchFrom, I18nObject};

#[derive(Deserialize)]
struct CatalogFile {
    models: Vec<AiModelEntity>,
}

static CATALOG: LazyLock<Result<Vec<AiModelEntity>, String>> = LazyLock::new(|| {
    toml::from_str::<CatalogFile>(include_str!("catalog.toml"))
        .map(|file| file.models)
        .map_err(|e| e.to_string())
});

/// Every predefined model
pub fn predefined_models() -> Result<&'static [AiModelEntity], LlmError> {
    CATALOG
        .as_deref()
        .map_err(|e| LlmError::Configuration(format!("invalid model catalog: {e}")))
}

/// Predefined model by exact id
pub fn find(model: &str) -> Result<Option<&'static AiModelEntity>, LlmError> {
    Ok(predefined_models()?.iter().find(|entry| entry.model == model))
}

/// Base model id of a fine-tune reference (`ft:<base>:<org>:...`)
pub fn base_model_of(model: &str) -> &str {
    if model.starts_with("ft:") {
        model.split(':').nth(1).unwrap_or_default()
    } else {
        model
    }
}

/// Schema for `model` derived from its predefined base model
pub fn customizable_schema(model: &str, base_model: &str) -> Result<AiModelEntity, LlmError> {
    let base = find(base_model)?.ok_or_else(|| LlmError::ModelNotFound {
        model: base_model.to_owned(),
    })?;

    Ok(AiModelEntity {
        model: model.to_owned(),
        label: I18nObject::new(model),
        fetch_from: FetchFrom::CustomizableModel,
        ..base.clone()
    })
}
