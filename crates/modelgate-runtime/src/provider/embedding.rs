//! Text embedding over a provider profile

use modelgate_config::ProviderType;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::llm::wrap_validation_error;
use super::{CallKind, ClientSettings, Operation, ProviderProfile, Transport};
use crate::convert::response::{parse_count, unwrap_envelope};
use crate::credentials::Credentials;
use crate::error::{LlmError, NativeError, NativeErrorClass};
use crate::tokenizer::TokenEstimator;
use crate::types::{EmbeddingUsage, TextEmbeddingResult};

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Embedding model bound to one provider family
#[derive(Debug, Clone)]
pub struct TextEmbeddingModel {
    transport: Transport,
    estimator: TokenEstimator<'static>,
}

impl TextEmbeddingModel {
    pub fn new(provider_type: ProviderType) -> Result<Self, LlmError> {
        Self::with_profile(ProviderProfile::for_type(provider_type))
    }

    pub fn with_profile(profile: &'static ProviderProfile) -> Result<Self, LlmError> {
        Ok(Self {
            transport: Transport::new(profile)?,
            estimator: TokenEstimator::shared(),
        })
    }

    pub const fn profile(&self) -> &'static ProviderProfile {
        self.transport.profile()
    }

    /// Embed `texts`, returning one vector per text in input order
    pub async fn invoke(
        &self,
        model: &str,
        credentials: &Credentials,
        texts: &[String],
        user: Option<&str>,
    ) -> Result<TextEmbeddingResult, LlmError> {
        self.invoke_as(model, credentials, texts, user, CallKind::Invoke).await
    }

    async fn invoke_as(
        &self,
        model: &str,
        credentials: &Credentials,
        texts: &[String],
        user: Option<&str>,
        kind: CallKind,
    ) -> Result<TextEmbeddingResult, LlmError> {
        let settings = (self.profile().settings)(credentials)?;
        let batch_size = self.profile().embedding_batch.unwrap_or(texts.len()).max(1);

        tracing::debug!(
            provider = %self.profile().provider_type,
            model,
            texts = texts.len(),
            batch_size,
            "embedding texts"
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        let mut usage = EmbeddingUsage::default();

        for batch in texts.chunks(batch_size) {
            let (vectors, batch_usage) = self.embed_batch(model, &settings, batch, user, kind).await?;
            embeddings.extend(vectors);
            usage.tokens = usage.tokens.saturating_add(batch_usage.tokens);
            usage.total_tokens = usage.total_tokens.saturating_add(batch_usage.total_tokens);
        }

        Ok(TextEmbeddingResult {
            model: model.to_owned(),
            embeddings,
            usage,
        })
    }

    async fn embed_batch(
        &self,
        model: &str,
        settings: &ClientSettings,
        batch: &[String],
        user: Option<&str>,
        kind: CallKind,
    ) -> Result<(Vec<Vec<f32>>, EmbeddingUsage), LlmError> {
        let mut payload = Map::new();
        let payload_model = settings.payload_model.as_deref().unwrap_or(model);
        payload.insert("model".to_owned(), Value::from(payload_model));
        let input = match batch {
            [single] if self.profile().embedding_batch == Some(1) => Value::from(single.as_str()),
            _ => Value::from(batch.to_vec()),
        };
        payload.insert("input".to_owned(), input);
        settings.scene.apply(&mut payload);
        if let Some(user) = user {
            payload.insert("user".to_owned(), Value::from(user));
        }

        let url = settings.endpoint.url(Operation::Embeddings, model)?;
        let response = self
            .transport
            .post_json(url, settings.auth.as_ref(), &Value::Object(payload), kind)
            .await?;
        let body = unwrap_envelope(self.transport.read_json(response).await?)?;

        let mut items: Vec<EmbeddingItem> = body
            .get("data")
            .cloned()
            .map(serde_json::from_value::<Vec<EmbeddingItem>>)
            .transpose()
            .map_err(|e| {
                self.transport.normalize(NativeError::new(
                    NativeErrorClass::Decode,
                    format!("failed to parse embeddings: {e}"),
                ))
            })?
            .unwrap_or_default();

        if items.len() != batch.len() {
            return Err(LlmError::Invoke {
                status: None,
                message: format!("expected {} embeddings, provider returned {}", batch.len(), items.len()),
            });
        }
        items.sort_by_key(|item| item.index.unwrap_or(usize::MAX));

        let usage = body
            .get("usage")
            .and_then(Value::as_object)
            .filter(|u| !u.is_empty())
            .map_or_else(
                || {
                    let tokens = u32::try_from(self.count_texts(batch)).unwrap_or(u32::MAX);
                    EmbeddingUsage {
                        tokens,
                        total_tokens: tokens,
                    }
                },
                |u| {
                    let total = parse_count(u.get("total_tokens")).unwrap_or(0);
                    EmbeddingUsage {
                        tokens: parse_count(u.get("prompt_tokens")).unwrap_or(total),
                        total_tokens: total,
                    }
                },
            );

        Ok((items.into_iter().map(|item| item.embedding).collect(), usage))
    }

    fn count_texts(&self, texts: &[String]) -> usize {
        texts.iter().map(|text| self.estimator.count(text)).sum()
    }

    /// Estimated tokens across `texts`
    pub fn get_num_tokens(&self, texts: &[String]) -> usize {
        self.count_texts(texts)
    }

    /// Confirm the credentials can embed with `model`
    pub async fn validate_credentials(&self, model: &str, credentials: &Credentials) -> Result<(), LlmError> {
        self.profile().check_validation_credentials(credentials)?;
        (self.profile().settings)(credentials)?;
        self.invoke_as(model, credentials, &["ping".to_owned()], None, CallKind::Validation)
            .await
            .map(drop)
            .map_err(wrap_validation_error)
    }
}
