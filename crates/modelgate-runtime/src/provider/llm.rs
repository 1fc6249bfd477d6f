//! Text generation over a provider profile

use modelgate_config::{ChatMode, ProviderType};
use serde_json::{Map, Value, json};

use super::{CallKind, ClientSettings, Operation, ProviderProfile, Transport, ValidationStyle, coerce_base_model_name};
use crate::catalog;
use crate::convert::messages::{messages_to_wire, tools_to_wire};
use crate::convert::response::{parse_generate_response, unwrap_envelope};
use crate::credentials::Credentials;
use crate::error::{LlmError, NativeError};
use crate::stream::{StreamAssembler, assemble_stream};
use crate::tokenizer::TokenEstimator;
use crate::types::{
    AiModelEntity, InvokeRequest, InvokeResult, LlmResult, PromptMessage, PromptMessageTool, Usage,
};

/// Message sent when validating credentials
const PING_TEXT: &str = "ping";

/// Large language model bound to one provider family
#[derive(Debug, Clone)]
pub struct LargeLanguageModel {
    transport: Transport,
    estimator: TokenEstimator<'static>,
}

impl LargeLanguageModel {
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

    /// Invoke the model, returning a full result or a lazy chunk stream
    pub async fn invoke(&self, request: &InvokeRequest) -> Result<InvokeResult, LlmError> {
        self.invoke_as(request, CallKind::for_stream(request.stream)).await
    }

    async fn invoke_as(&self, request: &InvokeRequest, kind: CallKind) -> Result<InvokeResult, LlmError> {
        for message in &request.prompt_messages {
            message.validate()?;
        }

        let settings = (self.profile().settings)(&request.credentials)?;
        let payload = self.build_payload(request, &settings)?;
        let url = settings.endpoint.url(Operation::from(settings.mode), &request.model)?;

        tracing::debug!(
            provider = %self.profile().provider_type,
            model = %request.model,
            mode = %settings.mode,
            stream = request.stream,
            "invoking model"
        );

        let response = self
            .transport
            .post_json(url, settings.auth.as_ref(), &payload, kind)
            .await?;

        let prompt_text = first_prompt_text(&request.prompt_messages);

        if request.stream {
            let assembler = StreamAssembler::new(request.model.clone(), prompt_text, self.estimator);
            let errors = self.profile().errors;
            let chunks = assemble_stream(
                response.bytes_stream(),
                &settings.stream_delimiter,
                assembler,
                move |e: reqwest::Error| errors.normalize(NativeError::from_reqwest(&e)),
            );
            return Ok(InvokeResult::Stream(chunks));
        }

        let body = unwrap_envelope(self.transport.read_json(response).await?)?;
        let parsed = parse_generate_response(&body, settings.mode)?;

        let usage = parsed.usage.unwrap_or_else(|| {
            Usage::from_counts(
                self.estimator.count(&prompt_text),
                self.estimator.count(&parsed.message.content),
            )
        });

        Ok(InvokeResult::Complete(LlmResult {
            model: parsed.model.unwrap_or_else(|| request.model.clone()),
            prompt_messages: request.prompt_messages.clone(),
            message: parsed.message,
            usage,
        }))
    }

    fn build_payload(&self, request: &InvokeRequest, settings: &ClientSettings) -> Result<Value, LlmError> {
        let mut payload = Map::new();
        let model = settings.payload_model.as_deref().unwrap_or(&request.model);
        payload.insert("model".to_owned(), Value::from(model));
        payload.insert("stream".to_owned(), Value::from(request.stream));
        settings.scene.apply(&mut payload);
        payload.extend(request.model_parameters.clone());

        match settings.mode {
            ChatMode::Chat => {
                let messages = messages_to_wire(&request.prompt_messages, self.profile().dialect);
                payload.insert("messages".to_owned(), Value::Array(messages));
            }
            ChatMode::Completion => {
                let first = request.prompt_messages.first().ok_or_else(|| {
                    LlmError::InvalidMessage("completion mode requires at least one prompt message".to_owned())
                })?;
                payload.insert("prompt".to_owned(), Value::from(first.content().as_text()));
            }
        }

        if !request.tools.is_empty() {
            payload.insert("tool_choice".to_owned(), Value::from("auto"));
            payload.insert("tools".to_owned(), Value::Array(tools_to_wire(&request.tools)));
        }
        if !request.stop.is_empty() {
            payload.insert("stop".to_owned(), json!(request.stop));
        }
        if let Some(user) = &request.user {
            payload.insert("user".to_owned(), Value::from(user.as_str()));
        }

        Ok(Value::Object(payload))
    }

    /// Estimated prompt tokens for `prompt_messages` and optional tools
    pub fn get_num_tokens(&self, prompt_messages: &[PromptMessage], tools: &[PromptMessageTool]) -> usize {
        self.estimator
            .count_messages(prompt_messages, self.profile().dialect, tools)
    }

    /// Confirm the credentials can serve `model` with one minimal call
    pub async fn validate_credentials(&self, model: &str, credentials: &Credentials) -> Result<(), LlmError> {
        let result = self.check_credentials(model, credentials).await;
        if let Err(e) = &result {
            tracing::warn!(provider = %self.profile().provider_type, model, error = %e, "credential validation failed");
        }
        result
    }

    async fn check_credentials(&self, model: &str, credentials: &Credentials) -> Result<(), LlmError> {
        self.profile().check_validation_credentials(credentials)?;
        let settings = (self.profile().settings)(credentials)?;
        match self.profile().validation_style {
            ValidationStyle::ObjectCheck => self.check_object(model, &settings).await,
            ValidationStyle::Ping => {
                let request = InvokeRequest::new(model, credentials.clone(), vec![PromptMessage::user(PING_TEXT)])
                    .parameter("max_tokens", 20)
                    .parameter("temperature", 0);
                self.invoke_as(&request, CallKind::Validation)
                    .await
                    .map(drop)
                    .map_err(wrap_validation_error)
            }
        }
    }

    async fn check_object(&self, model: &str, settings: &ClientSettings) -> Result<(), LlmError> {
        let mut payload = Map::new();
        payload.insert("model".to_owned(), Value::from(model));
        payload.insert("max_tokens".to_owned(), Value::from(5));
        settings.scene.apply(&mut payload);
        payload.insert("stream".to_owned(), Value::from(false));
        let expected = match settings.mode {
            ChatMode::Chat => {
                payload.insert("messages".to_owned(), json!([{ "role": "user", "content": PING_TEXT }]));
                "chat.completion"
            }
            ChatMode::Completion => {
                payload.insert("prompt".to_owned(), Value::from(PING_TEXT));
                "text_completion"
            }
        };

        let url = settings.endpoint.url(Operation::from(settings.mode), model)?;
        let response = self
            .transport
            .post_json(url, settings.auth.as_ref(), &Value::Object(payload), CallKind::Validation)
            .await
            .map_err(|e| match e {
                LlmError::Invoke { status: Some(status), .. } => {
                    LlmError::CredentialsValidation(format!("Credentials validation failed with status code {status}"))
                }
                e @ LlmError::Configuration(_) => e,
                e => LlmError::CredentialsValidation(format!("An error occurred during credentials validation: {e}")),
            })?;

        let bytes = response.bytes().await.map_err(|e| {
            LlmError::CredentialsValidation(format!("An error occurred during credentials validation: {e}"))
        })?;
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|_| LlmError::CredentialsValidation("Credentials validation failed: JSON decode error".to_owned()))?;
        let body = unwrap_envelope(body)
            .map_err(|e| LlmError::CredentialsValidation(format!("Credentials validation failed: http error {e}")))?;

        if body.get("object").and_then(Value::as_str) != Some(expected) {
            return Err(LlmError::CredentialsValidation(format!(
                "Credentials validation failed: invalid response object, must be '{expected}'"
            )));
        }
        Ok(())
    }

    /// Schema of a customizable (fine-tuned or deployed) model
    pub fn get_customizable_model_schema(&self, model: &str, credentials: &Credentials) -> Result<AiModelEntity, LlmError> {
        let base = credentials
            .get("base_model_name")
            .map_or_else(|| catalog::base_model_of(model).to_owned(), coerce_base_model_name);
        catalog::customizable_schema(model, &base)
    }
}

/// Wrap an invocation failure as a validation failure naming its class
pub(crate) fn wrap_validation_error(error: LlmError) -> LlmError {
    match error {
        e @ (LlmError::Configuration(_) | LlmError::CredentialsValidation(_)) => e,
        e => LlmError::CredentialsValidation(format!("{}: {e}", e.class_name())),
    }
}

/// Text of the first prompt message, the basis of usage estimates
fn first_prompt_text(messages: &[PromptMessage]) -> String {
    messages
        .first()
        .map(|m| m.content().as_text())
        .unwrap_or_default()
}
