//! Provider profiles and the shared HTTP transport
//!
//! Every provider family is a [`ProviderProfile`]: a static bundle of the
//! credential mapping, wire dialect, error table and timeouts. The
//! generation and embedding models are generic over it.

pub mod embedding;
pub mod llm;

use std::time::Duration;

use modelgate_config::{ChatMode, ProviderType};
use reqwest::header::{ACCEPT_CHARSET, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use url::Url;

use crate::convert::messages::MessageDialect;
use crate::credentials::Credentials;
use crate::error::{ErrorMapping, InvokeErrorKind, LlmError, NativeError, NativeErrorClass};
use crate::stream::{DEFAULT_DELIMITER, decode_delimiter};

/// Azure `OpenAI` REST API version used when none is configured
pub const DEFAULT_AZURE_API_VERSION: &str = "2023-12-01-preview";

/// Fixed per-profile HTTP timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
    /// Whole-request limit, applied to non-streaming calls only
    pub total: Option<Duration>,
    /// Whole-request limit of credential validation calls
    pub validation: Duration,
}

impl Timeouts {
    /// Whole-request limit for one kind of call
    pub const fn limit(&self, kind: CallKind) -> Option<Duration> {
        match kind {
            CallKind::Invoke => self.total,
            CallKind::Stream => None,
            CallKind::Validation => Some(self.validation),
        }
    }
}

/// Purpose of one outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Regular blocking call
    Invoke,
    /// Streaming call; only connect and per-read limits apply
    Stream,
    /// Credential validation call
    Validation,
}

impl CallKind {
    pub const fn for_stream(stream: bool) -> Self {
        if stream { Self::Stream } else { Self::Invoke }
    }
}

/// How credential validation exercises the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStyle {
    /// Raw five-token request whose `object` field must match the mode
    ObjectCheck,
    /// Regular `ping` chat invocation; any failure is wrapped
    Ping,
}

/// Static description of one provider family
#[derive(Debug)]
pub struct ProviderProfile {
    pub provider_type: ProviderType,
    pub dialect: MessageDialect,
    pub errors: ErrorMapping,
    pub timeouts: Timeouts,
    /// Map a credential record onto client settings
    pub settings: fn(&Credentials) -> Result<ClientSettings, LlmError>,
    pub validation_style: ValidationStyle,
    /// Texts per embedding request; `None` sends all at once
    pub embedding_batch: Option<usize>,
    /// Credentials whose absence fails validation before any settings are built
    pub validation_required: &'static [&'static str],
}

impl ProviderProfile {
    pub fn for_type(provider_type: ProviderType) -> &'static Self {
        match provider_type {
            ProviderType::OpenaiCompatible => &OPENAI_COMPATIBLE,
            ProviderType::AzureOpenai => &AZURE_OPENAI,
            ProviderType::TuyaOpenai => &TUYA_OPENAI,
        }
    }

    /// Fail validation early when a validation-only credential is missing
    pub fn check_validation_credentials(&self, credentials: &Credentials) -> Result<(), LlmError> {
        match self
            .validation_required
            .iter()
            .find(|key| credentials.get(key).is_none())
        {
            Some(key) => Err(LlmError::CredentialsValidation(format!("`{key}` is required"))),
            None => Ok(()),
        }
    }
}

/// Requests-level failures only; HTTP status failures stay generic
const COMPATIBLE_ERRORS: ErrorMapping = ErrorMapping::new(&[
    (InvokeErrorKind::Connection, &[NativeErrorClass::Timeout]),
    (InvokeErrorKind::ServerUnavailable, &[NativeErrorClass::Connect]),
]);

const OPENAI_SDK_ERRORS: ErrorMapping = ErrorMapping::new(&[
    (
        InvokeErrorKind::Connection,
        &[NativeErrorClass::Connect, NativeErrorClass::Timeout],
    ),
    (InvokeErrorKind::ServerUnavailable, &[NativeErrorClass::InternalServer]),
    (InvokeErrorKind::RateLimit, &[NativeErrorClass::RateLimited]),
    (
        InvokeErrorKind::Authorization,
        &[NativeErrorClass::Authentication, NativeErrorClass::PermissionDenied],
    ),
    (
        InvokeErrorKind::BadRequest,
        &[
            NativeErrorClass::BadRequest,
            NativeErrorClass::NotFound,
            NativeErrorClass::Unprocessable,
            NativeErrorClass::Api,
            NativeErrorClass::Decode,
        ],
    ),
]);

const AZURE_TIMEOUTS: Timeouts = Timeouts {
    connect: Duration::from_secs(5),
    read: Duration::from_secs(300),
    total: Some(Duration::from_secs(315)),
    validation: VALIDATION_TIMEOUT,
};

const VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

pub static OPENAI_COMPATIBLE: ProviderProfile = ProviderProfile {
    provider_type: ProviderType::OpenaiCompatible,
    dialect: MessageDialect::GATEWAY,
    errors: COMPATIBLE_ERRORS,
    timeouts: Timeouts {
        connect: Duration::from_secs(10),
        read: Duration::from_secs(60),
        total: None,
        validation: VALIDATION_TIMEOUT,
    },
    settings: compatible_settings,
    validation_style: ValidationStyle::ObjectCheck,
    embedding_batch: None,
    validation_required: &[],
};

pub static AZURE_OPENAI: ProviderProfile = ProviderProfile {
    provider_type: ProviderType::AzureOpenai,
    dialect: MessageDialect::OPENAI,
    errors: OPENAI_SDK_ERRORS,
    timeouts: AZURE_TIMEOUTS,
    settings: azure_settings,
    validation_style: ValidationStyle::Ping,
    embedding_batch: None,
    validation_required: &[],
};

pub static TUYA_OPENAI: ProviderProfile = ProviderProfile {
    provider_type: ProviderType::TuyaOpenai,
    dialect: MessageDialect::OPENAI,
    errors: OPENAI_SDK_ERRORS,
    timeouts: AZURE_TIMEOUTS,
    settings: tuya_settings,
    validation_style: ValidationStyle::Ping,
    embedding_batch: Some(1),
    validation_required: &["scene_id"],
};

/// Request authentication
#[derive(Debug, Clone)]
pub enum Auth {
    /// `Authorization: Bearer <key>`
    Bearer(SecretString),
    /// `api-key: <key>`
    ApiKeyHeader(SecretString),
}

/// Kind of call being addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Chat,
    Completion,
    Embeddings,
}

impl From<ChatMode> for Operation {
    fn from(mode: ChatMode) -> Self {
        match mode {
            ChatMode::Chat => Self::Chat,
            ChatMode::Completion => Self::Completion,
        }
    }
}

/// Endpoint layout of a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `{base}/chat`, `{base}/completions`, `{base}/embeddings`
    Compatible { base: Url },
    /// `{base}/openai/deployments/{model}/...?api-version=...`
    AzureDeployment { base: Url, api_version: String },
}

impl Endpoint {
    pub fn url(&self, operation: Operation, model: &str) -> Result<Url, LlmError> {
        match self {
            Self::Compatible { base } => {
                let suffix = match operation {
                    Operation::Chat => "chat",
                    Operation::Completion => "completions",
                    Operation::Embeddings => "embeddings",
                };
                base.join(suffix)
                    .map_err(|e| LlmError::Configuration(format!("invalid endpoint url: {e}")))
            }
            Self::AzureDeployment { base, api_version } => {
                let suffix = match operation {
                    Operation::Chat => "chat/completions",
                    Operation::Completion => "completions",
                    Operation::Embeddings => "embeddings",
                };
                let raw = format!(
                    "{}/openai/deployments/{model}/{suffix}",
                    base.as_str().trim_end_matches('/')
                );
                let mut url =
                    Url::parse(&raw).map_err(|e| LlmError::Configuration(format!("invalid api base: {e}")))?;
                url.query_pairs_mut().append_pair("api-version", api_version);
                Ok(url)
            }
        }
    }
}

/// `sceneId` payload tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneTag {
    /// Not sent
    Omitted,
    /// Sent as given, `null` when no value is configured
    Sent(Option<String>),
}

impl SceneTag {
    /// Add the tag to a JSON payload
    pub fn apply(&self, payload: &mut Map<String, Value>) {
        if let Self::Sent(scene_id) = self {
            let value = scene_id.as_deref().map_or(Value::Null, Value::from);
            payload.insert("sceneId".to_owned(), value);
        }
    }
}

/// Client settings derived from one credential record
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub endpoint: Endpoint,
    pub auth: Option<Auth>,
    /// Model id sent in the payload instead of the requested one
    pub payload_model: Option<String>,
    pub scene: SceneTag,
    pub mode: ChatMode,
    /// Decoded stream line delimiter
    pub stream_delimiter: String,
}

fn parse_url(raw: &str, key: &str) -> Result<Url, LlmError> {
    Url::parse(raw).map_err(|e| LlmError::Configuration(format!("invalid `{key}`: {e}")))
}

fn compatible_settings(credentials: &Credentials) -> Result<ClientSettings, LlmError> {
    let mut endpoint_url = credentials.require("endpoint_url")?.to_owned();
    if !endpoint_url.ends_with('/') {
        endpoint_url.push('/');
    }
    let api_key = credentials.get("api_key");

    Ok(ClientSettings {
        endpoint: Endpoint::Compatible {
            base: parse_url(&endpoint_url, "endpoint_url")?,
        },
        auth: api_key.map(|key| Auth::Bearer(SecretString::from(key.to_owned()))),
        payload_model: None,
        scene: SceneTag::Sent(api_key.map(str::to_owned)),
        mode: credentials.mode()?,
        stream_delimiter: decode_delimiter(credentials.get("stream_mode_delimiter").unwrap_or(DEFAULT_DELIMITER)),
    })
}

/// Azure deployments name GPT-3.5 models `gpt-35-*`
pub fn coerce_base_model_name(name: &str) -> String {
    name.replace("gpt-35", "gpt-3.5")
}

fn azure_settings(credentials: &Credentials) -> Result<ClientSettings, LlmError> {
    let api_key = credentials.require("openai_api_key")?;
    let base = parse_url(credentials.require("openai_api_base")?, "openai_api_base")?;

    Ok(ClientSettings {
        endpoint: Endpoint::AzureDeployment {
            base,
            api_version: credentials
                .get("api_version")
                .unwrap_or(DEFAULT_AZURE_API_VERSION)
                .to_owned(),
        },
        auth: Some(Auth::ApiKeyHeader(SecretString::from(api_key.to_owned()))),
        payload_model: credentials.get("base_model_name").map(coerce_base_model_name),
        scene: SceneTag::Omitted,
        mode: credentials.mode()?,
        stream_delimiter: DEFAULT_DELIMITER.to_owned(),
    })
}

fn tuya_settings(credentials: &Credentials) -> Result<ClientSettings, LlmError> {
    let scene_id = credentials.require("scene_id")?.to_owned();
    Ok(ClientSettings {
        scene: SceneTag::Sent(Some(scene_id)),
        ..azure_settings(credentials)?
    })
}

/// HTTP transport bound to one profile
#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    profile: &'static ProviderProfile,
}

impl Transport {
    pub fn new(profile: &'static ProviderProfile) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(profile.timeouts.connect)
            .read_timeout(profile.timeouts.read)
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to build http client: {e}")))?;

        Ok(Self { client, profile })
    }

    pub const fn profile(&self) -> &'static ProviderProfile {
        self.profile
    }

    /// Map a native failure through the profile's table
    pub fn normalize(&self, error: NativeError) -> LlmError {
        self.profile.errors.normalize(error)
    }

    /// POST a JSON body; any non-200 status is an error
    pub async fn post_json(
        &self,
        url: Url,
        auth: Option<&Auth>,
        body: &Value,
        kind: CallKind,
    ) -> Result<reqwest::Response, LlmError> {
        let provider = self.profile.provider_type;
        let payload = serde_json::to_vec(body).map_err(|e| LlmError::InvalidMessage(e.to_string()))?;

        tracing::debug!(provider = %provider, url = %url, kind = ?kind, "sending provider request");

        let mut builder = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .header(ACCEPT_CHARSET, "utf-8")
            .body(payload);

        builder = match auth {
            Some(Auth::Bearer(key)) => builder.bearer_auth(key.expose_secret()),
            Some(Auth::ApiKeyHeader(key)) => builder.header("api-key", key.expose_secret()),
            None => builder,
        };

        if let Some(limit) = self.profile.timeouts.limit(kind) {
            builder = builder.timeout(limit);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(provider = %provider, error = %e, "provider request failed");
            self.normalize(NativeError::from_reqwest(&e))
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %provider, status = %status, "provider returned error");
            return Err(self.normalize(NativeError::from_status(status.as_u16(), &body)));
        }

        Ok(response)
    }

    /// Read a response body as JSON, decoding it as UTF-8 regardless of headers
    pub async fn read_json(&self, response: reqwest::Response) -> Result<Value, LlmError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.normalize(NativeError::from_reqwest(&e)))?;

        serde_json::from_slice(&bytes).map_err(|e| {
            self.normalize(NativeError::new(
                NativeErrorClass::Decode,
                format!("failed to parse response: {e}"),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compatible(endpoint: &str) -> Credentials {
        Credentials::new().with("endpoint_url", endpoint)
    }

    #[test]
    fn compatible_urls_get_trailing_slash() {
        let settings = compatible_settings(&compatible("http://gw.local/v1")).unwrap();
        assert_eq!(
            settings.endpoint.url(Operation::Chat, "m").unwrap().as_str(),
            "http://gw.local/v1/chat"
        );
        assert_eq!(
            settings.endpoint.url(Operation::Completion, "m").unwrap().as_str(),
            "http://gw.local/v1/completions"
        );
        assert_eq!(
            settings.endpoint.url(Operation::Embeddings, "m").unwrap().as_str(),
            "http://gw.local/v1/embeddings"
        );
    }

    #[test]
    fn compatible_scene_follows_api_key() {
        let settings = compatible_settings(&compatible("http://gw.local/").with("api_key", "k1")).unwrap();
        assert_eq!(settings.scene, SceneTag::Sent(Some("k1".to_owned())));
        assert!(matches!(settings.auth, Some(Auth::Bearer(_))));

        let anonymous = compatible_settings(&compatible("http://gw.local/")).unwrap();
        assert!(anonymous.auth.is_none());
        assert_eq!(anonymous.scene, SceneTag::Sent(None));

        let mut payload = Map::new();
        anonymous.scene.apply(&mut payload);
        assert_eq!(payload["sceneId"], Value::Null);
    }

    #[test]
    fn compatible_delimiter_is_decoded() {
        let creds = compatible("http://gw.local/").with("stream_mode_delimiter", r"\n");
        assert_eq!(compatible_settings(&creds).unwrap().stream_delimiter, "\n");
    }

    #[test]
    fn unsupported_mode_fails_before_any_call() {
        let err = compatible_settings(&compatible("http://gw.local/").with("mode", "rerank")).unwrap_err();
        assert!(matches!(err, LlmError::Configuration(_)));
    }

    #[test]
    fn azure_deployment_urls() {
        let creds = Credentials::new()
            .with("openai_api_key", "k")
            .with("openai_api_base", "https://res.openai.azure.com/")
            .with("base_model_name", "gpt-35-turbo");
        let settings = azure_settings(&creds).unwrap();

        assert_eq!(settings.payload_model.as_deref(), Some("gpt-3.5-turbo"));
        assert_eq!(
            settings.endpoint.url(Operation::Chat, "my-deploy").unwrap().as_str(),
            "https://res.openai.azure.com/openai/deployments/my-deploy/chat/completions?api-version=2023-12-01-preview"
        );
        assert_eq!(
            settings.endpoint.url(Operation::Embeddings, "emb").unwrap().path(),
            "/openai/deployments/emb/embeddings"
        );
    }

    #[test]
    fn tuya_requires_scene() {
        let creds = Credentials::new()
            .with("openai_api_key", "k")
            .with("openai_api_base", "https://gw.tuya.local");
        assert!(matches!(tuya_settings(&creds), Err(LlmError::Configuration(_))));

        let settings = tuya_settings(&creds.with("scene_id", "s-1")).unwrap();
        assert_eq!(settings.scene, SceneTag::Sent(Some("s-1".to_owned())));
    }

    #[test]
    fn tuya_validation_requires_scene_up_front() {
        let creds = Credentials::new().with("openai_api_key", "k");
        let err = TUYA_OPENAI.check_validation_credentials(&creds).unwrap_err();
        assert!(matches!(err, LlmError::CredentialsValidation(ref m) if m.contains("scene_id")));

        assert!(TUYA_OPENAI.check_validation_credentials(&creds.with("scene_id", "s")).is_ok());
        assert!(AZURE_OPENAI.check_validation_credentials(&Credentials::new()).is_ok());
    }

    #[test]
    fn validation_calls_get_a_short_limit() {
        for profile in [&OPENAI_COMPATIBLE, &AZURE_OPENAI, &TUYA_OPENAI] {
            assert_eq!(profile.timeouts.limit(CallKind::Validation), Some(Duration::from_secs(10)));
            assert_eq!(profile.timeouts.limit(CallKind::Stream), None);
        }
        assert_eq!(AZURE_OPENAI.timeouts.limit(CallKind::Invoke), Some(Duration::from_secs(315)));
        assert_eq!(OPENAI_COMPATIBLE.timeouts.limit(CallKind::Invoke), None);
    }

    #[test]
    fn profile_error_tables() {
        let status_500 = NativeError::from_status(500, "down");
        assert!(matches!(
            OPENAI_COMPATIBLE.errors.normalize(status_500.clone()),
            LlmError::Invoke { status: Some(500), .. }
        ));
        assert_eq!(
            AZURE_OPENAI.errors.normalize(status_500).kind(),
            Some(InvokeErrorKind::ServerUnavailable)
        );
        assert_eq!(
            TUYA_OPENAI.errors.kind_of(NativeErrorClass::PermissionDenied),
            Some(InvokeErrorKind::Authorization)
        );
        assert_eq!(
            OPENAI_COMPATIBLE.errors.kind_of(NativeErrorClass::Timeout),
            Some(InvokeErrorKind::Connection)
        );
    }
}
