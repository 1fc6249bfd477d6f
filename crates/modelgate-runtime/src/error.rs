use std::fmt;

use thiserror::Error;

/// Normalized classification of an invocation failure
///
/// Provider-agnostic: each provider profile decides which native failures
/// fall into which kind through its [`ErrorMapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeErrorKind {
    /// The provider could not be reached or the call timed out
    Connection,
    /// The provider is up but failing internally
    ServerUnavailable,
    /// The caller exceeded the provider's rate limit
    RateLimit,
    /// Credentials were rejected
    Authorization,
    /// The request was malformed, referenced a missing resource, or was
    /// otherwise refused
    BadRequest,
}

/// Errors surfaced by the model runtime
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider unreachable or timed out
    #[error("connection error: {0}")]
    Connection(String),

    /// Provider reported an internal failure
    #[error("server unavailable: {0}")]
    ServerUnavailable(String),

    /// Provider rate limit hit
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// Provider rejected the credentials
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// Provider refused the request
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Provider failure with no normalized kind in the profile's table
    #[error("{message}")]
    Invoke {
        /// HTTP status when the failure came from a response
        status: Option<u16>,
        /// Original provider message
        message: String,
    },

    /// Credentials could not be confirmed usable
    #[error("credentials validation failed: {0}")]
    CredentialsValidation(String),

    /// Credentials or settings are missing or unsupported
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Base model absent from the predefined catalog
    #[error("base model {model} not found")]
    ModelNotFound { model: String },

    /// Prompt message could not be represented on the wire
    #[error("invalid prompt message: {0}")]
    InvalidMessage(String),
}

impl LlmError {
    /// Build the error for a normalized kind, keeping the original message
    pub fn from_kind(kind: InvokeErrorKind, message: String) -> Self {
        match kind {
            InvokeErrorKind::Connection => Self::Connection(message),
            InvokeErrorKind::ServerUnavailable => Self::ServerUnavailable(message),
            InvokeErrorKind::RateLimit => Self::RateLimited(message),
            InvokeErrorKind::Authorization => Self::Authorization(message),
            InvokeErrorKind::BadRequest => Self::BadRequest(message),
        }
    }

    /// Normalized kind, if this error is one of the taxonomy's kinds
    pub const fn kind(&self) -> Option<InvokeErrorKind> {
        match self {
            Self::Connection(_) => Some(InvokeErrorKind::Connection),
            Self::ServerUnavailable(_) => Some(InvokeErrorKind::ServerUnavailable),
            Self::RateLimited(_) => Some(InvokeErrorKind::RateLimit),
            Self::Authorization(_) => Some(InvokeErrorKind::Authorization),
            Self::BadRequest(_) => Some(InvokeErrorKind::BadRequest),
            _ => None,
        }
    }

    /// Stable class name, used when wrapping errors into validation failures
    pub const fn class_name(&self) -> &'static str {
        match self {
            Self::Connection(_) => "ConnectionError",
            Self::ServerUnavailable(_) => "ServerUnavailableError",
            Self::RateLimited(_) => "RateLimitError",
            Self::Authorization(_) => "AuthorizationError",
            Self::BadRequest(_) => "BadRequestError",
            Self::Invoke { .. } => "InvokeError",
            Self::CredentialsValidation(_) => "CredentialsValidateFailedError",
            Self::Configuration(_) => "ConfigurationError",
            Self::ModelNotFound { .. } => "ModelNotFoundError",
            Self::InvalidMessage(_) => "InvalidMessageError",
        }
    }
}

/// Native failure classes observed at the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeErrorClass {
    /// TCP/TLS connection could not be established
    Connect,
    /// Connect or read timeout elapsed
    Timeout,
    /// 5xx response
    InternalServer,
    /// 429 response
    RateLimited,
    /// 401 response
    Authentication,
    /// 403 response
    PermissionDenied,
    /// 400 response
    BadRequest,
    /// 404 response
    NotFound,
    /// 422 response
    Unprocessable,
    /// Any other non-success response or request failure
    Api,
    /// Response body could not be decoded
    Decode,
}

impl NativeErrorClass {
    /// Classify a non-success HTTP status
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            422 => Self::Unprocessable,
            429 => Self::RateLimited,
            500..=599 => Self::InternalServer,
            _ => Self::Api,
        }
    }
}

/// A failure as raised by the transport, before normalization
#[derive(Debug, Clone)]
pub struct NativeError {
    pub class: NativeErrorClass,
    pub status: Option<u16>,
    pub message: String,
}

impl NativeError {
    pub fn new(class: NativeErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            status: None,
            message: message.into(),
        }
    }

    /// A non-success response, keeping the status code and raw body
    pub fn from_status(status: u16, body: &str) -> Self {
        Self {
            class: NativeErrorClass::from_status(status),
            status: Some(status),
            message: format!("API request failed with status code {status}: {body}"),
        }
    }

    /// Classify a `reqwest` failure
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        let class = if error.is_timeout() {
            NativeErrorClass::Timeout
        } else if error.is_connect() {
            NativeErrorClass::Connect
        } else if error.is_decode() || error.is_body() {
            NativeErrorClass::Decode
        } else if let Some(status) = error.status() {
            NativeErrorClass::from_status(status.as_u16())
        } else {
            NativeErrorClass::Api
        };

        Self {
            class,
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Static table from normalized kinds to the native classes they absorb
#[derive(Debug, Clone, Copy)]
pub struct ErrorMapping {
    table: &'static [(InvokeErrorKind, &'static [NativeErrorClass])],
}

impl ErrorMapping {
    pub const fn new(table: &'static [(InvokeErrorKind, &'static [NativeErrorClass])]) -> Self {
        Self { table }
    }

    /// Kind owning `class`, if any entry lists it
    pub fn kind_of(&self, class: NativeErrorClass) -> Option<InvokeErrorKind> {
        self.table
            .iter()
            .find(|(_, classes)| classes.contains(&class))
            .map(|(kind, _)| *kind)
    }

    /// Reclassify a native failure
    ///
    /// Classes not listed in the table pass through as [`LlmError::Invoke`].
    pub fn normalize(&self, error: NativeError) -> LlmError {
        match self.kind_of(error.class) {
            Some(kind) => LlmError::from_kind(kind, error.message),
            None => LlmError::Invoke {
                status: error.status,
                message: error.message,
            },
        }
    }
}
