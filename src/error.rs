use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::AuthError;
use crate::settings::ConfigError;
use crate::transport::{Response, TransportError};

/// Outcome of a typed endpoint call: the decoded value or the failure the
/// server (or the wire) reported.
pub type SdkResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// Non-2xx response from the server
    Server,
    Transport,
    Decode,
    Validation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorDetail {
    pub field: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub documentation_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: Option<u16>,
    pub message: String,
    pub errors: Vec<ErrorDetail>,
    pub documentation_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    message: Option<String>,
    errors: Option<Vec<ErrorDetail>>,
    documentation_url: Option<String>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            errors: Vec::new(),
            documentation_url: None,
        }
    }

    pub fn validation(error: ValidationError) -> Self {
        Self::new(ApiErrorKind::Validation, None, error.to_string())
    }

    pub fn decode(status: u16, message: impl fmt::Display) -> Self {
        Self::new(
            ApiErrorKind::Decode,
            Some(status),
            format!("Failed to decode response: {}", message),
        )
    }

    /// Decodes a non-2xx response. Never fails: bodies that are not the
    /// server's error document still produce a message.
    pub fn from_response(response: &Response) -> Self {
        let status = response.status;
        let text = String::from_utf8_lossy(&response.body);
        let trimmed = text.trim();

        if trimmed.is_empty() {
            let reason = reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Self::new(ApiErrorKind::Server, Some(status), reason);
        }

        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value @ serde_json::Value::Object(_)) => {
                let body: ErrorBody = serde_json::from_value(value).unwrap_or_default();
                Self {
                    kind: ApiErrorKind::Server,
                    status: Some(status),
                    message: body
                        .message
                        .unwrap_or_else(|| format!("Request failed: {}", trimmed)),
                    errors: body.errors.unwrap_or_default(),
                    documentation_url: body.documentation_url,
                }
            }
            Ok(serde_json::Value::String(message)) => {
                Self::new(ApiErrorKind::Server, Some(status), message)
            }
            _ => Self::new(
                ApiErrorKind::Server,
                Some(status),
                format!("Request failed: {}", trimmed),
            ),
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(error: TransportError) -> Self {
        Self::new(ApiErrorKind::Transport, None, error.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({})", self.message, status)?,
            None => write!(f, "{}", self.message)?,
        }
        for detail in &self.errors {
            write!(
                f,
                "\n  {}: {}",
                detail.field.as_deref().unwrap_or("-"),
                detail.message.as_deref().unwrap_or("")
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),
    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}

/// Every failure the runtime can surface, for callers that prefer `?` over
/// inspecting the tagged result.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SdkError {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            SdkError::Api(e) => Some(e),
            SdkError::Auth(AuthError::Rejected(e)) => Some(e),
            _ => None,
        }
    }
}

/// Unwraps a tagged result, turning the error side into an [`SdkError`].
pub fn ok<T>(result: SdkResult<T>) -> Result<T, SdkError> {
    result.map_err(SdkError::Api)
}
