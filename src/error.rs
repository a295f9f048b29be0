//! Error types for the Artifactory provider.

use reqwest::StatusCode;
use thiserror::Error;

use crate::schema::Diagnostics;

/// Errors that can occur while servicing a provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is misconfigured or has not been configured yet.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A JSON serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A YAML serialization error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// The server rejected the request as malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other non-success HTTP status.
    #[error("API error ({status}): {message}")]
    Api {
        /// The HTTP status code returned by Artifactory.
        status: u16,
        /// The response body, truncated.
        message: String,
    },

    /// Mapping or validation produced error diagnostics.
    #[error("{0}")]
    Diagnostics(Diagnostics),
}

/// Longest response body kept in an error message.
const MAX_ERROR_BODY_LENGTH: usize = 512;

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Yaml(_err) => "yaml error (see Debug output)",
            Self::Http(_err) => "http error (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::ResourceExhausted(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::InvalidRequest(msg) => msg,
            Self::Api { message, .. } => message,
            Self::Diagnostics(_) => "operation produced error diagnostics",
        }
    }

    /// Map a non-success HTTP response onto an error variant.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = truncate(body);
        match status {
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::BAD_REQUEST => Self::InvalidRequest(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::PermissionDenied(message),
            StatusCode::CONFLICT => Self::AlreadyExists(message),
            StatusCode::PRECONDITION_FAILED => Self::FailedPrecondition(message),
            StatusCode::TOO_MANY_REQUESTS => Self::ResourceExhausted(message),
            StatusCode::NOT_IMPLEMENTED => Self::Unimplemented(message),
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                Self::Unavailable(message)
            },
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                Self::DeadlineExceeded(message)
            },
            other => Self::Api {
                status: other.as_u16(),
                message,
            },
        }
    }

    /// Whether this error means the remote object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<Diagnostics> for ProviderError {
    fn from(diags: Diagnostics) -> Self {
        Self::Diagnostics(diags)
    }
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
}
