use http::StatusCode;
use thiserror::Error;

/// Errors that can occur while orchestrating a completion
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing credentials or required bindings
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing or invalid required request fields
    #[error("invalid parameters: {0}")]
    Params(String),

    /// Request lacks valid authentication credentials
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Caller is authenticated but not allowed to perform the operation
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Referenced resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller has exceeded their rate limit
    #[error("rate limit exceeded")]
    RateLimited {
        /// Seconds until the rate limit resets
        retry_after: u64,
    },

    /// Upstream provider returned a non-success response
    #[error("provider {provider} returned {status}: {detail}")]
    Provider {
        /// Provider name as configured
        provider: String,
        /// HTTP status text from the vendor
        status: String,
        /// Response body text
        detail: String,
    },

    /// Catch-all wrapping the original cause
    #[error("unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

impl GatewayError {
    /// Whether this error may succeed on a retry
    ///
    /// Configuration and params errors are deterministic and never
    /// retried. Provider and unknown errors are transient candidates.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::RateLimited { .. } | Self::Unknown(_)
        )
    }
}

/// Mapping from domain errors to HTTP semantics
///
/// Route wiring is an external collaborator; this trait is the narrow
/// surface it consumes to build client responses.
pub trait HttpError {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;
    /// Stable machine-readable error type
    fn error_type(&self) -> &str;
    /// Message safe to show to the caller
    fn client_message(&self) -> String;
}

impl HttpError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration(_) | Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Params(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Provider { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Params(_) => "invalid_request_error",
            Self::Authentication(_) => "authentication_error",
            Self::Forbidden(_) => "forbidden_error",
            Self::NotFound(_) => "not_found_error",
            Self::RateLimited { .. } => "rate_limit_error",
            Self::Provider { .. } => "provider_error",
            Self::Unknown(_) => "unknown_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Unknown(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}
