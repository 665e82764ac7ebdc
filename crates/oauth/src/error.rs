use thiserror::Error;

/// Network-level failure talking to the provider.
///
/// Raised when no HTTP response was obtained at all (timeout, refused
/// connection, broken body stream). Safe to retry.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    /// Whether the failure was the request timeout firing.
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest's Display omits the underlying io error, so walk the chain.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        Self {
            message,
            timed_out: err.is_timeout(),
        }
    }
}

/// Every way an authorization-code flow operation can fail.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Static configuration is missing or invalid. Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The user declined consent, or the provider refused the authorization request.
    #[error("authorization denied: {reason}")]
    AuthorizationDenied {
        reason: String,
        description: Option<String>,
    },

    /// The token endpoint answered with a non-200 status.
    #[error("token endpoint returned HTTP {status_code}: {body}")]
    Exchange { status_code: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The provider answered but the payload could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl OAuthError {
    /// Only transport failures may be retried; a rejected grant stays rejected.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type Result<T, E = OAuthError> = std::result::Result<T, E>;
