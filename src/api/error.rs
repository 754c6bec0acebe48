use thiserror::Error;

/// Failure at the feed-service boundary.
///
/// Every call into an [`EntrySource`](super::EntrySource) resolves to either
/// its payload or one of these variants; callers match on the tag instead of
/// probing optional response fields.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Network failure, timeout, 5xx or any other non-auth HTTP error.
    ///
    /// Retryable by re-issuing the user action. Never retried silently.
    #[error("{message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The server rejected our credentials (HTTP 401).
    ///
    /// Not recoverable locally: the session is invalidated and the user must
    /// authenticate again.
    #[error("Session expired: {message}")]
    Auth { message: String },

    /// The request could not be built from local state. No network traffic
    /// was attempted.
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Classify an HTTP error status with the server-provided message.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| format!("HTTP error: status {}", status));
        if status == 401 {
            Self::Auth { message }
        } else {
            Self::Transport {
                status: Some(status),
                message,
            }
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Short, human-readable text for the status bar.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { message, .. } => message.clone(),
            Self::Auth { .. } => "Session expired, please log in again".to_string(),
            Self::Validation(message) => message.clone(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Transport {
                status: None,
                message: "Request timed out".to_string(),
            };
        }
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: format!("Network error: {}", err),
        }
    }
}
