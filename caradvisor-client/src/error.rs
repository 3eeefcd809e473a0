//! Error type shared by every client operation.

use reqwest::StatusCode;
use thiserror::Error;

/// Result of a client operation.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failures surfaced by the session store and every authorized call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend refused the input (bad credentials, duplicate email, invalid
    /// fields). The session is unchanged.
    #[error("{}", rejection_message(*status, reason.as_deref()))]
    Rejected {
        /// HTTP status of the refusal.
        status: StatusCode,
        /// Server-provided reason, when the body carried one.
        reason: Option<String>,
    },

    /// The backend refused the credential attached to an authorized call. By
    /// the time a caller sees this the forced logout has already run.
    #[error("session expired or revoked: {}", reason.as_deref().unwrap_or("unauthorized"))]
    Unauthorized {
        /// Server-provided reason, when the body carried one.
        reason: Option<String>,
    },

    /// No response reached the client (offline, timeout, DNS).
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// A response arrived but its body was not what the endpoint promises.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// The operation needs an authenticated session.
    #[error("not signed in")]
    NotAuthenticated,

    /// A later logout or login made this result stale, so it was discarded.
    #[error("superseded by a newer session change")]
    Superseded,

    /// Input rejected before anything was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Setup(#[source] reqwest::Error),
}

fn rejection_message(status: StatusCode, reason: Option<&str>) -> String {
    match reason {
        Some(reason) => reason.to_string(),
        None => format!("request failed with status {status}"),
    }
}

impl ClientError {
    /// True for a credential rejection (HTTP 401 on an authorized call).
    #[must_use]
    pub const fn is_credential_rejection(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// True when the failure left no server verdict.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Fills in `fallback` when a rejection carries no server reason.
    #[must_use]
    pub fn with_fallback(self, fallback: &str) -> Self {
        match self {
            Self::Rejected {
                status,
                reason: None,
            } => Self::Rejected {
                status,
                reason: Some(fallback.to_string()),
            },
            other => other,
        }
    }

    /// Reclassifies a 401 as an input rejection.
    ///
    /// Login and registration carry no credential, so a 401 there means bad
    /// credentials rather than an expired session.
    #[must_use]
    pub fn into_input_rejection(self) -> Self {
        match self {
            Self::Unauthorized { reason } => Self::Rejected {
                status: StatusCode::UNAUTHORIZED,
                reason,
            },
            other => other,
        }
    }
}
