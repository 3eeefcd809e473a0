use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to a user by the backend.
///
/// The catalog backend issues integer ids while the auth router issues UUID
/// strings, so both shapes are accepted and kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self::Numeric(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// The signed-in user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Backend identifier.
    pub id: UserId,

    /// The user's email address.
    pub email: String,

    /// Display name. Older auth routes call this `full_name`.
    #[serde(default, alias = "full_name")]
    pub name: String,
}

impl UserRecord {
    /// Returns a copy with `name` and `email` replaced.
    #[must_use]
    pub fn with_profile(&self, name: &str, email: &str) -> Self {
        Self {
            id: self.id.clone(),
            email: email.to_string(),
            name: name.to_string(),
        }
    }
}

/// Credentials submitted to `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Account details submitted to `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Payload for `PUT /profile`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileUpdateRequest {
    pub name: String,
    pub email: String,
}

/// Successful login or registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    /// Opaque bearer credential.
    pub access_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    pub user: UserRecord,
}

fn default_token_type() -> String {
    "bearer".to_string()
}
