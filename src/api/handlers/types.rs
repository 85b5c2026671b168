//! Request/response types for the HTTP endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of every non-2xx response.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiMessage {
    /// Stable machine-readable code, e.g. `rate_limited`.
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

impl ApiMessage {
    #[must_use]
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            reason: None,
            until: None,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CodeRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    /// One-time code sent to `email`.
    pub code: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub username: String,
}

#[derive(ToSchema, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Username, email or numeric account id.
    pub identifier: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: i64,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct BanRequest {
    pub reason: Option<String>,
    /// End of the suspension; omitted means indefinite.
    pub until: Option<DateTime<Utc>>,
    /// Acting operator's account id.
    pub banned_by: Option<i64>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UnbanResponse {
    pub user_id: i64,
    /// Number of active bans that were lifted.
    pub lifted: u64,
}
