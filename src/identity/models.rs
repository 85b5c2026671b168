//! Records shared between the identity core and the store implementations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::utils::valid_email;

/// A registered account. Only created at registration; never deleted here.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"***")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Whitelist entry backing one bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token_id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// One suspension event. Only `is_active` records with an open or future end
/// count towards "currently banned".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BanRecord {
    pub ban_id: Uuid,
    pub user_id: i64,
    pub banned_by: Option<i64>,
    pub reason: Option<String>,
    pub ban_start: DateTime<Utc>,
    /// `None` means indefinite.
    pub ban_end: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BanRecord {
    /// Whether this record alone suspends its user at `now`.
    #[must_use]
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.ban_end.map_or(true, |end| end > now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBan {
    pub user_id: i64,
    pub banned_by: Option<i64>,
    pub reason: Option<String>,
    pub ban_end: Option<DateTime<Utc>>,
}

/// Login identifier sniffed into the single lookup filter it selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Id(i64),
    Email(String),
    Username(String),
}

impl LoginIdentifier {
    /// Classify a trimmed identifier: an email address, an all-digit account
    /// id, or otherwise a username.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lowered = trimmed.to_lowercase();
        if valid_email(&lowered) {
            return Self::Email(lowered);
        }
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = trimmed.parse::<i64>() {
                return Self::Id(id);
            }
        }
        Self::Username(lowered)
    }
}
