use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::store::StoreError;

/// Failures surfaced by the identity core.
///
/// Auth failures are deliberately low-information: unknown account, wrong
/// password and bad tokens all collapse to `Unauthorized`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("username or email already exists")]
    Conflict,
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid or expired verification code")]
    InvalidCode,
    #[error("account suspended")]
    Suspended {
        reason: Option<String>,
        until: Option<DateTime<Utc>>,
    },
    #[error("too many requests, try again later")]
    RateLimited,
    #[error("failed to deliver verification code")]
    Delivery(#[source] anyhow::Error),
    #[error("storage unavailable")]
    Store(#[from] StoreError),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Discriminated result class handed to routing and CLI layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    ValidationError,
    Conflict,
    RateLimited,
    Unauthorized,
    InternalError,
}

impl Error {
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Validation(_) | Self::InvalidCode => Outcome::ValidationError,
            Self::Conflict => Outcome::Conflict,
            Self::RateLimited => Outcome::RateLimited,
            Self::Unauthorized | Self::Suspended { .. } => Outcome::Unauthorized,
            Self::Delivery(_) | Self::Store(_) | Self::Internal(_) => Outcome::InternalError,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidCode => "invalid_code",
            Self::Conflict => "conflict",
            Self::RateLimited => "rate_limited",
            Self::Unauthorized => "unauthorized",
            Self::Suspended { .. } => "account_suspended",
            Self::Delivery(_) => "delivery_failed",
            Self::Store(StoreError::Timeout { .. }) => "store_timeout",
            Self::Store(_) => "store_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Transient failures are worth retrying under the caller's own policy.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Delivery(_))
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
