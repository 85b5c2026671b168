//! Operator endpoints for suspensions.
//!
//! Every route requires the `x-admin-secret` header to match the configured
//! secret; with no secret configured the routes answer 404.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

use super::{
    error_response, message_response,
    types::{ApiMessage, BanRequest, UnbanResponse},
};
use crate::identity::{models::BanRecord, models::NewBan, Identity};

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Shared-secret gate for the admin routes.
#[derive(Clone, Default)]
pub struct AdminGuard {
    secret: Option<SecretString>,
}

impl std::fmt::Debug for AdminGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGuard")
            .field("enabled", &self.secret.is_some())
            .finish()
    }
}

impl AdminGuard {
    #[must_use]
    pub fn new(secret: Option<SecretString>) -> Self {
        Self {
            secret: secret.filter(|secret| !secret.expose_secret().is_empty()),
        }
    }

    fn check(&self, headers: &HeaderMap) -> Result<(), Response> {
        let Some(secret) = &self.secret else {
            return Err(message_response(
                StatusCode::NOT_FOUND,
                "not_found",
                "Not found",
            ));
        };

        let presented = headers
            .get(ADMIN_SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        // Compare fixed-length digests so the check does not leak the secret length.
        if Sha256::digest(presented.as_bytes()) == Sha256::digest(secret.expose_secret().as_bytes())
        {
            Ok(())
        } else {
            warn!("admin request with invalid secret");
            Err(message_response(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "unauthorized",
            ))
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/admin/users/{user_id}/ban",
    request_body = BanRequest,
    params(
        ("user_id" = i64, Path, description = "Account id"),
        ("x-admin-secret" = String, Header, description = "Operator shared secret")
    ),
    responses(
        (status = 201, description = "Ban recorded and sessions revoked", body = BanRecord),
        (status = 400, description = "Ban end is not in the future", body = ApiMessage),
        (status = 401, description = "Invalid admin secret", body = ApiMessage)
    ),
    tag = "admin"
)]
pub async fn ban(
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    guard: Extension<Arc<AdminGuard>>,
    identity: Extension<Identity>,
    payload: Option<Json<BanRequest>>,
) -> impl IntoResponse {
    if let Err(response) = guard.check(&headers) {
        return response;
    }

    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let ban = NewBan {
        user_id,
        banned_by: request.banned_by,
        reason: request.reason,
        ban_end: request.until,
    };

    match identity.bans.ban(ban).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/admin/users/{user_id}/unban",
    params(
        ("user_id" = i64, Path, description = "Account id"),
        ("x-admin-secret" = String, Header, description = "Operator shared secret")
    ),
    responses(
        (status = 200, description = "Active bans lifted", body = UnbanResponse),
        (status = 401, description = "Invalid admin secret", body = ApiMessage)
    ),
    tag = "admin"
)]
pub async fn unban(
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    guard: Extension<Arc<AdminGuard>>,
    identity: Extension<Identity>,
) -> impl IntoResponse {
    if let Err(response) = guard.check(&headers) {
        return response;
    }

    match identity.bans.unban(user_id).await {
        Ok(lifted) => Json(UnbanResponse { user_id, lifted }).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/v1/admin/users/{user_id}/bans",
    params(
        ("user_id" = i64, Path, description = "Account id"),
        ("x-admin-secret" = String, Header, description = "Operator shared secret")
    ),
    responses(
        (status = 200, description = "Ban history, newest first", body = [BanRecord]),
        (status = 401, description = "Invalid admin secret", body = ApiMessage)
    ),
    tag = "admin"
)]
pub async fn bans(
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    guard: Extension<Arc<AdminGuard>>,
    identity: Extension<Identity>,
) -> impl IntoResponse {
    if let Err(response) = guard.check(&headers) {
        return response;
    }

    match identity.bans.history(user_id).await {
        Ok(history) => Json(history).into_response(),
        Err(err) => error_response(&err),
    }
}
