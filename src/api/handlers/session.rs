//! Bearer session introspection and logout.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::{bearer_token, error_response, message_response, types::ApiMessage, types::SessionResponse};
use crate::identity::{Identity, ValidatedSession};

fn unauthorized() -> Response {
    message_response(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
}

async fn authenticate(headers: &HeaderMap, identity: &Identity) -> Option<ValidatedSession> {
    let token = bearer_token(headers)?;
    identity.sessions.validate(token).await
}

/// Validate the bearer token; renews it when more than half its lifetime is gone.
#[utoipa::path(
    get,
    path = "/v1/auth/session",
    params(
        ("Authorization" = String, Header, description = "Bearer token")
    ),
    responses(
        (status = 200, description = "Session is valid", body = SessionResponse),
        (status = 401, description = "Missing, invalid, revoked or expired token", body = ApiMessage)
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, identity: Extension<Identity>) -> impl IntoResponse {
    match authenticate(&headers, &identity).await {
        Some(session) => Json(SessionResponse {
            user_id: session.claims.user_id,
            token_id: session.claims.jti,
            expires_at: session.expires_at,
        })
        .into_response(),
        None => unauthorized(),
    }
}

/// Revoke the presented session.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    params(
        ("Authorization" = String, Header, description = "Bearer token")
    ),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Missing or invalid token", body = ApiMessage)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, identity: Extension<Identity>) -> impl IntoResponse {
    let Some(session) = authenticate(&headers, &identity).await else {
        return unauthorized();
    };

    match identity.sessions.revoke(&session.claims.jti).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}
