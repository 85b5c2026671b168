pub mod admin;
pub mod auth;
pub mod health;
pub mod session;
pub mod types;

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::identity::Error;
use types::ApiMessage;

/// Map an identity error onto status + `{code, message}`.
pub(crate) fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::Validation(_) | Error::InvalidCode => StatusCode::BAD_REQUEST,
        Error::Conflict => StatusCode::CONFLICT,
        Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        Error::Unauthorized => StatusCode::UNAUTHORIZED,
        Error::Suspended { .. } => StatusCode::FORBIDDEN,
        Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Delivery(_) => StatusCode::BAD_GATEWAY,
        Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("request failed: {err:#}");
    }

    let mut body = ApiMessage::new(err.code(), err.to_string());
    if let Error::Suspended { reason, until } = err {
        body.reason.clone_from(reason);
        body.until = *until;
    }

    (status, Json(body)).into_response()
}

pub(crate) fn message_response(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(ApiMessage::new(code, message))).into_response()
}

pub(crate) fn missing_payload() -> Response {
    message_response(StatusCode::BAD_REQUEST, "validation_error", "Missing payload")
}

/// Token from an `Authorization: Bearer <token>` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
