//! Public account endpoints: code request, registration and login.

use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::net::SocketAddr;

use super::{
    error_response, message_response, missing_payload,
    types::{
        ApiMessage, CodeRequest, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    },
};
use crate::identity::{utils::extract_client_ip, Caller, Identity, Registration};

/// Email a one-time code that proves ownership of the address.
#[utoipa::path(
    post,
    path = "/v1/auth/code",
    request_body = CodeRequest,
    responses(
        (status = 202, description = "Code sent", body = ApiMessage),
        (status = 400, description = "Missing or invalid email", body = ApiMessage),
        (status = 429, description = "Cooldown for this email or address is running", body = ApiMessage),
        (status = 502, description = "Delivery failed", body = ApiMessage)
    ),
    tag = "auth"
)]
pub async fn request_code(
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    identity: Extension<Identity>,
    payload: Option<Json<CodeRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    // Proxy headers win over the socket peer.
    let client_ip = extract_client_ip(&headers)
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()));

    match identity
        .codes
        .request_code(&request.email, client_ip.as_deref())
        .await
    {
        Ok(()) => message_response(StatusCode::ACCEPTED, "code_sent", "Verification code sent"),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Missing fields, bad format or invalid code", body = ApiMessage),
        (status = 409, description = "Username or email already exists", body = ApiMessage)
    ),
    tag = "auth"
)]
pub async fn register(
    identity: Extension<Identity>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    let registration = Registration {
        username: request.username,
        password: request.password,
        email: request.email,
        code: Some(request.code),
    };

    match identity
        .accounts
        .register(registration, Caller::Public)
        .await
    {
        Ok(account) => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                user_id: account.id,
                username: account.username,
            }),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = LoginResponse),
        (status = 400, description = "Missing fields", body = ApiMessage),
        (status = 401, description = "Invalid credentials", body = ApiMessage),
        (status = 403, description = "Account suspended", body = ApiMessage)
    ),
    tag = "auth"
)]
pub async fn login(
    identity: Extension<Identity>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    match identity
        .accounts
        .authenticate(&request.identifier, &request.password)
        .await
    {
        Ok(session) => Json(LoginResponse {
            user_id: session.user_id,
            username: session.username,
            token: session.token,
            expires_at: session.expires_at,
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}
