//! HTTP Basic authentication for admin routes.

use super::AppState;
use async_trait::async_trait;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::json;
use subtle::ConstantTimeEq;

/// Authenticated admin; extracting it rejects the request with 401 otherwise.
#[derive(Debug, Clone)]
pub(crate) struct AdminUser(pub(crate) String);

/// 401 response carrying the Basic challenge.
#[derive(Debug)]
pub(crate) struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic")],
            Json(json!({ "detail": "관리자 인증이 필요합니다." })),
        )
            .into_response()
    }
}

struct Credentials {
    username: String,
    password: String,
}

/// Decode an `Authorization: Basic <base64(user:pass)>` header value.
fn parse_basic(value: &str) -> Option<Credentials> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Compare both fields in constant time; both comparisons always run.
fn verify(credentials: &Credentials, username: &str, password: &str) -> bool {
    let username_ok = credentials.username.as_bytes().ct_eq(username.as_bytes());
    let password_ok = credentials.password.as_bytes().ct_eq(password.as_bytes());
    (username_ok & password_ok).into()
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credentials = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic)
            .ok_or(AuthRejection)?;

        let settings = state.settings.snapshot();
        if verify(
            &credentials,
            &settings.admin_username,
            &settings.admin_password,
        ) {
            Ok(Self(credentials.username))
        } else {
            tracing::warn!(username = %credentials.username, "Admin authentication failed");
            Err(AuthRejection)
        }
    }
}
