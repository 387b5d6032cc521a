//! Admin session authentication.
//!
//! One password, one cookie: `POST /api/admin/login` compares the supplied
//! password against `ADMIN_PASSWORD` in constant time and sets an
//! HttpOnly cookie holding an HS256 JWT with `sub=admin`. When no admin
//! password is configured every protected endpoint answers 503.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use subtle::ConstantTimeEq;
use whatsbox_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

const AUTH_COOKIE: &str = "whatsbox_admin_session";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

/// `POST /api/admin/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, HttpAppError> {
    let config = &state.config;
    if !config.admin_enabled() {
        return Err(AppError::invalid_input(
            "auth_disabled",
            "Admin authentication is not configured. Set ADMIN_PASSWORD environment variable.",
        )
        .into());
    }

    let matches: bool = request
        .password
        .as_bytes()
        .ct_eq(config.admin_password.as_bytes())
        .into();
    if !matches {
        return Err(AppError::unauthorized("invalid_credentials", "Invalid password").into());
    }

    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: "admin".to_string(),
        iat: now,
        exp: now + config.admin_session_max_age,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.admin_session_secret.as_bytes()),
    )
    .map_err(|err| AppError::internal(format!("failed to sign session token: {err}")))?;

    let cookie = format!(
        "{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.admin_session_max_age
    );

    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({"success": true, "message": "Logged in successfully"})),
    )
        .into_response())
}

/// `POST /api/admin/logout-session`: clears the cookie.
pub async fn logout_session() -> impl IntoResponse {
    let cookie = format!("{AUTH_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    (
        [(SET_COOKIE, cookie)],
        Json(json!({"success": true, "message": "Logged out successfully"})),
    )
}

/// `GET /api/admin/me`: authentication status for the frontend; never 401.
pub async fn me(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let config = &state.config;
    if !config.admin_enabled() {
        return Json(json!({
            "authenticated": false,
            "auth_required": true,
            "message": "Admin authentication is not configured. Set ADMIN_PASSWORD environment variable.",
        }));
    }

    let authenticated = session_cookie(&headers)
        .map(|token| validate_token(&token, &config.admin_session_secret))
        .unwrap_or(false);

    Json(json!({"authenticated": authenticated, "auth_required": true}))
}

/// Middleware guarding the admin surface.
pub async fn admin_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, HttpAppError> {
    let config = &state.config;
    if !config.admin_enabled() {
        return Err(AppError::AuthNotConfigured.into());
    }

    let token = session_cookie(request.headers())
        .ok_or_else(|| AppError::unauthorized("unauthorized", "Authentication required"))?;

    if !validate_token(&token, &config.admin_session_secret) {
        // Expired or tampered cookie; tell the browser to drop it.
        let clear = format!("{AUTH_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
        let mut response =
            HttpAppError(AppError::unauthorized("unauthorized", "Invalid or expired session"))
                .into_response();
        if let Ok(value) = clear.parse() {
            response.headers_mut().insert(SET_COOKIE, value);
        }
        return Ok(response);
    }

    Ok(next.run(request).await)
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == AUTH_COOKIE).then(|| value.to_string())
    })
}

fn validate_token(token: &str, secret: &str) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.sub = Some("admin".to_string());
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_parsing_finds_the_session() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            "theme=dark; whatsbox_admin_session=tok123; other=1".parse().unwrap(),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("tok123"));

        headers.insert(COOKIE, "theme=dark".parse().unwrap());
        assert_eq!(session_cookie(&headers), None);
    }

    #[test]
    fn token_round_trip_and_tamper_rejection() {
        let secret = "test-secret";
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "admin".into(),
            iat: now,
            exp: now + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert!(validate_token(&token, secret));
        assert!(!validate_token(&token, "other-secret"));
        assert!(!validate_token("garbage", secret));
    }

    #[test]
    fn expired_and_wrong_subject_tokens_fail() {
        let secret = "test-secret";
        let now = Utc::now().timestamp();

        let expired = Claims {
            sub: "admin".into(),
            iat: now - 3600,
            exp: now - 120,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &expired,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        assert!(!validate_token(&token, secret));

        let wrong_sub = Claims {
            sub: "user".into(),
            iat: now,
            exp: now + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &wrong_sub,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        assert!(!validate_token(&token, secret));
    }
}
