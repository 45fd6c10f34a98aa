//! Supervisor gate.
//!
//! - The dashboard submits the shared PIN to `/api/auth/login`
//! - Server returns a JWT valid for `SESSION_TTL_DAYS`
//! - When `DEV_MODE=false`, supervisor endpoints require `Authorization: Bearer <jwt>`
//!
//! # Security notes
//! - This is a single shared secret for one household; there are no user accounts.
//! - Set a separate `JWT_SECRET` to rotate sessions without changing the PIN.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use super::extract::AppJson;
use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse};

const SESSION_SUBJECT: &str = "choreboard_supervisor";

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Subject (we only need a stable sentinel)
    sub: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    a_bytes
        .iter()
        .zip(b_bytes)
        .fold(0u8, |diff, (x, y)| diff | (x ^ y))
        == 0
}

fn issue_jwt(secret: &str, ttl_days: i64) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: SESSION_SUBJECT.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    if token_data.claims.sub != SESSION_SUBJECT {
        anyhow::bail!("unexpected token subject");
    }
    Ok(token_data.claims)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    let expected = state
        .config
        .auth
        .supervisor_pin
        .as_deref()
        .unwrap_or("");

    if expected.is_empty() || !constant_time_eq(req.pin.trim(), expected) {
        tracing::warn!("Supervisor login rejected");
        return Err((StatusCode::UNAUTHORIZED, "Invalid PIN".to_string()));
    }

    let secret = state.config.auth.signing_secret().ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Session signing key not configured".to_string(),
        )
    })?;

    let (token, exp) = issue_jwt(secret, state.config.auth.session_ttl_days)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    tracing::info!("Supervisor logged in");
    Ok(Json(LoginResponse { token, exp }))
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    // Dev mode => no auth checks.
    if !state.config.auth.auth_required(state.config.dev_mode) {
        return next.run(req).await;
    }

    // No PIN or key configured: fail closed.
    let secret = match state.config.auth.signing_secret() {
        Some(s) => s,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                "Supervisor access is not configured",
            )
                .into_response();
        }
    };

    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return (StatusCode::UNAUTHORIZED, "Missing Authorization header").into_response();
    }

    match verify_jwt(token, secret) {
        Ok(_claims) => next.run(req).await,
        Err(_) => (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response(),
    }
}
