use crate::errors::AppError;
use crate::handlers::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// The single operator credential accepted by the API.
///
/// Only a SHA-256 digest of the password is kept in memory.
#[derive(Clone)]
pub struct OperatorCredentials {
    username: String,
    password_digest: String,
}

impl std::fmt::Debug for OperatorCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorCredentials")
            .field("username", &self.username)
            .field("password_digest", &"[REDACTED]")
            .finish()
    }
}

impl OperatorCredentials {
    pub fn new(username: impl Into<String>, password: &str) -> Self {
        Self {
            username: username.into(),
            password_digest: digest(password),
        }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        // Evaluate both so timing does not reveal which one failed.
        let user_ok = constant_time_compare(username, &self.username);
        let pass_ok = constant_time_compare(&digest(password), &self.password_digest);
        user_ok & pass_ok
    }
}

/// Middleware guarding operator-only routes with HTTP Basic auth.
pub async fn require_operator(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (username, password) = parse_basic_auth(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing or malformed credentials".to_string()))?;

    if !state.operator.verify(&username, &password) {
        return Err(AppError::Unauthorized(format!(
            "Invalid credentials for user '{}'",
            username
        )));
    }

    Ok(next.run(request).await)
}

/// Extracts `(username, password)` from an `Authorization: Basic` header.
pub fn parse_basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn digest(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
