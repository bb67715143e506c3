use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use crosspost_core::models::Actor;
use crosspost_core::AppError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::HttpAppError;

pub const SCHEDULER_SECRET_HEADER: &str = "X-Scheduler-Secret";

/// Session token claims; `sub` is the user id
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Clone)]
pub struct AuthState {
    decoding_key: DecodingKey,
    scheduler_secret: String,
}

impl AuthState {
    pub fn new(jwt_secret: &str, scheduler_secret: impl Into<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            scheduler_secret: scheduler_secret.into(),
        }
    }
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn authenticate(auth: &AuthState, headers: &HeaderMap) -> Result<Actor, AppError> {
    if let Some(secret) = headers.get(SCHEDULER_SECRET_HEADER) {
        let secret = secret.to_str().unwrap_or_default();
        if !auth.scheduler_secret.is_empty() && secure_compare(secret, &auth.scheduler_secret) {
            return Ok(Actor::Scheduler);
        }
        return Err(AppError::Unauthorized("Invalid scheduler secret".to_string()));
    }

    let header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized("Invalid authorization header format".to_string())
    })?;

    let claims = decode::<SessionClaims>(
        token.trim(),
        &auth.decoding_key,
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AppError::Unauthorized("Invalid or expired session token".to_string())
    })?
    .claims;

    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Session token subject is not a user id".to_string()))?;
    Ok(Actor::User { id })
}

/// Resolve the caller and insert it as an `Actor` request extension
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&auth_state, request.headers()) {
        Ok(actor) => {
            tracing::debug!(actor = %actor, "Request authenticated");
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}
