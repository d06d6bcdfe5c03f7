//! # Authentication
//!
//! Bearer JWT verification for the `/api/v1` routes. Tokens are HS256-signed
//! with the configured secret and carry the user's login email in `sub`; the
//! middleware resolves that email to an active user and stores the resulting
//! [`Actor`] in the request extensions.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, unauthorized};
use crate::repositories::UserRepository;
use crate::server::AppState;
use crate::tenancy::Actor;

/// Claims expected in an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Login email of the user
    pub sub: String,
    /// Expiry as seconds since the Unix epoch
    pub exp: usize,
}

/// Authentication middleware that resolves the bearer token to an [`Actor`]
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = {
        let token = extract_bearer_token(request.headers())?;
        let secret = state.config.jwt_secret.as_deref().ok_or_else(|| {
            tracing::warn!("Rejecting request: no JWT secret configured");
            unauthorized(Some("Authentication is not configured"))
        })?;
        decode_token(secret, token)?
    };

    let user = UserRepository::new(state.db.as_ref())
        .find_active_by_email(&claims.sub)
        .await?
        .ok_or_else(|| unauthorized(Some("Unknown or inactive user")))?;

    let actor = Actor::from(&user);
    tracing::debug!(actor_id = %actor.id, role = ?actor.role, "Authenticated request");

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized(Some("Missing Authorization header")))?
        .to_str()
        .map_err(|_| unauthorized(Some("Invalid Authorization header")))?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| unauthorized(Some("Authorization header must use Bearer scheme")))
}

/// Verify signature and expiry of an HS256 token
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|err| {
            tracing::debug!(error = %err, "Rejected bearer token");
            unauthorized(Some("Invalid or expired token"))
        })
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .copied()
            .ok_or_else(|| unauthorized(Some("Authentication required")))
    }
}
