//! Bearer-token actor resolution.
//!
//! A request either carries `Authorization: Bearer <token>` matching a
//! stored session, or it is served as [`Actor::Anonymous`]. A malformed
//! or unknown token does not fail the request here; endpoints that need
//! an authenticated actor reject anonymous access themselves.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use domain::Actor;
use store::Store;

use crate::error::ApiError;

/// Resolves the actor behind a request from its `Authorization` header.
pub async fn resolve_actor<S: Store>(store: &S, headers: &HeaderMap) -> Result<Actor, ApiError> {
    let Some(token) = bearer_token(headers) else {
        return Ok(Actor::Anonymous);
    };
    let Some(session) = store.session_by_token(token).await.map_err(domain::DomainError::from)?
    else {
        return Ok(Actor::Anonymous);
    };
    // A session for a deleted or deactivated user resolves to anonymous.
    match store.user_by_id(session.user).await.map_err(domain::DomainError::from)? {
        Some(user) if user.is_active => Ok(if user.is_staff {
            Actor::staff(user.id)
        } else {
            Actor::user(user.id)
        }),
        _ => Ok(Actor::Anonymous),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
