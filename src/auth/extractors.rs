//! Axum extractors for authenticated routes.

use crate::auth::session::SessionVerifier;
use crate::auth::verifier::Identity;
use crate::error::Error;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Pull the bearer token out of the Authorization header.
pub fn bearer_token(parts: &Parts) -> Result<String, Error> {
    let auth_header = parts
        .headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::unauthorized("Missing authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| {
            Error::unauthorized("Invalid authorization header format. Expected: Bearer <token>")
        })?
        .to_string();

    if token.is_empty() {
        return Err(Error::unauthorized("Empty bearer token"));
    }

    Ok(token)
}

/// Requires a valid access token; rejects with 401 otherwise.
///
/// The [`SessionVerifier`] is installed in request extensions by the router.
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let verifier = parts
            .extensions
            .get::<SessionVerifier>()
            .cloned()
            .ok_or_else(|| Error::internal("Session verifier not found in request extensions"))?;

        let token = bearer_token(parts)?;
        let identity = verifier.verify(&token)?;
        Ok(AuthUser(identity))
    }
}

/// Like [`AuthUser`] but never rejects: yields `None` when the request
/// carries no usable access token. Used by `/mfa/setup`, which serves both
/// mid-flow and already-authenticated callers.
pub struct OptionalAuthUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(verifier) = parts.extensions.get::<SessionVerifier>().cloned() else {
            return Ok(OptionalAuthUser(None));
        };
        let Ok(token) = bearer_token(parts) else {
            return Ok(OptionalAuthUser(None));
        };
        Ok(OptionalAuthUser(verifier.verify(&token).ok()))
    }
}
