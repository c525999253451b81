//! Axum extractors for authentication.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::cookie::{ACCESS_COOKIE_NAME, get_cookie};
use super::errors::AuthRejection;
use super::state::HasSessionBackend;
use super::types::{AuthenticatedUser, AuthenticationContext};

/// Verification result for the current request. Never rejects.
///
/// Handlers that render differently for signed-in and anonymous visitors
/// take this; it carries `is_token_expired` so the client can renew.
pub struct Authentication(pub AuthenticationContext);

impl<S> FromRequestParts<S> for Authentication
where
    S: HasSessionBackend + Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = get_cookie(&parts.headers, ACCESS_COOKIE_NAME);
        Ok(Authentication(state.sessions().verify(token)))
    }
}

/// Extractor for endpoints that require a signed-in user.
/// Rejects with 401 and leaves cookies in place.
pub struct RequireAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: HasSessionBackend + Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authentication(context) = Authentication::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});

        context.user().map(RequireAuth).ok_or(AuthRejection {
            token_expired: context.is_token_expired,
        })
    }
}
