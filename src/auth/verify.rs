//! The verification step run before protected handlers.

use tracing::debug;

use super::types::AuthenticationContext;
use crate::jwt::{TokenCodec, TokenKind, unix_now};

/// Verify an access token against the wall clock.
pub fn verify_access_token(codec: &TokenCodec, token: Option<&str>) -> AuthenticationContext {
    match unix_now() {
        Ok(now) => verify_access_token_at(codec, token, now),
        Err(e) => {
            debug!(error = %e, "Cannot verify access token");
            AuthenticationContext::unauthenticated()
        }
    }
}

/// Verify an access token as of `now`.
///
/// Every failure resolves to an unauthenticated context. Expiry is the only
/// failure that is reported as such; all others look identical to the caller.
pub fn verify_access_token_at(
    codec: &TokenCodec,
    token: Option<&str>,
    now: u64,
) -> AuthenticationContext {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return AuthenticationContext::unauthenticated();
    };

    match codec.open_at(token, TokenKind::Access, now) {
        Ok(claims) => AuthenticationContext::authenticated(claims.user_id),
        Err(e) if e.is_expired() => AuthenticationContext::expired(),
        Err(e) => {
            debug!(error = %e, "Access token rejected");
            AuthenticationContext::unauthenticated()
        }
    }
}
