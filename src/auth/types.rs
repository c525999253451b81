//! Authentication result types.

use serde::Serialize;

/// Outcome of verifying the access token on a request.
///
/// Lives for one request and is never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationContext {
    pub is_authenticated: bool,
    pub user_id: Option<i64>,
    /// Set only when the token was genuine but past its expiry,
    /// so the client can try a silent renewal.
    pub is_token_expired: bool,
}

impl AuthenticationContext {
    pub fn authenticated(user_id: i64) -> Self {
        Self {
            is_authenticated: true,
            user_id: Some(user_id),
            is_token_expired: false,
        }
    }

    pub fn unauthenticated() -> Self {
        Self::default()
    }

    pub fn expired() -> Self {
        Self {
            is_token_expired: true,
            ..Self::default()
        }
    }

    /// The signed-in user, if any.
    pub fn user(&self) -> Option<AuthenticatedUser> {
        match (self.is_authenticated, self.user_id) {
            (true, Some(user_id)) => Some(AuthenticatedUser { user_id }),
            _ => None,
        }
    }
}

/// A user whose access token verified on this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}
