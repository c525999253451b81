//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::Serialize;

use super::cookie::clear_session_cookies;
use crate::session::SessionError;

/// Rejection for routes that require a signed-in user.
///
/// Cookies are left alone so the client can still renew with its refresh token.
/// The body never says why verification failed, only whether renewal is worth trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRejection {
    pub token_expired: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRejectionBody {
    error: &'static str,
    token_expired: bool,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(AuthRejectionBody {
                error: "Not authenticated",
                token_expired: self.token_expired,
            }),
        )
            .into_response()
    }
}

/// Internal renewal failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenewalErrorKind {
    MissingToken,
    Rejected,
    StoreUnavailable,
    Internal,
}

/// Rejection for the refresh endpoint.
///
/// A rejected refresh token clears both cookies, forcing a fresh login.
/// Store outages keep the cookies so the client can retry.
#[derive(Debug)]
pub struct RenewalRejection {
    kind: RenewalErrorKind,
    secure_cookies: bool,
}

impl RenewalRejection {
    pub fn missing_token() -> Self {
        Self {
            kind: RenewalErrorKind::MissingToken,
            secure_cookies: false,
        }
    }

    pub fn from_session_error(error: &SessionError, secure_cookies: bool) -> Self {
        let kind = match error {
            SessionError::Invalid(_) | SessionError::Expired | SessionError::RefreshMismatch => {
                RenewalErrorKind::Rejected
            }
            SessionError::StoreUnavailable(_) => RenewalErrorKind::StoreUnavailable,
            SessionError::Minting(_) => RenewalErrorKind::Internal,
        };
        Self {
            kind,
            secure_cookies,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            RenewalErrorKind::MissingToken => StatusCode::UNAUTHORIZED,
            RenewalErrorKind::Rejected => StatusCode::FORBIDDEN,
            RenewalErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            RenewalErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            RenewalErrorKind::MissingToken => "No refresh token provided",
            RenewalErrorKind::Rejected => "Invalid refresh token",
            RenewalErrorKind::StoreUnavailable => "Service temporarily unavailable",
            RenewalErrorKind::Internal => "Internal server error",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for RenewalRejection {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message(),
        });

        if self.kind == RenewalErrorKind::Rejected {
            (
                self.status_code(),
                AppendHeaders(clear_session_cookies(self.secure_cookies)),
                body,
            )
                .into_response()
        } else {
            (self.status_code(), body).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::TokenError;
    use axum::http::header::SET_COOKIE;

    #[test]
    fn test_rejected_renewal_clears_cookies() {
        for error in [
            SessionError::Expired,
            SessionError::RefreshMismatch,
            SessionError::Invalid(TokenError::WrongTokenType),
        ] {
            let response = RenewalRejection::from_session_error(&error, true).into_response();

            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            let cookies: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
            assert_eq!(cookies.len(), 2);
        }
    }

    #[test]
    fn test_store_outage_keeps_cookies() {
        let error = SessionError::StoreUnavailable(sqlx::Error::PoolTimedOut);
        let response = RenewalRejection::from_session_error(&error, true).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let response = RenewalRejection::missing_token().into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[test]
    fn test_auth_rejection_is_unauthorized() {
        let response = AuthRejection {
            token_expired: true,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }
}
