//! Credential renewal and logout endpoints.
//!
//! - POST `/refreshToken` - Exchange the refresh cookie for a new credential pair
//! - POST `/logout` - Revoke the user's session and clear both cookies

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use serde_json::json;

use super::ApiState;
use super::error::ApiError;
use crate::auth::{
    Authentication, REFRESH_COOKIE_NAME, RenewalRejection, clear_session_cookies, get_cookie,
    session_cookies,
};
use crate::session::SessionError;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/refreshToken", post(refresh_token))
        .route("/logout", post(logout))
        .with_state(state)
}

/// Rotate the credential pair.
///
/// The presented refresh token must be the one on file. On success both
/// cookies are replaced; on rejection both are cleared.
async fn refresh_token(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, RenewalRejection> {
    let refresh_token = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .filter(|token| !token.is_empty())
        .ok_or_else(RenewalRejection::missing_token)?;

    let issued = state
        .sessions
        .renew_session(refresh_token)
        .await
        .map_err(|e| RenewalRejection::from_session_error(&e, state.secure_cookies))?;

    Ok((
        StatusCode::OK,
        AppendHeaders(session_cookies(&issued, state.secure_cookies)),
        Json(json!({ "success": true })),
    ))
}

/// Logout - revoke the refresh record and clear both cookies.
///
/// The user is taken from the access token. When the access token has
/// lapsed, the refresh cookie ends the session only if it is the current
/// one. Cookies are cleared either way.
async fn logout(
    State(state): State<ApiState>,
    Authentication(context): Authentication,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let result = match (
        context.user_id,
        get_cookie(&headers, REFRESH_COOKIE_NAME).filter(|token| !token.is_empty()),
    ) {
        (Some(user_id), _) => state.sessions.revoke_session(user_id).await,
        (None, Some(refresh_token)) => state
            .sessions
            .revoke_with_refresh(refresh_token)
            .await
            .map(|_| ()),
        (None, None) => Ok(()),
    };

    result.map_err(|e| match e {
        SessionError::StoreUnavailable(e) => ApiError::unavailable("Failed to revoke session", e),
        other => ApiError::internal("Failed to revoke session", other),
    })?;

    Ok((
        StatusCode::OK,
        AppendHeaders(clear_session_cookies(state.secure_cookies)),
        Json(json!({ "success": true })),
    ))
}
