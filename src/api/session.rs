//! Session status endpoints.
//!
//! - GET `/check-session` - Report whether the access token is valid or expired
//! - GET `/get-user-id` - Return the signed-in user's id

use axum::{Json, Router, routing::get};
use serde::Serialize;

use super::ApiState;
use crate::auth::{Authentication, RequireAuth};

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/check-session", get(check_session))
        .route("/get-user-id", get(get_user_id))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckSessionResponse {
    is_authenticated: bool,
    is_token_expired: bool,
    message: &'static str,
}

/// Always 200. The client uses `isTokenExpired` to decide whether to renew.
async fn check_session(Authentication(context): Authentication) -> Json<CheckSessionResponse> {
    let message = if context.is_authenticated {
        "User is authenticated"
    } else if context.is_token_expired {
        "Access token has expired"
    } else {
        "User is not authenticated"
    };

    Json(CheckSessionResponse {
        is_authenticated: context.is_authenticated,
        is_token_expired: context.is_token_expired,
        message,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserIdResponse {
    user_id: i64,
}

async fn get_user_id(RequireAuth(user): RequireAuth) -> Json<UserIdResponse> {
    Json(UserIdResponse {
        user_id: user.user_id,
    })
}
