//! Protected portal endpoint.

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use super::ApiState;
use crate::auth::RequireAuth;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/portal", get(portal))
        .with_state(state)
}

async fn portal(RequireAuth(user): RequireAuth) -> Json<Value> {
    Json(json!({
        "data": {
            "userId": user.user_id,
            "message": "Welcome to your medical records portal",
        }
    }))
}
