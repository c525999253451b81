mod error;
mod portal;
mod session;
mod tokens;

use axum::Router;
use std::sync::Arc;

use crate::session::SessionManager;

pub use error::ApiError;

/// State shared by every API router.
#[derive(Clone)]
pub struct ApiState {
    pub sessions: Arc<SessionManager>,
    pub secure_cookies: bool,
}

crate::impl_has_session_backend!(ApiState);

/// Create the API router.
pub fn create_api_router(sessions: Arc<SessionManager>, secure_cookies: bool) -> Router {
    let state = ApiState {
        sessions,
        secure_cookies,
    };

    Router::new()
        .nest("/session", session::router(state.clone()))
        .merge(tokens::router(state.clone()))
        .merge(portal::router(state))
}
