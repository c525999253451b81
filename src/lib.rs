pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod envelope;
pub mod jwt;
pub mod rate_limit;
pub mod session;

use api::create_api_router;
use axum::{Router, middleware};
use db::Database;
use jwt::TokenCodec;
use rate_limit::{RateLimitConfig, rate_limit_requests};
use session::{SessionManager, SessionPolicy};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Token codec holding the derived envelope key and signing key
    pub codec: Arc<TokenCodec>,
    /// Access and refresh token lifetimes
    pub policy: SessionPolicy,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Take the client IP from `X-Forwarded-For` (requires running behind a proxy)
    pub trust_proxy: bool,
    /// Requests per IP per 15 minutes, `None` disables rate limiting
    pub rate_limit: Option<NonZeroU32>,
}

impl ServerConfig {
    /// Session manager backed by this configuration's database.
    pub fn session_manager(&self) -> SessionManager {
        SessionManager::new(self.db.refresh_tokens(), self.codec.clone(), self.policy)
    }

    /// Per-IP rate limiter, if enabled.
    pub fn rate_limits(&self) -> Option<Arc<RateLimitConfig>> {
        self.rate_limit
            .map(|max| Arc::new(RateLimitConfig::new(max, self.trust_proxy)))
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    create_app_with_limits(config, config.rate_limits())
}

fn create_app_with_limits(config: &ServerConfig, limits: Option<Arc<RateLimitConfig>>) -> Router {
    let sessions = Arc::new(config.session_manager());
    let router = create_api_router(sessions, config.secure_cookies);

    match limits {
        Some(limits) => router.layer(middleware::from_fn_with_state(limits, rate_limit_requests)),
        None => router,
    }
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let limits = config.rate_limits();
    if let Some(limits) = &limits {
        rate_limit::spawn_limiter_pruner(limits.clone());
    }
    let app = create_app_with_limits(&config, limits);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
