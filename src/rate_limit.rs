//! Per-IP rate limiting for every route.
//!
//! Uses a keyed token bucket: `max` requests per client IP per 15-minute
//! window, refilled evenly across the window.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{net::IpAddr, num::NonZeroU32, sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::auth::extract_client_ip;

/// Length of the rate limiting window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Default number of requests allowed per IP per window.
pub const DEFAULT_REQUESTS_PER_WINDOW: u32 = 100;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Rate limiting configuration.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub limiter: Arc<IpLimiter>,
    /// Take the client IP from `X-Forwarded-For` instead of the socket
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    /// Allow `max` requests per IP per window, all of which may arrive at once.
    pub fn new(max: NonZeroU32, trust_proxy: bool) -> Self {
        let quota = Quota::with_period(RATE_LIMIT_WINDOW / max.get())
            .unwrap_or_else(|| Quota::per_second(max))
            .allow_burst(max);

        Self::with_quota(quota, trust_proxy)
    }

    fn with_quota(quota: Quota, trust_proxy: bool) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            trust_proxy,
        }
    }

    /// Forget clients whose bucket has refilled completely.
    /// Returns the number of clients still tracked.
    pub fn prune(&self) -> usize {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        self.limiter.len()
    }
}

/// Spawn a background task that prunes idle clients once per window.
/// Returns a handle that can be used to abort the task.
pub fn spawn_limiter_pruner(config: Arc<RateLimitConfig>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_WINDOW);

        loop {
            interval.tick().await;
            let tracked = config.prune();
            info!(tracked, "Pruned rate limiter state");
        }
    })
}

/// Middleware that rejects clients over their quota.
pub async fn rate_limit_requests(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.trust_proxy) {
        Ok(ip) => ip,
        Err(reason) => {
            debug!(reason, "Rejecting request without client IP");
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    match config.limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests from this IP, please try again later.",
        )
            .into_response(),
    }
}
