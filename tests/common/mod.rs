#![allow(dead_code)]

use std::num::NonZeroU32;
use std::sync::{Arc, OnceLock};

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use medsafe::{
    ServerConfig, create_app,
    db::Database,
    jwt::TokenCodec,
    session::{SessionManager, SessionPolicy},
};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const TEST_IP: &str = "127.0.0.1";

/// Key derivation is slow, so derive once per test binary.
static CODEC: OnceLock<Arc<TokenCodec>> = OnceLock::new();

pub fn codec() -> Arc<TokenCodec> {
    CODEC
        .get_or_init(|| {
            Arc::new(TokenCodec::new(TEST_SECRET.as_bytes()).expect("Failed to derive key"))
        })
        .clone()
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub sessions: SessionManager,
}

pub async fn create_test_app_with(rate_limit: Option<NonZeroU32>) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        codec: codec(),
        policy: SessionPolicy::default(),
        secure_cookies: false,
        trust_proxy: true,
        rate_limit,
    };

    TestApp {
        app: create_app(&config),
        sessions: config.session_manager(),
        db,
    }
}

/// App with rate limiting disabled.
pub async fn create_test_app() -> TestApp {
    create_test_app_with(None).await
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    request("GET", uri, cookie)
}

pub fn post(uri: &str, cookie: Option<&str>) -> Request<Body> {
    request("POST", uri, cookie)
}

fn request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", TEST_IP);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn auth_cookies(access_token: &str, refresh_token: &str) -> String {
    format!("token={}; refreshToken={}", access_token, refresh_token)
}

pub fn access_cookie_only(access_token: &str) -> String {
    format!("token={}", access_token)
}

pub fn refresh_cookie_only(refresh_token: &str) -> String {
    format!("refreshToken={}", refresh_token)
}

/// Extract Set-Cookie headers from response
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Value of a cookie set by the response, if it was set to a non-empty value.
pub fn set_cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookies.iter().find_map(|c| {
        let value = c.strip_prefix(&prefix)?.split(';').next()?;
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Check if cookies contain a token being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], name: &str) -> bool {
    let prefix = format!("{}=;", name);
    cookies
        .iter()
        .any(|c| c.starts_with(&prefix) && c.contains("Max-Age=0"))
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
