//! Credential cookies.
//!
//! Both credentials travel as `HttpOnly`, `SameSite=Strict` cookies. The
//! `Secure` attribute is set unless the server runs in plain-HTTP dev mode.

use axum::http::{HeaderName, header};

use crate::session::IssuedSession;

/// Cookie name for the access token (short-lived, 1 hour).
pub const ACCESS_COOKIE_NAME: &str = "token";

/// Cookie name for the refresh token (long-lived, 7 days).
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Build a `Set-Cookie` value for a credential.
pub fn session_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        name, value, max_age, secure
    )
}

/// Build a `Set-Cookie` value that removes a credential.
pub fn cleared_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", 0, secure)
}

/// `Set-Cookie` headers for a freshly issued session.
pub fn session_cookies(issued: &IssuedSession, secure: bool) -> [(HeaderName, String); 2] {
    [
        (
            header::SET_COOKIE,
            session_cookie(
                ACCESS_COOKIE_NAME,
                &issued.access_token,
                issued.access_max_age,
                secure,
            ),
        ),
        (
            header::SET_COOKIE,
            session_cookie(
                REFRESH_COOKIE_NAME,
                &issued.refresh_token,
                issued.refresh_max_age,
                secure,
            ),
        ),
    ]
}

/// `Set-Cookie` headers that clear both credentials.
pub fn clear_session_cookies(secure: bool) -> [(HeaderName, String); 2] {
    [
        (header::SET_COOKIE, cleared_cookie(ACCESS_COOKIE_NAME, secure)),
        (header::SET_COOKIE, cleared_cookie(REFRESH_COOKIE_NAME, secure)),
    ]
}
