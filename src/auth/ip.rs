//! Client IP extraction utilities.

use std::net::{IpAddr, SocketAddr};

use axum::{extract::ConnectInfo, http::request::Parts};

/// Trait for types that provide access to HTTP headers and extensions.
/// Implemented for both `Parts` and `Request` to allow flexible IP extraction.
pub trait HasHeadersAndExtensions {
    fn headers(&self) -> &axum::http::HeaderMap;
    fn extensions(&self) -> &axum::http::Extensions;
}

impl HasHeadersAndExtensions for Parts {
    fn headers(&self) -> &axum::http::HeaderMap {
        &self.headers
    }
    fn extensions(&self) -> &axum::http::Extensions {
        &self.extensions
    }
}

impl<B> HasHeadersAndExtensions for axum::extract::Request<B> {
    fn headers(&self) -> &axum::http::HeaderMap {
        axum::extract::Request::headers(self)
    }
    fn extensions(&self) -> &axum::http::Extensions {
        axum::extract::Request::extensions(self)
    }
}

/// Extract the client IP address.
///
/// Behind a trusted proxy the last `X-Forwarded-For` entry is used, since
/// that is the one the proxy appended; earlier entries come from the client.
/// A missing or unparseable header is an error (no fallback to the proxy's
/// own address). Otherwise the socket peer address from `ConnectInfo` is used.
pub fn extract_client_ip<T: HasHeadersAndExtensions>(
    source: &T,
    trust_proxy: bool,
) -> Result<IpAddr, &'static str> {
    if trust_proxy {
        let value = source
            .headers()
            .get("x-forwarded-for")
            .ok_or("X-Forwarded-For header not present")?
            .to_str()
            .map_err(|_| "X-Forwarded-For header contains invalid characters")?;
        let last = value.rsplit(',').next().map(str::trim).unwrap_or_default();
        return last
            .parse()
            .map_err(|_| "X-Forwarded-For header does not end with an IP address");
    }

    source
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .ok_or("No client IP available")
}
