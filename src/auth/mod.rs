//! Access-token verification for HTTP handlers.
//!
//! Verification never fails a request by itself: it produces an
//! [`AuthenticationContext`] that handlers consume through the
//! [`Authentication`] extractor, or the [`RequireAuth`] extractor for
//! routes that need a signed-in user.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;
mod types;
mod verify;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_session_cookies, cleared_cookie, get_cookie,
    session_cookie, session_cookies,
};
pub use errors::{AuthRejection, RenewalRejection};
pub use extractors::{Authentication, RequireAuth};
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use state::HasSessionBackend;
pub use types::{AuthenticatedUser, AuthenticationContext};
pub use verify::{verify_access_token, verify_access_token_at};
