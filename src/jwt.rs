//! Signed, time-bound session tokens sealed inside encryption envelopes.
//!
//! A token is an HS256 JWT carrying the user id, session id, token kind and
//! expiry. The JWT is never handed out as-is: it is always wrapped in an
//! envelope (see [`crate::envelope`]) before leaving this module.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::envelope::{self, EnvelopeError, EnvelopeKey};

/// Access token lifetime: 1 hour
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 60 * 60;

/// Refresh token lifetime: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Token kind for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived, verified on every request, never stored
    Access,
    /// Long-lived, stored server-side and rotated on every renewal
    Refresh,
}

/// Claims carried by both token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User the session belongs to
    #[serde(rename = "userId")]
    pub user_id: i64,
    /// Random identifier shared by the access/refresh pair
    #[serde(rename = "sid")]
    pub session_id: String,
    /// Token kind
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl SessionClaims {
    /// Build claims valid from `now` for `ttl` seconds.
    pub fn new(user_id: i64, session_id: &str, kind: TokenKind, ttl: u64, now: u64) -> Self {
        Self {
            user_id,
            session_id: session_id.to_string(),
            kind,
            iat: now,
            exp: now.saturating_add(ttl),
        }
    }
}

/// A sealed token together with the claims inside it.
#[derive(Debug, Clone)]
pub struct SealedToken {
    /// Envelope string, safe to put in a cookie or the database
    pub envelope: String,
    pub claims: SessionClaims,
}

/// Errors from token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The envelope could not be decrypted (malformed, tampered, wrong key)
    #[error("Token envelope is invalid")]
    EnvelopeInvalid(#[source] EnvelopeError),

    /// The decrypted payload is not a JWT signed with our secret
    #[error("Token signature is invalid")]
    SignatureInvalid(#[source] jsonwebtoken::errors::Error),

    /// Valid token of the other kind
    #[error("Wrong token type")]
    WrongTokenType,

    /// Signature is valid but the expiry has passed
    #[error("Token has expired")]
    Expired,

    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("Failed to seal token: {0}")]
    Sealing(#[source] EnvelopeError),

    #[error("System time error")]
    TimeError,
}

impl TokenError {
    /// Whether this is the expiry failure, as opposed to any form of invalidity.
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::Expired)
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::TimeError)
}

/// Signs, seals and opens session tokens.
///
/// Built once at startup from the process secret and shared by `Arc`.
#[derive(Clone)]
pub struct TokenCodec {
    envelope_key: EnvelopeKey,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenCodec {
    /// Create a codec from the process secret. Derives the envelope key,
    /// which is deliberately slow; call once per process.
    pub fn new(secret: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope_key = EnvelopeKey::derive(secret)?;
        Ok(Self::with_envelope_key(envelope_key, secret))
    }

    /// Create a codec from an already-derived envelope key and a signing secret.
    pub fn with_envelope_key(envelope_key: EnvelopeKey, signing_secret: &[u8]) -> Self {
        Self {
            envelope_key,
            encoding_key: EncodingKey::from_secret(signing_secret),
            decoding_key: DecodingKey::from_secret(signing_secret),
        }
    }

    /// Sign claims into a raw JWT. The result must be sealed before it leaves the crate.
    pub(crate) fn sign(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Sign claims and wrap the JWT in an envelope.
    pub fn seal(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        let jwt = self.sign(claims)?;
        envelope::encrypt(jwt.as_bytes(), &self.envelope_key).map_err(TokenError::Sealing)
    }

    /// Issue a sealed token of `kind` for a user, valid for `ttl` seconds from `now`.
    pub fn sealed_issue(
        &self,
        user_id: i64,
        session_id: &str,
        kind: TokenKind,
        ttl: u64,
        now: u64,
    ) -> Result<SealedToken, TokenError> {
        let claims = SessionClaims::new(user_id, session_id, kind, ttl, now);
        let envelope = self.seal(&claims)?;
        Ok(SealedToken { envelope, claims })
    }

    /// Open a sealed token of the expected kind, checking expiry against `now`.
    ///
    /// Failures are checked in order: envelope, signature, kind, expiry.
    /// A token is still valid at exactly `exp`.
    pub fn open_at(
        &self,
        sealed: &str,
        expected: TokenKind,
        now: u64,
    ) -> Result<SessionClaims, TokenError> {
        let payload =
            envelope::decrypt(sealed, &self.envelope_key).map_err(TokenError::EnvelopeInvalid)?;
        // Non-UTF-8 bytes cannot form a valid JWT and fail the decode below.
        let jwt = String::from_utf8_lossy(&payload);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked below against the caller's clock.
        validation.validate_exp = false;

        let token_data = jsonwebtoken::decode::<SessionClaims>(&*jwt, &self.decoding_key, &validation)
            .map_err(TokenError::SignatureInvalid)?;
        let claims = token_data.claims;

        if claims.kind != expected {
            return Err(TokenError::WrongTokenType);
        }

        if now > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Open a sealed token of the expected kind using the wall clock.
    pub fn open(&self, sealed: &str, expected: TokenKind) -> Result<SessionClaims, TokenError> {
        self.open_at(sealed, expected, unix_now()?)
    }
}
