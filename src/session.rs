//! Session lifecycle: issue, renew, revoke.
//!
//! Each user has at most one live refresh record. Issuing a session
//! overwrites it, and every successful renewal replaces it, so a refresh
//! token that is no longer the stored one has been superseded (an older
//! login, an earlier rotation, or a copy that was stolen before rotation).

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{AuthenticationContext, verify_access_token};
use crate::db::{RefreshRecord, RefreshTokenStore};
use crate::jwt::{
    ACCESS_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS, TokenCodec, TokenError, TokenKind,
    unix_now,
};

/// Persistence for refresh records, keyed by user id.
///
/// Every operation is a single statement so concurrent requests for the
/// same user never interleave a read and a write.
pub trait SessionStore: Send + Sync {
    /// Insert the record for `user_id`, or overwrite the existing one.
    fn upsert_refresh(
        &self,
        user_id: i64,
        encrypted_refresh_token: &str,
        expires_at: u64,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn get_refresh(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Option<RefreshRecord>, sqlx::Error>> + Send;

    /// Replace the stored token only if it still equals `expected`.
    /// Returns false when the record is missing or holds a different token.
    fn rotate_refresh(
        &self,
        user_id: i64,
        expected: &str,
        replacement: &str,
        expires_at: u64,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Delete the record for `user_id`. Deleting a missing record is not an error.
    fn delete_refresh(&self, user_id: i64)
    -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Delete the record only if it still holds `expected`.
    /// Returns false when the record is missing or holds a different token.
    fn delete_refresh_if(
        &self,
        user_id: i64,
        expected: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

/// Token lifetimes, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Access token lifetime in seconds
    pub access_ttl: u64,
    /// Refresh token (and refresh record) lifetime in seconds
    pub refresh_ttl: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            access_ttl: ACCESS_TOKEN_DURATION_SECS,
            refresh_ttl: REFRESH_TOKEN_DURATION_SECS,
        }
    }
}

/// A freshly minted access/refresh pair, ready to be set as cookies.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user_id: i64,
    pub session_id: String,
    /// Sealed access token
    pub access_token: String,
    /// Sealed refresh token, identical to the stored record
    pub refresh_token: String,
    /// Cookie lifetimes in seconds
    pub access_max_age: u64,
    pub refresh_max_age: u64,
    /// Unix timestamp at which the refresh record lapses
    pub refresh_expires_at: u64,
}

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The refresh token could not be opened (envelope, signature, or kind)
    #[error("Refresh token is invalid")]
    Invalid(#[source] TokenError),

    /// The refresh token or its record has lapsed
    #[error("Refresh token has expired")]
    Expired,

    /// Valid refresh token that is not the one on file
    #[error("Refresh token does not match the current session")]
    RefreshMismatch,

    #[error("Session store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),

    /// Signing, sealing or clock failure while minting tokens
    #[error("Failed to mint tokens: {0}")]
    Minting(#[source] TokenError),
}

/// Orchestrates the session lifecycle. The only writer of refresh records.
pub struct SessionManager<S = RefreshTokenStore> {
    store: S,
    codec: Arc<TokenCodec>,
    policy: SessionPolicy,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: S, codec: Arc<TokenCodec>, policy: SessionPolicy) -> Self {
        Self {
            store,
            codec,
            policy,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Start a new session for a user who has just authenticated.
    ///
    /// Any previous session of the same user stops being renewable.
    pub async fn issue_session(&self, user_id: i64) -> Result<IssuedSession, SessionError> {
        let now = unix_now().map_err(SessionError::Minting)?;
        let session_id = Uuid::new_v4().simple().to_string();
        let issued = self.mint(user_id, &session_id, now)?;

        self.store
            .upsert_refresh(user_id, &issued.refresh_token, issued.refresh_expires_at)
            .await
            .map_err(|e| {
                error!(user_id, error = %e, "Failed to store refresh token");
                SessionError::StoreUnavailable(e)
            })?;

        info!(user_id, session_id = %session_id, "Session issued");
        Ok(issued)
    }

    /// Exchange a refresh token for a new access/refresh pair.
    ///
    /// The presented token must be exactly the stored one. On success the
    /// stored record is replaced, so the presented token cannot be used again.
    pub async fn renew_session(&self, refresh_token: &str) -> Result<IssuedSession, SessionError> {
        let now = unix_now().map_err(SessionError::Minting)?;

        let claims = self
            .codec
            .open_at(refresh_token, TokenKind::Refresh, now)
            .map_err(|e| match e {
                TokenError::Expired => SessionError::Expired,
                other => SessionError::Invalid(other),
            })?;
        let user_id = claims.user_id;

        let record = self.store.get_refresh(user_id).await.map_err(|e| {
            error!(user_id, error = %e, "Failed to load refresh token");
            SessionError::StoreUnavailable(e)
        })?;

        let Some(record) = record else {
            warn!(user_id, "Refresh attempted without a stored session");
            return Err(SessionError::RefreshMismatch);
        };

        if record.encrypted_refresh_token != refresh_token {
            warn!(
                user_id,
                session_id = %claims.session_id,
                "Superseded refresh token presented"
            );
            return Err(SessionError::RefreshMismatch);
        }

        if record.expires_at < i64::try_from(now).unwrap_or(i64::MAX) {
            return Err(SessionError::Expired);
        }

        let issued = self.mint(user_id, &claims.session_id, now)?;

        let rotated = self
            .store
            .rotate_refresh(
                user_id,
                refresh_token,
                &issued.refresh_token,
                issued.refresh_expires_at,
            )
            .await
            .map_err(|e| {
                error!(user_id, error = %e, "Failed to rotate refresh token");
                SessionError::StoreUnavailable(e)
            })?;

        if !rotated {
            warn!(user_id, "Concurrent renewal won the rotation");
            return Err(SessionError::RefreshMismatch);
        }

        info!(user_id, session_id = %claims.session_id, "Session renewed");
        Ok(issued)
    }

    /// End the user's session. Idempotent.
    pub async fn revoke_session(&self, user_id: i64) -> Result<(), SessionError> {
        self.store.delete_refresh(user_id).await.map_err(|e| {
            error!(user_id, error = %e, "Failed to delete refresh token");
            SessionError::StoreUnavailable(e)
        })?;

        info!(user_id, "Session revoked");
        Ok(())
    }

    /// End a session on behalf of a client that only holds its refresh token.
    ///
    /// Only the current refresh token can do this: a superseded one must not
    /// be able to end the session that replaced it. Returns whether a session
    /// was ended.
    pub async fn revoke_with_refresh(&self, refresh_token: &str) -> Result<bool, SessionError> {
        let claims = match self.codec.open(refresh_token, TokenKind::Refresh) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Refresh token not usable for logout");
                return Ok(false);
            }
        };
        let user_id = claims.user_id;

        let revoked = self
            .store
            .delete_refresh_if(user_id, refresh_token)
            .await
            .map_err(|e| {
                error!(user_id, error = %e, "Failed to delete refresh token");
                SessionError::StoreUnavailable(e)
            })?;

        if revoked {
            info!(user_id, session_id = %claims.session_id, "Session revoked");
        } else {
            warn!(
                user_id,
                session_id = %claims.session_id,
                "Logout with superseded refresh token ignored"
            );
        }
        Ok(revoked)
    }

    /// Verify an access token. Never fails; see [`verify_access_token`].
    pub fn verify(&self, access_token: Option<&str>) -> AuthenticationContext {
        verify_access_token(&self.codec, access_token)
    }

    fn mint(&self, user_id: i64, session_id: &str, now: u64) -> Result<IssuedSession, SessionError> {
        let access = self
            .codec
            .sealed_issue(
                user_id,
                session_id,
                TokenKind::Access,
                self.policy.access_ttl,
                now,
            )
            .map_err(SessionError::Minting)?;
        let refresh = self
            .codec
            .sealed_issue(
                user_id,
                session_id,
                TokenKind::Refresh,
                self.policy.refresh_ttl,
                now,
            )
            .map_err(SessionError::Minting)?;

        Ok(IssuedSession {
            user_id,
            session_id: session_id.to_string(),
            access_token: access.envelope,
            refresh_token: refresh.envelope,
            access_max_age: self.policy.access_ttl,
            refresh_max_age: self.policy.refresh_ttl,
            refresh_expires_at: refresh.claims.exp,
        })
    }
}
