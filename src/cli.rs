//! CLI argument parsing, validation, and startup helpers.

use std::num::NonZeroU32;
use std::sync::Arc;

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::{ACCESS_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS, TokenCodec};
use crate::rate_limit::DEFAULT_REQUESTS_PER_WINDOW;
use crate::session::SessionPolicy;
use clap::Parser;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

const MIN_SESSION_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "medsafe",
    about = "Session service for the medical records portal"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "MEDSAFE_PORT", default_value = "3001")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "MEDSAFE_DATABASE", default_value = "medsafe.db")]
    pub database: String,

    /// Path to file containing the session secret. Prefer using SESSION_SECRET env var instead
    #[arg(long)]
    pub secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "MEDSAFE_ACCESS_TTL", default_value_t = ACCESS_TOKEN_DURATION_SECS,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub access_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "MEDSAFE_REFRESH_TTL", default_value_t = REFRESH_TOKEN_DURATION_SECS,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_ttl: u64,

    /// Omit the Secure cookie attribute (local development over plain HTTP only)
    #[arg(long)]
    pub insecure_cookies: bool,

    /// Take the client IP from X-Forwarded-For (only when running behind a reverse proxy)
    #[arg(long)]
    pub trust_proxy: bool,

    /// Requests allowed per client IP per 15 minutes, 0 disables rate limiting
    #[arg(long, env = "MEDSAFE_RATE_LIMIT", default_value_t = DEFAULT_REQUESTS_PER_WINDOW)]
    pub rate_limit: u32,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the session secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
///
/// Must run before any other thread is started, since it clears the
/// environment variable.
pub fn load_session_secret(secret_file: Option<&str>) -> Option<Zeroizing<String>> {
    let secret = if let Ok(secret) = std::env::var("SESSION_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: Called from `main` before the tokio runtime is built, so no
        // other thread exists that could read or write the environment.
        unsafe { std::env::remove_var("SESSION_SECRET") };
        Zeroizing::new(secret)
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let content = Zeroizing::new(content);
                Zeroizing::new(content.trim().to_string())
            }
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read session secret file");
                return None;
            }
        }
    } else {
        error!(
            "Session secret is required. Set SESSION_SECRET environment variable (recommended) or use --secret-file"
        );
        return None;
    };

    if secret.len() < MIN_SESSION_SECRET_LENGTH {
        error!(
            "Session secret is shorter than {} characters. Use a longer secret",
            MIN_SESSION_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Derive the envelope key and build the token codec.
/// Returns None and logs an error if key derivation fails.
pub fn build_codec(secret: &str) -> Option<Arc<TokenCodec>> {
    match TokenCodec::new(secret.as_bytes()) {
        Ok(codec) => {
            info!("Envelope key derived");
            Some(Arc::new(codec))
        }
        Err(e) => {
            error!(error = %e, "Failed to derive envelope key");
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, codec: Arc<TokenCodec>) -> ServerConfig {
    if args.insecure_cookies {
        warn!("Cookies are sent without the Secure attribute");
    }

    let rate_limit = NonZeroU32::new(args.rate_limit);
    if rate_limit.is_none() {
        warn!("Rate limiting is disabled");
    }

    ServerConfig {
        db,
        codec,
        policy: SessionPolicy {
            access_ttl: args.access_ttl,
            refresh_ttl: args.refresh_ttl,
        },
        secure_cookies: !args.insecure_cookies,
        trust_proxy: args.trust_proxy,
        rate_limit,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
