//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// PEM public key used to verify the identity provider's session tokens.
    pub identity_public_key_path: PathBuf,
    /// Secret key sent as a bearer header on identity-record fetches.
    pub identity_secret_key: String,
    /// Base URL of the identity provider's backend API.
    pub identity_api_url: String,
    pub bucket_name: String,
    /// Content-delivery origin fronting the storage backend for reads.
    pub cdn_origin: String,
    /// The CDN signer key-pair identifier.
    pub key_pair_id: String,
    /// Path to the CDN signing private key (PEM, PKCS#1 or PKCS#8).
    pub private_key_path: PathBuf,
    /// Validity window for presigned upload URLs. Deliberately short.
    pub upload_url_expiry: Duration,
    /// Validity window for signed read URLs.
    pub read_url_expiry: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = required("DATABASE_URL")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Identity Provider Settings ---
        let identity_public_key_path = required("CLERK_PEM_PUBLIC_KEY_PATH").map(PathBuf::from)?;
        let identity_secret_key = required("CLERK_SECRET_KEY")?;
        let identity_api_url =
            std::env::var("CLERK_API_URL").unwrap_or_else(|_| "https://api.clerk.com".to_string());

        // --- Load Storage and CDN Settings ---
        let bucket_name = required("S3_BUCKET_NAME")?;
        let cdn_origin = required("CLOUDFRONT_URL")?;
        let key_pair_id = required("KEYPAIR_ID")?;
        let private_key_path = std::env::var("PRIVATE_KEY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./private_key.pem"));

        let upload_url_expiry = seconds_var("UPLOAD_URL_EXPIRY_SECS", 15)?;
        let read_url_expiry = seconds_var("READ_URL_EXPIRY_SECS", 300)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            identity_public_key_path,
            identity_secret_key,
            identity_api_url,
            bucket_name,
            cdn_origin,
            key_pair_id,
            private_key_path,
            upload_url_expiry,
            read_url_expiry,
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn seconds_var(name: &str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}
