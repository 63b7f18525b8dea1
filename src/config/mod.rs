//! Configuration module for the standup backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::FixedOffset;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Fixed UTC offset of the business timezone all scheduling runs in.
    /// Teams carry their own timezone field, but the scheduler does not
    /// consult it; this offset is the single source of truth.
    pub business_utc_offset: FixedOffset,
    /// Public hostname used in outgoing email bodies, if configured
    pub domain: Option<String>,
    /// Base URL of the Mandrill-compatible email API
    pub mandrill_api_url: String,
    /// API key for the email transport (empty disables real sending)
    pub mandrill_api_key: String,
    /// Seconds between scheduler ticks (daily in production)
    pub scheduler_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("STANDUP_DB_PATH")
            .unwrap_or_else(|_| "./data/app.sqlite".to_string())
            .into();

        let bind_addr = env::var("STANDUP_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid STANDUP_BIND_ADDR format");

        let log_level = env::var("STANDUP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        // Asia/Manila; the zone observes no DST, so a fixed offset is exact.
        let business_utc_offset = env::var("STANDUP_BUSINESS_UTC_OFFSET")
            .unwrap_or_else(|_| "+08:00".to_string())
            .parse()
            .expect("Invalid STANDUP_BUSINESS_UTC_OFFSET format");

        let domain = env::var("STANDUP_DOMAIN").ok();

        let mandrill_api_url = env::var("MANDRILL_API_URL")
            .unwrap_or_else(|_| "https://mandrillapp.com/api/1.0".to_string());

        let mandrill_api_key = env::var("MANDRILL_API_KEY").unwrap_or_default();

        let scheduler_interval_secs = env::var("STANDUP_SCHEDULER_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        Self {
            db_path,
            bind_addr,
            log_level,
            business_utc_offset,
            domain,
            mandrill_api_url,
            mandrill_api_key,
            scheduler_interval_secs,
        }
    }
}
