use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::common::auth::DEFAULT_FULL_ADMIN_LEVEL;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    /// Level at or above which a subject is a full admin.
    pub full_admin_level: i32,
    pub storage_timeout_ms: u64,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "admin-core".to_string()),
            full_admin_level: env::var("FULL_ADMIN_LEVEL")
                .unwrap_or_else(|_| DEFAULT_FULL_ADMIN_LEVEL.to_string())
                .parse()
                .context("FULL_ADMIN_LEVEL must be a valid integer")?,
            storage_timeout_ms: env::var("STORAGE_TIMEOUT_MS")
                .unwrap_or_else(|_| "250".to_string())
                .parse()
                .context("STORAGE_TIMEOUT_MS must be a valid number of milliseconds")?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
        })
    }

    /// Upper bound on any single role or audit storage call.
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}
