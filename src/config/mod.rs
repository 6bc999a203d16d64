//! Application configuration management

use std::env;

use anyhow::{Context, Result};
use bcrypt::DEFAULT_COST;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Database path (SQLite); DATABASE_URL with a sqlite: prefix also works
    pub database_url: String,

    /// JWT signing secret
    pub jwt_secret: String,

    /// Token lifetime in seconds (default: 2 hours)
    pub token_lifetime: i64,

    /// Bcrypt cost factor
    pub bcrypt_cost: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_PATH")
            .or_else(|_| env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "./data/bookshelf.db".to_string());

        // In production this must be set explicitly
        let jwt_secret =
            env::var("JWT_SECRET").unwrap_or_else(|_| "change-me-in-production".to_string());

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url,

            jwt_secret,

            token_lifetime: env::var("TOKEN_LIFETIME")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2 * 60 * 60),

            bcrypt_cost: env::var("BCRYPT_COST")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_COST),
        })
    }
}
