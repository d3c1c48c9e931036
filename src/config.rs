//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;

use crate::identity::IdentityOptions;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Environment (development, production)
    pub environment: String,

    /// Refuse sign-in for unconfirmed accounts
    pub require_confirmed_account: bool,
}

impl Config {
    /// Load configuration from environment variables, after reading `.env`
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let require_confirmed_account = parse_flag(
            "REQUIRE_CONFIRMED_ACCOUNT",
            env::var("REQUIRE_CONFIRMED_ACCOUNT").ok().as_deref(),
        )?;

        Ok(Self {
            database_url,
            database_max_connections,
            environment,
            require_confirmed_account,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Sign-in policy for the identity handlers
    pub fn identity_options(&self) -> IdentityOptions {
        IdentityOptions {
            require_confirmed_account: self.require_confirmed_account,
        }
    }
}

fn parse_flag(name: &'static str, value: Option<&str>) -> Result<bool, ConfigError> {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "" | "0" | "false" | "no" => Ok(false),
            "1" | "true" | "yes" => Ok(true),
            _ => Err(ConfigError::InvalidValue(name)),
        },
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
