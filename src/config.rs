use std::env;
use std::str::FromStr;

use crate::error::AppError;

/// Credentials for the superuser created at startup when none exists yet.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub session_ttl_hours: i64,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub admin: Option<AdminBootstrap>,
    pub seed_sample_data: bool,
}

impl Config {
    /// Reads the configuration from the environment. Call `dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL must be set".to_string()))?;

        let admin = match (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.is_empty() && !password.is_empty() => {
                Some(AdminBootstrap {
                    username,
                    password,
                    email: env::var("ADMIN_EMAIL").unwrap_or_default(),
                })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080)?,
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            session_ttl_hours: parse_var("SESSION_TTL_HOURS", 24)?,
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            admin,
            seed_sample_data: parse_var("SEED_SAMPLE_DATA", false)?,
        })
    }

    /// Settings for tests and tooling that never touch the environment.
    pub fn for_database(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_connections: 1,
            session_ttl_hours: 24,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            admin: None,
            seed_sample_data: false,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
