//! Environment-driven server configuration.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub logs_dir: PathBuf,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub chat: ChatConfig,
}

fn var(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match var("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            None => 3000,
        };

        let jwt_ttl_hours = match var("JWT_TTL_HOURS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "JWT_TTL_HOURS",
                value: raw,
            })?,
            None => 24,
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:data/blog.db?mode=rwc".to_string()),
            logs_dir: var("LOGS_DIR").map(PathBuf::from).unwrap_or_else(|| "logs".into()),
            jwt_secret: var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            jwt_ttl_hours,
            chat: ChatConfig {
                base_url: var("CHAT_API_BASE_URL")
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                api_key: var("CHAT_API_KEY"),
                model: var("CHAT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            },
        })
    }
}
