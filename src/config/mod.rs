//! Configuration module for the project library backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Default cap for a single imported document (10 MiB).
pub const DEFAULT_MAX_IMPORT_BYTES: usize = 10 * 1024 * 1024;
/// Default cap for a batch upload (50 MiB).
pub const DEFAULT_MAX_BATCH_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name} value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared admin key guarding import and admin routes
    pub admin_key: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy search index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Largest accepted single-document upload, in bytes
    pub max_import_bytes: usize,
    /// Largest accepted batch upload, in bytes
    pub max_batch_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let admin_key = env::var("PROJECTS_ADMIN_KEY")
            .ok()
            .filter(|key| !key.is_empty());

        let db_path = env::var("PROJECTS_DB_PATH")
            .unwrap_or_else(|_| "./data/projects.sqlite".to_string())
            .into();

        let index_path = env::var("PROJECTS_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let raw_addr =
            env::var("PROJECTS_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = raw_addr.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                name: "PROJECTS_BIND_ADDR",
                value: raw_addr.clone(),
                reason: e.to_string(),
            }
        })?;

        let log_level = env::var("PROJECTS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let max_import_bytes =
            byte_limit_from_env("PROJECTS_MAX_IMPORT_BYTES", DEFAULT_MAX_IMPORT_BYTES)?;
        let max_batch_bytes =
            byte_limit_from_env("PROJECTS_MAX_BATCH_BYTES", DEFAULT_MAX_BATCH_BYTES)?;

        Ok(Self {
            admin_key,
            db_path,
            index_path,
            bind_addr,
            log_level,
            max_import_bytes,
            max_batch_bytes,
        })
    }
}

fn byte_limit_from_env(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::Invalid {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            }
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("PROJECTS_ADMIN_KEY");
        env::remove_var("PROJECTS_DB_PATH");
        env::remove_var("PROJECTS_INDEX_PATH");
        env::remove_var("PROJECTS_BIND_ADDR");
        env::remove_var("PROJECTS_LOG_LEVEL");
        env::remove_var("PROJECTS_MAX_IMPORT_BYTES");
        env::remove_var("PROJECTS_MAX_BATCH_BYTES");

        let config = Config::from_env().unwrap();

        assert!(config.admin_key.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/projects.sqlite"));
        assert_eq!(config.index_path, PathBuf::from("./data/index"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_import_bytes, 10 * 1024 * 1024);
        assert_eq!(config.max_batch_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn test_byte_limit_rejects_garbage() {
        env::set_var("PROJECTS_TEST_LIMIT", "lots");
        let err = byte_limit_from_env("PROJECTS_TEST_LIMIT", 1).unwrap_err();
        assert!(err.to_string().contains("PROJECTS_TEST_LIMIT"));
        env::remove_var("PROJECTS_TEST_LIMIT");
    }
}
