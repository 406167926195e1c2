//! Application configuration, read from the environment (after `.env` is loaded).

use std::path::PathBuf;
use std::time::Duration;

use crate::db::DbConfig;

/// Placeholder secret used when `JWT_SECRET` is unset. Refused in production.
pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

const DEFAULT_LOCATIONS_URL: &str = "https://rwanda.p.rapidapi.com/";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub jwt_secret: String,
    pub media_root: PathBuf,
    pub max_body_bytes: usize,
    pub locations: LocationsConfig,
    /// `None` when `DATABASE_URL` is not set; the in-memory store is used instead.
    pub database: Option<DbConfig>,
}

#[derive(Debug, Clone)]
pub struct LocationsConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for LocationsConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("LOCATIONS_API_URL")
                .unwrap_or_else(|_| DEFAULT_LOCATIONS_URL.to_string()),
            api_key: std::env::var("LOCATIONS_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            timeout: Duration::from_secs(
                std::env::var("LOCATIONS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            jwt_secret: std::env::var("JWT_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
            media_root: std::env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("media")),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8 * 1024 * 1024),
            locations: LocationsConfig::default(),
            database: std::env::var("DATABASE_URL")
                .is_ok()
                .then(DbConfig::default),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Configuration for tests: no database, local media dir, fixed secret.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            jwt_secret: "test-secret".to_string(),
            media_root: std::env::temp_dir().join("places-backend-test-media"),
            max_body_bytes: 8 * 1024 * 1024,
            locations: LocationsConfig {
                url: "http://127.0.0.1:9/".to_string(),
                api_key: None,
                timeout: Duration::from_secs(2),
            },
            database: None,
        }
    }
}
