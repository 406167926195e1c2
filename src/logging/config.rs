use std::path::PathBuf;

/// Output settings for the subscriber, read from the environment.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub environment: String,
    /// Level applied to this crate when `RUST_LOG` is not set.
    pub level: String,
    pub directory: PathBuf,
}

impl LogConfig {
    pub fn from_env() -> Self {
        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
            if environment == "production" {
                "info".to_string()
            } else {
                "debug".to_string()
            }
        });
        let directory = std::env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("logs"));

        Self {
            environment,
            level,
            directory,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Directive used when `RUST_LOG` is absent.
    pub fn default_directive(&self) -> String {
        format!(
            "places_backend={level},tower_http=debug,axum=debug,sqlx=warn",
            level = self.level
        )
    }
}
