use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub tracking: TrackingConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Directory served for local inline images
    pub upload_dir: String,
    /// Trailing open-dedup window in seconds (default: 600)
    pub dedup_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated origin list; "*" allows any origin
    pub allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .context("Invalid APP_PORT")?,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            },
            tracking: TrackingConfig {
                upload_dir: std::env::var("UPLOAD_DIR")
                    .unwrap_or_else(|_| "/data/uploads".to_string()),
                dedup_window_secs: std::env::var("DEDUP_WINDOW_SECS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .context("Invalid DEDUP_WINDOW_SECS")?,
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_database_url_is_an_error() {
        // Serialized via the lock below to avoid racing other env tests
        let _lock = ENV_LOCK.lock().unwrap();
        std::env::remove_var("DATABASE_URL");
        assert!(Config::from_env().is_err());
    }

    #[test]
    fn test_defaults_apply() {
        let _lock = ENV_LOCK.lock().unwrap();
        std::env::set_var("DATABASE_URL", "postgres://localhost/tracking");
        std::env::remove_var("APP_PORT");
        std::env::remove_var("DEDUP_WINDOW_SECS");

        let config = Config::from_env().unwrap();
        assert_eq!(config.app.port, 8000);
        assert_eq!(config.tracking.dedup_window_secs, 600);
        assert_eq!(config.cors.allowed_origins, "*");

        std::env::remove_var("DATABASE_URL");
    }

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
}
