//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote dashboard API
    pub base_url: String,

    /// Path of the durable session file
    pub storage_path: PathBuf,

    /// HTTP request timeout
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Every variable has a default, so this never fails on a missing
    /// environment.
    pub fn from_env() -> Self {
        let base_url = std::env::var("DORMBOARD_API_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());

        let storage_path = std::env::var("DORMBOARD_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("dormboard")
                    .join("session.json")
            });

        let timeout_secs = std::env::var("DORMBOARD_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Self {
            base_url,
            storage_path,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Configuration pointing at a specific API, with defaults elsewhere
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::from_env()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_base_url_overrides_only_the_url() {
        let config = Config::with_base_url("http://127.0.0.1:9999");
        assert_eq!(config.base_url, "http://127.0.0.1:9999");
        assert!(config.timeout.as_secs() > 0);
    }
}
