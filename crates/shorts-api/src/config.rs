//! API configuration.

use std::path::PathBuf;

use shorts_storage::DEFAULT_MAX_UPLOAD_BYTES;

/// Which persistence backend the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// Process-local store; data is lost on restart.
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Firestore => "firestore",
            StoreBackend::Memory => "memory",
        }
    }

    /// Parse a backend name; anything unrecognized selects Firestore.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => StoreBackend::Memory,
            _ => StoreBackend::Firestore,
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Per-IP requests per second; 0 disables rate limiting
    pub rate_limit_rps: u32,
    /// Per-IP burst allowance
    pub rate_limit_burst: u32,
    /// Environment (development/production)
    pub environment: String,
    /// Expose `/metrics`
    pub metrics_enabled: bool,
    /// Directory uploaded files are written to
    pub upload_dir: PathBuf,
    /// Upload ceiling in bytes
    pub max_upload_bytes: u64,
    pub store_backend: StoreBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 20,
            rate_limit_burst: 50,
            environment: "development".to_string(),
            metrics_enabled: true,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            store_backend: StoreBackend::Firestore,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES").unwrap_or(defaults.max_upload_bytes),
            store_backend: std::env::var("STORE_BACKEND")
                .map(|s| StoreBackend::from_str_lossy(&s))
                .unwrap_or(defaults.store_backend),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "API_PORT",
        "CORS_ORIGINS",
        "RATE_LIMIT_RPS",
        "MAX_UPLOAD_BYTES",
        "STORE_BACKEND",
        "METRICS_ENABLED",
    ];

    fn clear() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        let config = ApiConfig::from_env();
        assert_eq!(config.port, 8000);
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.store_backend, StoreBackend::Firestore);
        assert!(config.metrics_enabled);
    }

    #[test]
    #[serial]
    fn test_reads_overrides() {
        clear();
        std::env::set_var("API_PORT", "9100");
        std::env::set_var("CORS_ORIGINS", "https://a.example, https://b.example,");
        std::env::set_var("RATE_LIMIT_RPS", "0");
        std::env::set_var("MAX_UPLOAD_BYTES", "1048576");
        std::env::set_var("STORE_BACKEND", "Memory");
        std::env::set_var("METRICS_ENABLED", "false");

        let config = ApiConfig::from_env();
        clear();

        assert_eq!(config.port, 9100);
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(config.rate_limit_rps, 0);
        assert_eq!(config.max_upload_bytes, 1_048_576);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(!config.metrics_enabled);
    }

    #[test]
    #[serial]
    fn test_invalid_numbers_fall_back() {
        clear();
        std::env::set_var("API_PORT", "eighty");
        let config = ApiConfig::from_env();
        clear();
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_is_production() {
        let config = ApiConfig {
            environment: "Production".to_string(),
            ..ApiConfig::default()
        };
        assert!(config.is_production());
        assert!(!ApiConfig::default().is_production());
    }
}
