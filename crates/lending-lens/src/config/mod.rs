use crate::lending::domain::Thresholds;
use crate::lending::store::{DataSourceKind, RestStoreConfig, DEFAULT_PAGE_SIZE};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const DEFAULT_MOCK_SEED: u64 = 42;
const DEFAULT_TABLE: &str = "loans";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub data: DataConfig,
    pub thresholds: Thresholds,
    pub commit_key: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let thresholds = Thresholds {
            default_threshold: threshold_var("LENDING_DEFAULT_THRESHOLD", 0.7)?,
            refusal_threshold: threshold_var("LENDING_REFUSAL_THRESHOLD", 0.6)?,
        };

        let commit_key = env::var("LENDING_COMMIT_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            data: DataConfig::from_env()?,
            thresholds,
            commit_key,
        })
    }
}

fn threshold_var(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().parse::<f64>() {
            Ok(value) if (0.0..=1.0).contains(&value) => Ok(value),
            _ => Err(ConfigError::InvalidThreshold { name }),
        },
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where loan rows come from and how they are paged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConfig {
    pub source: DataSourceKind,
    pub page_size: usize,
}

impl DataConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let page_size = match env::var("LENDING_PAGE_SIZE") {
            Err(_) => DEFAULT_PAGE_SIZE,
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => return Err(ConfigError::InvalidPageSize),
            },
        };

        let kind = env::var("LENDING_DATA_SOURCE").unwrap_or_else(|_| "mock".to_string());
        let source = match kind.trim().to_ascii_lowercase().as_str() {
            "mock" => {
                let seed = match env::var("LENDING_MOCK_SEED") {
                    Err(_) => DEFAULT_MOCK_SEED,
                    Ok(raw) => raw
                        .trim()
                        .parse::<u64>()
                        .map_err(|_| ConfigError::InvalidSeed)?,
                };
                DataSourceKind::Mock { seed }
            }
            "remote" | "supabase" => {
                let base_url = env::var("LENDING_STORE_URL")
                    .ok()
                    .filter(|url| !url.trim().is_empty())
                    .ok_or(ConfigError::MissingStoreUrl)?;
                DataSourceKind::Remote(RestStoreConfig {
                    base_url,
                    api_key: env::var("LENDING_STORE_KEY").ok(),
                    table: env::var("LENDING_STORE_TABLE")
                        .unwrap_or_else(|_| DEFAULT_TABLE.to_string()),
                })
            }
            _ => return Err(ConfigError::UnknownDataSource(kind)),
        };

        Ok(Self { source, page_size })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPageSize,
    InvalidSeed,
    InvalidThreshold { name: &'static str },
    MissingStoreUrl,
    UnknownDataSource(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPageSize => {
                write!(f, "LENDING_PAGE_SIZE must be a positive integer")
            }
            ConfigError::InvalidSeed => write!(f, "LENDING_MOCK_SEED must be a valid u64"),
            ConfigError::InvalidThreshold { name } => {
                write!(f, "{name} must be a number between 0 and 1")
            }
            ConfigError::MissingStoreUrl => {
                write!(f, "LENDING_STORE_URL is required when LENDING_DATA_SOURCE=remote")
            }
            ConfigError::UnknownDataSource(value) => {
                write!(f, "LENDING_DATA_SOURCE '{value}' must be 'mock' or 'remote'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "LENDING_DATA_SOURCE",
            "LENDING_STORE_URL",
            "LENDING_STORE_KEY",
            "LENDING_STORE_TABLE",
            "LENDING_PAGE_SIZE",
            "LENDING_MOCK_SEED",
            "LENDING_DEFAULT_THRESHOLD",
            "LENDING_REFUSAL_THRESHOLD",
            "LENDING_COMMIT_KEY",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.data.source, DataSourceKind::Mock { seed: 42 });
        assert_eq!(config.data.page_size, 1000);
        assert_eq!(config.thresholds, Thresholds::new(0.7, 0.6));
        assert!(config.commit_key.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn remote_source_requires_store_url() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LENDING_DATA_SOURCE", "remote");

        let error = AppConfig::load().expect_err("store url missing");
        assert!(matches!(error, ConfigError::MissingStoreUrl));

        env::set_var("LENDING_STORE_URL", "http://127.0.0.1:54321");
        env::set_var("LENDING_STORE_KEY", "anon");
        let config = AppConfig::load().expect("remote config loads");
        assert_eq!(
            config.data.source,
            DataSourceKind::Remote(RestStoreConfig {
                base_url: "http://127.0.0.1:54321".to_string(),
                api_key: Some("anon".to_string()),
                table: "loans".to_string(),
            })
        );
    }

    #[test]
    fn rejects_out_of_range_thresholds_and_bad_page_size() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LENDING_REFUSAL_THRESHOLD", "1.5");
        let error = AppConfig::load().expect_err("threshold rejected");
        assert!(matches!(
            error,
            ConfigError::InvalidThreshold {
                name: "LENDING_REFUSAL_THRESHOLD"
            }
        ));

        reset_env();
        env::set_var("LENDING_PAGE_SIZE", "0");
        let error = AppConfig::load().expect_err("page size rejected");
        assert!(matches!(error, ConfigError::InvalidPageSize));

        reset_env();
        env::set_var("LENDING_DATA_SOURCE", "sheets");
        let error = AppConfig::load().expect_err("source rejected");
        assert_eq!(
            error.to_string(),
            "LENDING_DATA_SOURCE 'sheets' must be 'mock' or 'remote'"
        );
    }

    #[test]
    fn reads_commit_key_and_thresholds() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LENDING_COMMIT_KEY", "rotate-me");
        env::set_var("LENDING_DEFAULT_THRESHOLD", "0.55");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.commit_key.as_deref(), Some("rotate-me"));
        assert_eq!(config.thresholds.default_threshold, 0.55);
        assert_eq!(config.thresholds.refusal_threshold, 0.6);
    }
}
